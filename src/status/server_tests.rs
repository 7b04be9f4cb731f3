// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `server.rs`

#[cfg(test)]
mod tests {
    use super::super::serve;
    use crate::metrics;
    use crate::shutdown;
    use crate::spec::Visibility;
    use crate::status::StatusManager;
    use crate::store::parser::ConfigInfo;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    /// Test every route over a real socket, then a graceful stop
    #[tokio::test]
    async fn test_routes_and_shutdown() {
        let status = Arc::new(StatusManager::new(None, None));
        status
            .update(&[ConfigInfo {
                network: "proj_caddy".to_string(),
                container: "proj-web-1".to_string(),
                visibility: Visibility::External,
                domains: vec!["web.example.com".to_string()],
                managed: true,
                ..ConfigInfo::default()
            }])
            .await;
        metrics::record_config_written("external");

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (trigger, shutdown) = shutdown::channel();
        let server = tokio::spawn(serve(listener, status, shutdown));

        let client = reqwest::Client::new();

        let health = client.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(health.status(), 200);
        assert_eq!(health.text().await.unwrap(), "ok");

        let json: serde_json::Value = client
            .get(format!("{base}/api/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(json["summary"]["total"], 1);
        assert_eq!(json["services"][0]["domains"][0], "web.example.com");

        let page = client.get(&base).send().await.unwrap();
        assert!(page
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/html"));

        let exposition = client
            .get(format!("{base}/metrics"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(exposition.contains("caddy_watcher_configs_written_total"));

        trigger.trigger();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .expect("server should stop after shutdown");
        assert!(result.unwrap().is_ok());
    }
}
