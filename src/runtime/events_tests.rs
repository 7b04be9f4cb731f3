// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `events.rs`

#[cfg(test)]
mod tests {
    use super::super::{decode_events, RuntimeEvent, WatchEvent};
    use crate::errors::RuntimeError;
    use bytes::Bytes;
    use futures::StreamExt;

    const CONNECT: &str = r#"{"Type":"network","Action":"connect","Actor":{"ID":"net1","Attributes":{"container":"abc123","name":"proj_caddy","type":"bridge"}},"scope":"local","time":1700000000}"#;
    const DESTROY: &str = r#"{"status":"destroy","id":"abc123","Type":"container","Action":"destroy","Actor":{"ID":"abc123","Attributes":{"name":"proj-web-1","image":"nginx"}}}"#;

    fn event(json: &str) -> RuntimeEvent {
        serde_json::from_str(json).unwrap()
    }

    /// Test classification of network events
    #[test]
    fn test_classify_network_connect() {
        assert_eq!(
            WatchEvent::from_runtime(&event(CONNECT)),
            WatchEvent::NetworkConnected {
                network: "proj_caddy".to_string(),
                container: "abc123".to_string(),
            }
        );
    }

    #[test]
    fn test_classify_container_destroy() {
        assert_eq!(
            WatchEvent::from_runtime(&event(DESTROY)),
            WatchEvent::ContainerDestroyed {
                id: "abc123".to_string(),
                name: "proj-web-1".to_string(),
            }
        );
    }

    #[test]
    fn test_classify_ignored() {
        let exec = r#"{"Type":"container","Action":"exec_start: sh","Actor":{"ID":"x","Attributes":{"name":"web"}}}"#;
        let created =
            r#"{"Type":"network","Action":"create","Actor":{"ID":"n","Attributes":{"name":"a_caddy"}}}"#;

        assert_eq!(WatchEvent::from_runtime(&event(exec)), WatchEvent::Ignored);
        assert_eq!(
            WatchEvent::from_runtime(&event(created)).network(),
            Some("a_caddy")
        );
    }

    /// Test that events split across chunks are reassembled
    #[tokio::test]
    async fn test_decode_split_chunks() {
        let body = format!("{CONNECT}\n{DESTROY}\n");
        let (first, second) = body.split_at(40);
        let chunks = futures::stream::iter(vec![
            Ok(Bytes::from(first.to_string())),
            Ok(Bytes::from(second.to_string())),
        ]);

        let events: Vec<_> = decode_events(chunks).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap().action, "connect");
        assert_eq!(events[1].as_ref().unwrap().action, "destroy");
    }

    /// Test that malformed lines are skipped and a trailing line is kept
    #[tokio::test]
    async fn test_decode_skips_garbage() {
        let body = format!("not json\n\n{CONNECT}");
        let chunks = futures::stream::iter(vec![Ok(Bytes::from(body))]);

        let events: Vec<_> = decode_events(chunks).collect().await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_ok());
    }

    /// Test that a transport error ends the stream
    #[tokio::test]
    async fn test_decode_transport_error() {
        let chunks = futures::stream::iter(vec![
            Ok(Bytes::from(format!("{CONNECT}\n"))),
            Err(RuntimeError::StreamClosed {
                reason: "reset".to_string(),
            }),
            Ok(Bytes::from(format!("{DESTROY}\n"))),
        ]);

        let events: Vec<_> = decode_events(chunks).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(events[1].is_err());
    }
}
