// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the allowlist resolver.

#[cfg(test)]
mod tests {
    use super::super::{is_literal, AllowlistResolver, HostLookup};
    use crate::errors::DnsError;
    use crate::spec::{ServiceSpec, SpecKey, Visibility};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Lookup backed by a mutable table; missing hosts fail.
    #[derive(Default)]
    struct TableLookup {
        table: Mutex<HashMap<String, Vec<String>>>,
    }

    impl TableLookup {
        fn set(&self, host: &str, addresses: &[&str]) {
            self.table.lock().unwrap().insert(
                host.to_string(),
                addresses.iter().map(ToString::to_string).collect(),
            );
        }

        fn fail(&self, host: &str) {
            self.table.lock().unwrap().remove(host);
        }
    }

    #[async_trait]
    impl HostLookup for TableLookup {
        async fn lookup(&self, host: &str) -> Result<Vec<String>, DnsError> {
            self.table
                .lock()
                .unwrap()
                .get(host)
                .cloned()
                .ok_or_else(|| DnsError::NoAnswers {
                    host: host.to_string(),
                })
        }
    }

    fn spec(allowlist: &[&str]) -> ServiceSpec {
        let mut spec = ServiceSpec::new(
            "proj_caddy",
            "web",
            vec!["web.example.com".to_string()],
            Visibility::External,
            "web:80",
        );
        spec.allowlist = allowlist.iter().map(ToString::to_string).collect();
        spec
    }

    #[test]
    fn test_is_literal() {
        assert!(is_literal("1.2.3.4"));
        assert!(is_literal("2001:db8::1"));
        assert!(is_literal("10.0.0.0/8"));
        assert!(is_literal("2001:db8::/32"));
        assert!(!is_literal("office.example.com"));
        assert!(!is_literal("10.0.0.0/33"));
    }

    /// Test that literals pass through and hostnames resolve, sorted and unique
    #[tokio::test]
    async fn test_register_resolves_immediately() {
        let lookup = Arc::new(TableLookup::default());
        lookup.set("office.example.com", &["9.9.9.9", "1.1.1.1"]);
        let (resolver, _rx) = AllowlistResolver::new(lookup);

        let spec = spec(&["office.example.com", "10.0.0.0/8", "1.1.1.1"]);
        resolver.register(&spec).await;

        assert_eq!(
            resolver.resolved_ips(&spec.key()).await,
            vec!["1.1.1.1", "10.0.0.0/8", "9.9.9.9"]
        );
        assert_eq!(resolver.entries(&spec.key()).await, spec.allowlist);
    }

    #[tokio::test]
    async fn test_register_without_allowlist_is_ignored() {
        let (resolver, _rx) = AllowlistResolver::new(Arc::new(TableLookup::default()));
        let spec = spec(&[]);

        resolver.register(&spec).await;
        assert!(resolver.entries(&spec.key()).await.is_empty());
        assert!(!resolver.unregister(&spec.key()).await);
    }

    /// Test that a failed refresh keeps the previous addresses
    #[tokio::test]
    async fn test_refresh_keeps_previous_on_failure() {
        let lookup = Arc::new(TableLookup::default());
        lookup.set("office.example.com", &["9.9.9.9"]);
        let (resolver, mut rx) = AllowlistResolver::new(lookup.clone());

        let spec = spec(&["office.example.com"]);
        resolver.register(&spec).await;

        lookup.fail("office.example.com");
        let changed = resolver.refresh_all().await;

        assert!(changed.is_empty(), "fallback is not a change");
        assert_eq!(resolver.resolved_ips(&spec.key()).await, vec!["9.9.9.9"]);
        assert!(rx.try_recv().is_err());
    }

    /// Test that re-registering the same entries during an outage keeps the addresses
    #[tokio::test]
    async fn test_register_same_entries_keeps_previous_on_failure() {
        let lookup = Arc::new(TableLookup::default());
        lookup.set("office.example.com", &["9.9.9.9"]);
        let (resolver, _rx) = AllowlistResolver::new(lookup.clone());

        let spec = spec(&["office.example.com"]);
        resolver.register(&spec).await;
        lookup.fail("office.example.com");
        resolver.register(&spec).await;

        assert_eq!(resolver.resolved_ips(&spec.key()).await, vec!["9.9.9.9"]);
    }

    /// Test that replacing the entries drops the addresses of the old ones
    #[tokio::test]
    async fn test_register_changed_entries_drops_previous() {
        let lookup = Arc::new(TableLookup::default());
        lookup.set("old.example.com", &["9.9.9.9"]);
        let (resolver, _rx) = AllowlistResolver::new(lookup.clone());

        resolver.register(&spec(&["old.example.com"])).await;
        let replaced = spec(&["new.invalid"]);
        resolver.register(&replaced).await;

        assert_eq!(
            resolver.entries(&replaced.key()).await,
            vec!["new.invalid".to_string()]
        );
        assert!(resolver.resolved_ips(&replaced.key()).await.is_empty());
    }

    /// Test that a changed address set is published once
    #[tokio::test]
    async fn test_refresh_publishes_changes() {
        let lookup = Arc::new(TableLookup::default());
        lookup.set("office.example.com", &["9.9.9.9"]);
        let (resolver, mut rx) = AllowlistResolver::new(lookup.clone());

        let spec = spec(&["office.example.com"]);
        resolver.register(&spec).await;

        assert!(resolver.refresh_all().await.is_empty(), "unchanged set");

        lookup.set("office.example.com", &["8.8.8.8", "9.9.9.9"]);
        let changed = resolver.refresh_all().await;

        assert_eq!(changed, vec![spec.key()]);
        assert_eq!(rx.try_recv().unwrap(), spec.key());
        assert_eq!(
            resolver.resolved_ips(&spec.key()).await,
            vec!["8.8.8.8", "9.9.9.9"]
        );
    }

    /// Test that order differences alone are not a change
    #[tokio::test]
    async fn test_refresh_ignores_order() {
        let lookup = Arc::new(TableLookup::default());
        lookup.set("office.example.com", &["2.2.2.2", "1.1.1.1"]);
        let (resolver, _rx) = AllowlistResolver::new(lookup.clone());

        let spec = spec(&["office.example.com"]);
        resolver.register(&spec).await;
        lookup.set("office.example.com", &["1.1.1.1", "2.2.2.2"]);

        assert!(resolver.refresh_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_unregister_network() {
        let lookup = Arc::new(TableLookup::default());
        let (resolver, _rx) = AllowlistResolver::new(lookup);

        let a = spec(&["1.2.3.4"]);
        let mut b = spec(&["5.6.7.8"]);
        b.network = "other_caddy".to_string();
        resolver.register(&a).await;
        resolver.register(&b).await;

        assert_eq!(resolver.unregister_network("proj_caddy").await, 1);
        assert!(resolver.resolved_ips(&a.key()).await.is_empty());
        assert_eq!(
            resolver.resolved_ips(&SpecKey::new("web", "other_caddy")).await,
            vec!["5.6.7.8"]
        );
    }
}
