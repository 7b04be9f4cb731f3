// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `parse.rs`

#[cfg(test)]
mod tests {
    use super::super::{
        is_valid_hostname, parse_all_service_env, parse_service_env, split_comma_separated,
    };
    use crate::errors::SpecError;
    use crate::spec::{AuthScope, TlsProvider, Visibility};
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    /// Test that a complete declaration produces a spec with defaults
    #[test]
    fn test_parse_valid_spec() {
        let env = env(&[
            ("CADDY_DOMAIN", "test.example.com"),
            ("CADDY_TYPE", "internal"),
            ("CADDY_PORT", "8080"),
        ]);

        let spec = parse_service_env(&env, "test_caddy", "/test-container")
            .unwrap()
            .expect("spec should be produced");

        assert_eq!(spec.domains, vec!["test.example.com"]);
        assert_eq!(spec.visibility, Visibility::Internal);
        assert_eq!(spec.upstream, "test-container:8080");
        assert_eq!(spec.container, "test-container");
        assert_eq!(spec.network, "test_caddy");
        assert!(spec.compression, "compression should default to on");
        assert!(spec.header, "header should default to on");
        assert!(spec.security, "security should default to on");
        assert!(spec.performance, "performance should default to on");
        assert!(!spec.logging, "logging should default to off");
        assert!(!spec.seo, "seo should default to off");
        assert_eq!(spec.tls, TlsProvider::Cloudflare);
    }

    /// Test that a container without the trigger key is ignored silently
    #[test]
    fn test_parse_missing_domain_is_opt_out() {
        let env = env(&[("CADDY_TYPE", "internal"), ("CADDY_PORT", "8080")]);

        assert_eq!(parse_service_env(&env, "n", "c").unwrap(), None);
        assert!(parse_all_service_env(&env, "n", "c").is_empty());
    }

    /// Test that missing mandatory keys are named in the error
    #[test]
    fn test_parse_missing_type_and_port() {
        let env = env(&[("CADDY_DOMAIN", "test.example.com")]);

        let err = parse_service_env(&env, "n", "c").unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing CADDY_TYPE, CADDY_PORT (CADDY_DOMAIN=test.example.com)"
        );
    }

    /// Test that only the missing key is named
    #[test]
    fn test_parse_missing_port_only() {
        let env = env(&[("CADDY_DOMAIN", "a.example.com"), ("CADDY_TYPE", "external")]);

        match parse_service_env(&env, "n", "c").unwrap_err() {
            SpecError::MissingKeys { keys, .. } => assert_eq!(keys, "CADDY_PORT"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_invalid_type() {
        let env = env(&[
            ("CADDY_DOMAIN", "test.example.com"),
            ("CADDY_TYPE", "invalid"),
            ("CADDY_PORT", "8080"),
        ]);

        let err = parse_service_env(&env, "n", "c").unwrap_err();
        assert!(matches!(err, SpecError::InvalidType { .. }));
    }

    #[test]
    fn test_parse_invalid_port() {
        let env = env(&[
            ("CADDY_DOMAIN", "test.example.com"),
            ("CADDY_TYPE", "internal"),
            ("CADDY_PORT", "abc"),
        ]);

        let err = parse_service_env(&env, "n", "c").unwrap_err();
        assert_eq!(err.to_string(), "invalid CADDY_PORT: abc (must be numeric)");
    }

    #[test]
    fn test_parse_invalid_domain() {
        let env = env(&[
            ("CADDY_DOMAIN", "good.example.com,-bad.example.com"),
            ("CADDY_TYPE", "internal"),
            ("CADDY_PORT", "8080"),
        ]);

        let err = parse_service_env(&env, "n", "c").unwrap_err();
        assert_eq!(err.to_string(), "invalid domain: -bad.example.com");
    }

    /// Test that a list made only of separators is rejected
    #[test]
    fn test_parse_empty_domain_list() {
        let env = env(&[
            ("CADDY_DOMAIN", " , ,"),
            ("CADDY_TYPE", "internal"),
            ("CADDY_PORT", "8080"),
        ]);

        let err = parse_service_env(&env, "n", "c").unwrap_err();
        assert!(matches!(err, SpecError::NoDomains { .. }));
    }

    /// Test that every optional key is honoured
    #[test]
    fn test_parse_all_optional_keys() {
        let env = env(&[
            ("CADDY_DOMAIN", "a.example.com, b.example.com"),
            ("CADDY_TYPE", "external"),
            ("CADDY_PORT", "3000"),
            ("CADDY_ALLOWLIST", "office.example.com, 10.0.0.0/8"),
            ("CADDY_TRUSTED_PROXIES", "172.16.0.1"),
            ("CADDY_LOGGING", "true"),
            ("CADDY_DNS_PROVIDER", "hetzner"),
            ("CADDY_COMPRESSION", "false"),
            ("CADDY_HEADER", "false"),
            ("CADDY_SECURITY", "false"),
            ("CADDY_PERFORMANCE", "false"),
            ("CADDY_WORDPRESS", "true"),
            ("CADDY_SEO", "true"),
            ("CADDY_SEO_NOINDEX_TYPES", "pdf,doc"),
            ("CADDY_WWW_REDIRECT", "true"),
            ("CADDY_AUTH", "true"),
            ("CADDY_AUTH_URL", "https://login.example.com"),
            ("CADDY_AUTH_GROUPS", "admin,users"),
        ]);

        let spec = parse_service_env(&env, "n", "c").unwrap().unwrap();

        assert_eq!(spec.domains, vec!["a.example.com", "b.example.com"]);
        assert_eq!(spec.allowlist, vec!["office.example.com", "10.0.0.0/8"]);
        assert_eq!(spec.trusted_proxies, vec!["172.16.0.1"]);
        assert!(spec.logging);
        assert_eq!(spec.tls, TlsProvider::Hetzner);
        assert!(!spec.compression && !spec.header && !spec.security && !spec.performance);
        assert!(spec.wordpress && spec.seo && spec.www_redirect);
        assert_eq!(spec.seo_noindex_types, vec!["pdf", "doc"]);
        assert!(spec.auth.enabled);
        assert_eq!(spec.auth.url.as_deref(), Some("https://login.example.com"));
        assert_eq!(spec.auth.groups, vec!["admin", "users"]);
        assert_eq!(spec.auth.scope, AuthScope::Site);
    }

    /// Test that flags other than the literal values keep their defaults
    #[test]
    fn test_parse_flag_literals() {
        let env = env(&[
            ("CADDY_DOMAIN", "a.example.com"),
            ("CADDY_TYPE", "internal"),
            ("CADDY_PORT", "80"),
            ("CADDY_LOGGING", "yes"),
            ("CADDY_COMPRESSION", "no"),
        ]);

        let spec = parse_service_env(&env, "n", "c").unwrap().unwrap();
        assert!(!spec.logging, "only 'true' enables an off-by-default flag");
        assert!(spec.compression, "only 'false' disables an on-by-default flag");
    }

    /// Test that inclusion paths win over exclusion paths
    #[test]
    fn test_parse_auth_paths_take_precedence() {
        let env = env(&[
            ("CADDY_DOMAIN", "a.example.com"),
            ("CADDY_TYPE", "internal"),
            ("CADDY_PORT", "80"),
            ("CADDY_AUTH", "true"),
            ("CADDY_AUTH_PATHS", "/admin/*"),
            ("CADDY_AUTH_EXCEPT", "/health"),
        ]);

        let spec = parse_service_env(&env, "n", "c").unwrap().unwrap();
        assert_eq!(spec.auth.scope, AuthScope::Only(vec!["/admin/*".to_string()]));
    }

    #[test]
    fn test_parse_auth_except() {
        let env = env(&[
            ("CADDY_DOMAIN", "a.example.com"),
            ("CADDY_TYPE", "internal"),
            ("CADDY_PORT", "80"),
            ("CADDY_AUTH", "true"),
            ("CADDY_AUTH_EXCEPT", "/health, /api/public/*"),
        ]);

        let spec = parse_service_env(&env, "n", "c").unwrap().unwrap();
        assert_eq!(
            spec.auth.scope,
            AuthScope::Except(vec!["/health".to_string(), "/api/public/*".to_string()])
        );
    }

    #[test]
    fn test_parse_invalid_dns_provider() {
        let env = env(&[
            ("CADDY_DOMAIN", "a.example.com"),
            ("CADDY_TYPE", "internal"),
            ("CADDY_PORT", "80"),
            ("CADDY_DNS_PROVIDER", "route53"),
        ]);

        let err = parse_service_env(&env, "n", "c").unwrap_err();
        assert!(matches!(err, SpecError::InvalidTlsProvider { .. }));
    }

    /// Test that multi-service keys produce one spec per discriminator
    #[test]
    fn test_parse_multi_service() {
        let env = env(&[
            ("CADDY_DOMAIN_web", "www.example.com"),
            ("CADDY_TYPE_web", "external"),
            ("CADDY_PORT_web", "80"),
            ("CADDY_DOMAIN_api", "api.example.com"),
            ("CADDY_TYPE_api", "internal"),
            ("CADDY_PORT_api", "8080"),
            ("CADDY_AUTH_api", "true"),
        ]);

        let specs: Vec<_> = parse_all_service_env(&env, "proj_caddy", "/proj-app-1")
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(specs.len(), 2);
        // Sorted by discriminator
        assert_eq!(specs[0].container, "proj-app-1-api");
        assert_eq!(specs[0].upstream, "proj-app-1:8080");
        assert!(specs[0].auth.enabled);
        assert_eq!(specs[1].container, "proj-app-1-web");
        assert_eq!(specs[1].upstream, "proj-app-1:80");
        assert_eq!(specs[1].visibility, Visibility::External);
        assert!(!specs[1].auth.enabled);
    }

    /// Test that one invalid service does not hide the others
    #[test]
    fn test_parse_multi_service_isolates_errors() {
        let env = env(&[
            ("CADDY_DOMAIN_good", "good.example.com"),
            ("CADDY_TYPE_good", "internal"),
            ("CADDY_PORT_good", "80"),
            ("CADDY_DOMAIN_bad", "bad.example.com"),
            ("CADDY_TYPE_bad", "internal"),
        ]);

        let results = parse_all_service_env(&env, "n", "c");
        assert_eq!(results.len(), 2);

        let err = results[0].as_ref().unwrap_err();
        assert_eq!(
            err.to_string(),
            "service bad: missing CADDY_PORT_bad (CADDY_DOMAIN_bad=bad.example.com)"
        );
        assert_eq!(results[1].as_ref().unwrap().container, "c-good");
    }

    #[test]
    fn test_split_comma_separated() {
        assert_eq!(
            split_comma_separated(" a , b,,c "),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(split_comma_separated("").is_empty());
        assert!(split_comma_separated(" , ").is_empty());
    }

    #[test]
    fn test_is_valid_hostname() {
        assert!(is_valid_hostname("example.com"));
        assert!(is_valid_hostname("a-b.example.co.uk"));
        assert!(is_valid_hostname("123.example.com"));

        assert!(!is_valid_hostname(""));
        assert!(!is_valid_hostname("localhost"), "a dot is required");
        assert!(!is_valid_hostname("-a.example.com"));
        assert!(!is_valid_hostname("a-.example.com"));
        assert!(!is_valid_hostname("a..example.com"));
        assert!(!is_valid_hostname("a_b.example.com"));
        assert!(!is_valid_hostname(&format!("{}.com", "a".repeat(64))));
        assert!(!is_valid_hostname(&format!("{}.com", "a.".repeat(126))));
    }
}
