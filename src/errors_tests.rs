// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for error types.

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_missing_keys_error() {
        let error = SpecError::MissingKeys {
            keys: "CADDY_TYPE, CADDY_PORT".to_string(),
            trigger: "CADDY_DOMAIN".to_string(),
            domain: "test.example.com".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "missing CADDY_TYPE, CADDY_PORT (CADDY_DOMAIN=test.example.com)"
        );
    }

    #[test]
    fn test_invalid_type_error() {
        let error = SpecError::InvalidType {
            key: "CADDY_TYPE".to_string(),
            value: "invalid_type".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "invalid CADDY_TYPE: invalid_type (must be internal|external|cloudflare)"
        );
    }

    #[test]
    fn test_service_error_wraps_source() {
        let error = SpecError::Service {
            service: "api".to_string(),
            source: Box::new(SpecError::InvalidPort {
                key: "CADDY_PORT_api".to_string(),
                value: "abc".to_string(),
            }),
        };

        assert_eq!(
            error.to_string(),
            "service api: invalid CADDY_PORT_api: abc (must be numeric)"
        );
    }

    #[test]
    fn test_store_io_error_includes_path() {
        let error = StoreError::io(
            "/hosts/internal/a_b.conf",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );

        assert_eq!(
            error.to_string(),
            "filesystem error at /hosts/internal/a_b.conf: denied"
        );
    }

    #[test]
    fn test_runtime_not_found_detection() {
        let not_found = RuntimeError::Status {
            method: "DELETE".to_string(),
            path: "/networks/x".to_string(),
            status: 404,
            message: "network x not found".to_string(),
        };
        let conflict = RuntimeError::Status {
            method: "DELETE".to_string(),
            path: "/networks/x".to_string(),
            status: 409,
            message: "conflict".to_string(),
        };

        assert!(not_found.is_not_found());
        assert!(!conflict.is_not_found());
    }
}
