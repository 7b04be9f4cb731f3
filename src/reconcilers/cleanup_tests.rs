// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `cleanup.rs`

#[cfg(test)]
mod tests {
    use super::super::extract_project_name;

    /// Test project derivation from Compose container names
    #[test]
    fn test_extract_project_name() {
        let cases = [
            ("visual-studio-code-app-1", "visual-studio-code"),
            ("myproject-web-1", "myproject"),
            ("my_project_web_1", "my_project"),
            ("app-1", ""),
            ("container", ""),
            ("my-cool-project-backend-api-1", "my-cool-project-backend"),
            ("/proj-web-1", "proj"),
        ];

        for (input, expected) in cases {
            assert_eq!(
                extract_project_name(input),
                expected,
                "extract_project_name({input:?})"
            );
        }
    }
}
