// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Config file persistence.
//!
//! Generated configs live at `{hosts_dir}/{visibility}/{container}_{network}.conf`.
//! The store holds no in-memory state: every listing re-reads the directory tree,
//! so hand-written files and files left by a previous run are always visible.
//!
//! Writes go through a temporary file and a rename, so Caddy never reads a
//! partially written site.

pub mod parser;

pub use parser::ConfigInfo;

use crate::caddyfile::{compile, compile_wildcard};
use crate::constants::{CONFIG_EXTENSION, WILDCARD_DIR};
use crate::errors::StoreError;
use crate::spec::{ServiceSpec, SpecKey, TlsProvider, Visibility};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Filesystem-backed store of generated site configs.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    hosts_dir: PathBuf,
}

impl ConfigStore {
    #[must_use]
    pub fn new(hosts_dir: impl Into<PathBuf>) -> Self {
        Self {
            hosts_dir: hosts_dir.into(),
        }
    }

    #[must_use]
    pub fn hosts_dir(&self) -> &Path {
        &self.hosts_dir
    }

    /// Create the partition directories.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when a directory cannot be created.
    pub fn ensure_layout(&self) -> Result<(), StoreError> {
        for visibility in Visibility::ALL {
            let dir = self.partition_dir(visibility);
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        Ok(())
    }

    /// Path of the config for `key` in `visibility`.
    #[must_use]
    pub fn config_path(&self, visibility: Visibility, key: &SpecKey) -> PathBuf {
        self.partition_dir(visibility)
            .join(format!("{}.{CONFIG_EXTENSION}", key.file_stem()))
    }

    fn partition_dir(&self, visibility: Visibility) -> PathBuf {
        self.hosts_dir.join(visibility.as_str())
    }

    /// Compile and write the config for `spec`, replacing any previous version.
    ///
    /// A config for the same key in another partition is removed, so a visibility
    /// change leaves exactly one file.
    ///
    /// # Arguments
    ///
    /// * `spec` - Validated spec
    /// * `resolved_ips` - Current allowlist resolution for the spec
    ///
    /// # Returns
    ///
    /// Path of the written file
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Compile`] before touching the filesystem when compilation
    /// fails, or [`StoreError::Io`] when the file cannot be written.
    pub fn write_config(
        &self,
        spec: &ServiceSpec,
        resolved_ips: &[String],
    ) -> Result<PathBuf, StoreError> {
        let content = compile(spec, resolved_ips)?;
        let key = spec.key();

        for other in Visibility::ALL
            .into_iter()
            .filter(|v| *v != spec.visibility)
        {
            let stale = self.config_path(other, &key);
            if remove_file_if_exists(&stale)? {
                info!(
                    key = %key,
                    from = %other,
                    to = %spec.visibility,
                    "Removed config from previous visibility partition"
                );
            }
        }

        let path = self.config_path(spec.visibility, &key);
        write_atomic(&path, &content)?;
        debug!(path = %path.display(), "Wrote config");
        Ok(path)
    }

    /// Remove every managed config belonging to `network`.
    ///
    /// # Returns
    ///
    /// Number of files removed; zero for an unknown network.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when an existing file cannot be removed.
    pub fn remove_config(&self, network: &str) -> Result<usize, StoreError> {
        let suffix = format!("_{network}.{CONFIG_EXTENSION}");
        let mut removed = 0;

        for visibility in Visibility::ALL {
            for path in self.partition_files(visibility)? {
                let belongs = match fs::read_to_string(&path) {
                    Ok(content) => match parser::managed_network(&content) {
                        Some(owner) => owner == network,
                        None => file_name_ends_with(&path, &suffix),
                    },
                    Err(_) => file_name_ends_with(&path, &suffix),
                };
                if belongs && remove_file_if_exists(&path)? {
                    info!(path = %path.display(), network = network, "Removed config");
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }

    /// Remove the config for `key` in every partition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when an existing file cannot be removed.
    pub fn remove_key(&self, key: &SpecKey) -> Result<bool, StoreError> {
        let mut removed = false;
        for visibility in Visibility::ALL {
            removed |= remove_file_if_exists(&self.config_path(visibility, key))?;
        }
        Ok(removed)
    }

    /// Keys of managed configs currently on disk for `network`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when a partition cannot be listed.
    pub fn managed_keys(&self, network: &str) -> Result<Vec<SpecKey>, StoreError> {
        let mut keys = Vec::new();
        for visibility in Visibility::ALL {
            for path in self.partition_files(visibility)? {
                let Ok(content) = fs::read_to_string(&path) else {
                    continue;
                };
                let info = parser::parse_config(&content, visibility, &path);
                if let Some(key) = info.key().filter(|k| k.network == network) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    /// List every config in the three partitions, managed or not.
    ///
    /// Unreadable files are listed with only their location.
    #[must_use]
    pub fn list_configs(&self) -> Vec<ConfigInfo> {
        let mut configs = Vec::new();
        for visibility in Visibility::ALL {
            let files = match self.partition_files(visibility) {
                Ok(files) => files,
                Err(e) => {
                    warn!(partition = %visibility, error = %e, "Failed to list partition");
                    continue;
                }
            };
            for path in files {
                let info = match fs::read_to_string(&path) {
                    Ok(content) => parser::parse_config(&content, visibility, &path),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to read config");
                        parser::unreadable_config(visibility, &path)
                    }
                };
                configs.push(info);
            }
        }
        configs
    }

    /// Write one wildcard certificate site per domain and drop stale ones.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the wildcard directory cannot be updated.
    pub fn write_wildcard_configs(
        &self,
        domains: &[String],
        provider: TlsProvider,
    ) -> Result<Vec<PathBuf>, StoreError> {
        let dir = self.hosts_dir.join(WILDCARD_DIR);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let mut written = Vec::new();
        for domain in domains {
            let path = dir.join(format!("wildcard_{domain}.{CONFIG_EXTENSION}"));
            write_atomic(&path, &compile_wildcard(domain, provider))?;
            info!(domain = %domain, path = %path.display(), "Wrote wildcard config");
            written.push(path);
        }

        for path in list_conf_files(&dir)? {
            if !written.contains(&path) && remove_file_if_exists(&path)? {
                info!(path = %path.display(), "Removed stale wildcard config");
            }
        }

        Ok(written)
    }

    fn partition_files(&self, visibility: Visibility) -> Result<Vec<PathBuf>, StoreError> {
        list_conf_files(&self.partition_dir(visibility))
    }
}

/// Sorted `.conf` files of `dir`; a missing directory is empty.
fn list_conf_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(dir, e)),
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == CONFIG_EXTENSION))
        .collect();
    files.sort();
    Ok(files)
}

fn file_name_ends_with(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().ends_with(suffix))
}

fn remove_file_if_exists(path: &Path) -> Result<bool, StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let tmp = path.with_extension(format!("{CONFIG_EXTENSION}.tmp"));
    fs::write(&tmp, content).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
}
