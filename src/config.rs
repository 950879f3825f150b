// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Engine configuration system

use crate::cache::EvictionStrategy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location looked up by [`EngineConfig::load`]
pub const CONFIG_FILE: &str = "tabexpr.toml";

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    /// Worker threads for batch evaluation; `None` uses the rayon default
    pub threads: Option<usize>,
}

/// Samples cache tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Byte budget for resident vectors; 0 disables the limit
    pub max_size_in_bytes: usize,
    pub eviction: EvictionStrategy,
    /// Entries released per eviction round
    pub eviction_batch: usize,
    /// Keep full-table results computed anyway while under budget
    pub cache_by_opportunism: bool,
    /// Cache a node after this many requests
    pub promote_after_requests: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_in_bytes: 256 * 1024 * 1024,
            eviction: EvictionStrategy::default(),
            eviction_batch: 10,
            cache_by_opportunism: true,
            promote_after_requests: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: EngineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `tabexpr.toml` if present, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = if PathBuf::from(CONFIG_FILE).exists() {
            Self::from_file(CONFIG_FILE)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `TABEXPR_*` overrides read through `var`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(bytes) = var("TABEXPR_CACHE_BYTES") {
            self.cache.max_size_in_bytes = bytes
                .parse()
                .with_context(|| format!("Invalid TABEXPR_CACHE_BYTES: {}", bytes))?;
        }

        if let Some(name) = var("TABEXPR_EVICTION") {
            self.cache.eviction = EvictionStrategy::from_name(&name)
                .with_context(|| format!("Unknown eviction strategy: {}", name))?;
        }

        if let Some(threads) = var("TABEXPR_THREADS") {
            self.threads = Some(
                threads
                    .parse()
                    .with_context(|| format!("Invalid TABEXPR_THREADS: {}", threads))?,
            );
        }

        self.validate()
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.eviction_batch == 0 {
            anyhow::bail!("cache.eviction_batch must be at least 1");
        }
        if self.threads == Some(0) {
            anyhow::bail!("threads must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.cache.eviction_batch, 10);
        assert!(config.cache.cache_by_opportunism);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("engine.toml");

        let mut config = EngineConfig::default();
        config.cache.max_size_in_bytes = 4096;
        config.cache.eviction = EvictionStrategy::LeastRequested;
        config.threads = Some(2);
        config.save(&path).unwrap();

        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("engine.toml");
        std::fs::write(&path, "[cache]\nmax_size_in_bytes = 1024\n").unwrap();

        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded.cache.max_size_in_bytes, 1024);
        assert_eq!(loaded.cache.eviction_batch, 10);
        assert_eq!(loaded.threads, None);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TABEXPR_CACHE_BYTES", "2048"),
            ("TABEXPR_EVICTION", "least_requested"),
            ("TABEXPR_THREADS", "3"),
        ]
        .into_iter()
        .collect();
        let mut config = EngineConfig::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.cache.max_size_in_bytes, 2048);
        assert_eq!(config.cache.eviction, EvictionStrategy::LeastRequested);
        assert_eq!(config.threads, Some(3));

        let mut bad = EngineConfig::default();
        assert!(bad
            .apply_env(|key| (key == "TABEXPR_EVICTION").then(|| "lru".to_string()))
            .is_err());
    }
}
