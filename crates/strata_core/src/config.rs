//! # World Configuration
//!
//! Tunables for a [`World`](crate::World), loaded once at startup from TOML:
//!
//! ```toml
//! initial_chunk_capacity = 256
//! entity_reserve = 10000
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{StoreError, StoreResult};

/// Largest accepted `initial_chunk_capacity`. Chunks grow past it on demand.
pub const MAX_INITIAL_CHUNK_CAPACITY: usize = 1 << 20;

/// Largest accepted `entity_reserve`.
pub const MAX_ENTITY_RESERVE: usize = 1 << 24;

/// Configuration for a world.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Slots allocated for each new chunk before its first growth.
    pub initial_chunk_capacity: usize,
    /// Entities to reserve routing space for up front.
    pub entity_reserve: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            initial_chunk_capacity: 100,
            entity_reserve: 0,
        }
    }
}

impl WorldConfig {
    /// Parses a configuration from TOML text. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] if the text is not valid TOML for
    /// this struct or fails validation.
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|err| StoreError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] if the file cannot be read or
    /// parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| StoreError::InvalidConfig(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Checks the values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] if `initial_chunk_capacity` is
    /// zero or above [`MAX_INITIAL_CHUNK_CAPACITY`], or `entity_reserve` is
    /// above [`MAX_ENTITY_RESERVE`].
    pub fn validate(&self) -> StoreResult<()> {
        if self.initial_chunk_capacity == 0 {
            return Err(StoreError::InvalidConfig(
                "initial_chunk_capacity must be greater than zero".into(),
            ));
        }
        if self.initial_chunk_capacity > MAX_INITIAL_CHUNK_CAPACITY {
            return Err(StoreError::InvalidConfig(format!(
                "initial_chunk_capacity {} exceeds {MAX_INITIAL_CHUNK_CAPACITY}",
                self.initial_chunk_capacity
            )));
        }
        if self.entity_reserve > MAX_ENTITY_RESERVE {
            return Err(StoreError::InvalidConfig(format!(
                "entity_reserve {} exceeds {MAX_ENTITY_RESERVE}",
                self.entity_reserve
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorldConfig::from_toml_str("").unwrap();
        assert_eq!(config, WorldConfig::default());
        assert_eq!(config.initial_chunk_capacity, 100);
    }

    #[test]
    fn test_parse() {
        let config = WorldConfig::from_toml_str(
            "initial_chunk_capacity = 8\nentity_reserve = 1024\n",
        )
        .unwrap();
        assert_eq!(config.initial_chunk_capacity, 8);
        assert_eq!(config.entity_reserve, 1024);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = WorldConfig::from_toml_str("initial_chunk_capacity = 0").unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_oversized_chunk_capacity() {
        let err = WorldConfig::from_toml_str("initial_chunk_capacity = 9223372036854775807")
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(_)));

        let at_limit = format!("initial_chunk_capacity = {MAX_INITIAL_CHUNK_CAPACITY}");
        assert!(WorldConfig::from_toml_str(&at_limit).is_ok());
        let past_limit = format!("initial_chunk_capacity = {}", MAX_INITIAL_CHUNK_CAPACITY + 1);
        assert!(WorldConfig::from_toml_str(&past_limit).is_err());
    }

    #[test]
    fn test_rejects_oversized_entity_reserve() {
        let err = WorldConfig::from_toml_str("entity_reserve = 9223372036854775807").unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(msg) if msg.contains("entity_reserve")));

        let config = WorldConfig {
            initial_chunk_capacity: 1,
            entity_reserve: MAX_ENTITY_RESERVE + 1,
        };
        assert!(crate::World::with_config(&config).is_err());
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(WorldConfig::from_toml_str("chunk_size = 3").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = WorldConfig::load("/nonexistent/strata.toml").unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(msg) if msg.contains("strata.toml")));
    }
}
