use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PaketError, PaketResult};
use crate::types::Mode;

/// Top-level configuration (loaded from paket.toml)
///
/// Key material is deliberately absent: it is supplied at runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaketConfig {
    pub container: ContainerConfig,
    pub kdf: KdfConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Container file (default: data.pack)
    pub path: PathBuf,
    /// JSON index describing the container (default: data.index.json)
    pub index: PathBuf,
    /// Cipher mode every record was written with
    pub mode: Mode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    /// PBKDF2 iterations; values below 4096 are raised to 4096
    pub iterations: u32,
    /// PBKDF2 salt
    pub salt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data.pack"),
            index: PathBuf::from("data.index.json"),
            mode: Mode::default(),
        }
    }
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            iterations: 4096,
            salt: String::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl PaketConfig {
    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> PaketResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PaketError::Config(format!("reading config {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| PaketError::Config(format!("parsing config {}: {e}", path.display())))
    }

    /// Like [`PaketConfig::load`], falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> PaketResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::warn!(
                "config file not found: {}  (using defaults)",
                path.display()
            );
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[container]
path = "/srv/assets/data.pack"
index = "/srv/assets/data.index.json"
mode = "gcm"

[kdf]
iterations = 100000
salt = "per-container-salt"

[logging]
level = "debug"
format = "json"
"#;
        let config: PaketConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.container.path, PathBuf::from("/srv/assets/data.pack"));
        assert_eq!(config.container.mode, Mode::Gcm);
        assert_eq!(config.kdf.iterations, 100000);
        assert_eq!(config.kdf.salt, "per-container-salt");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config: PaketConfig = toml::from_str("").unwrap();

        assert_eq!(config.container.path, PathBuf::from("data.pack"));
        assert_eq!(config.container.index, PathBuf::from("data.index.json"));
        assert_eq!(config.container.mode, Mode::Ctr);
        assert_eq!(config.kdf.iterations, 4096);
        assert!(config.kdf.salt.is_empty());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[container]
mode = "cbc"
"#;
        let config: PaketConfig = toml::from_str(toml_str).unwrap();

        // Overridden
        assert_eq!(config.container.mode, Mode::Cbc);
        // Defaults
        assert_eq!(config.container.path, PathBuf::from("data.pack"));
        assert_eq!(config.kdf.iterations, 4096);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let toml_str = r#"
[container]
mode = "ecb"
"#;
        assert!(toml::from_str::<PaketConfig>(toml_str).is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = PaketConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: PaketConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.container.path, parsed.container.path);
        assert_eq!(config.container.mode, parsed.container.mode);
        assert_eq!(config.kdf.iterations, parsed.kdf.iterations);
    }

    #[test]
    fn test_load_or_default_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = PaketConfig::load_or_default(&dir.path().join("paket.toml")).unwrap();
        assert_eq!(config.kdf.iterations, 4096);
    }

    #[test]
    fn test_load_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paket.toml");
        std::fs::write(&path, "[kdf\niterations = ").unwrap();
        assert!(matches!(
            PaketConfig::load(&path),
            Err(PaketError::Config(_))
        ));
    }
}
