use sealpage_crypto::KdfParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SealError, SealResult};

/// Top-level configuration (loaded from sealpage.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SealConfig {
    pub kdf: KdfConfig,
    pub lock: LockConfig,
    pub log: LogConfig,
}

/// Iteration counts for the derivation pipeline.
///
/// Documents sealed with non-default counts can only be opened with the
/// same counts, so these exist for testing and benchmarking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    /// Round 1, PBKDF2-HMAC-SHA1 (default: 1000)
    pub sha1_iterations: u32,
    /// Round 2, PBKDF2-HMAC-SHA256 (default: 14000)
    pub sha256_iterations: u32,
    /// Round 3, PBKDF2-HMAC-SHA256 (default: 585000)
    pub final_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Replace the document head with an empty `<head></head>`
    pub remove_head: bool,
    /// Collapse line breaks and indentation in the locked page
    pub minify: bool,
    /// Login markup to show instead of the built-in form
    pub login_template: Option<PathBuf>,
    /// Browser-side unlock script to inline into the locked page
    pub viewer_script: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for KdfConfig {
    fn default() -> Self {
        let params = KdfParams::default();
        Self {
            sha1_iterations: params.sha1_iterations,
            sha256_iterations: params.sha256_iterations,
            final_iterations: params.final_iterations,
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            remove_head: false,
            minify: true,
            login_template: None,
            viewer_script: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl KdfConfig {
    pub fn to_params(&self) -> KdfParams {
        KdfParams {
            sha1_iterations: self.sha1_iterations,
            sha256_iterations: self.sha256_iterations,
            final_iterations: self.final_iterations,
        }
    }

    pub fn is_default(&self) -> bool {
        self.to_params() == KdfParams::default()
    }
}

impl SealConfig {
    pub fn parse(content: &str) -> SealResult<Self> {
        let config: SealConfig =
            toml::from_str(content).map_err(|e| SealError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> SealResult<Self> {
        if !path.exists() {
            tracing::debug!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| SealError::Config(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> SealResult<()> {
        self.kdf
            .to_params()
            .validate()
            .map_err(|e| SealError::Config(e.to_string()))?;
        match self.log.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(SealError::Config(format!(
                "log.format must be \"json\" or \"text\", got {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[kdf]
sha1_iterations = 10
sha256_iterations = 20
final_iterations = 30

[lock]
remove_head = true
minify = false
login_template = "/srv/login.html"

[log]
level = "debug"
format = "json"
"#;
        let config = SealConfig::parse(toml_str).unwrap();

        assert_eq!(config.kdf.sha1_iterations, 10);
        assert_eq!(config.kdf.final_iterations, 30);
        assert!(!config.kdf.is_default());
        assert!(config.lock.remove_head);
        assert!(!config.lock.minify);
        assert_eq!(
            config.lock.login_template,
            Some(PathBuf::from("/srv/login.html"))
        );
        assert!(config.lock.viewer_script.is_none());
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config = SealConfig::parse("").unwrap();

        assert!(config.kdf.is_default());
        assert_eq!(config.kdf.final_iterations, 585000);
        assert!(!config.lock.remove_head);
        assert!(config.lock.minify);
        assert_eq!(config.log.level, "warn");
        assert_eq!(config.log.format, "text");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[lock]
remove_head = true
"#;
        let config = SealConfig::parse(toml_str).unwrap();

        // Overridden
        assert!(config.lock.remove_head);
        // Defaults
        assert!(config.lock.minify);
        assert_eq!(config.kdf.sha256_iterations, 14000);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let err = SealConfig::parse("[kdf]\nfinal_iterations = 0\n").unwrap_err();
        assert!(matches!(err, SealError::Config(_)));
    }

    #[test]
    fn test_bad_log_format_rejected() {
        let err = SealConfig::parse("[log]\nformat = \"xml\"\n").unwrap_err();
        assert!(matches!(err, SealError::Config(_)));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = SealConfig::load(&tmp.path().join("absent.toml")).unwrap();
        assert!(config.kdf.is_default());
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("sealpage.toml");
        std::fs::write(&path, "[log]\nlevel = \"trace\"\n").unwrap();
        let config = SealConfig::load(&path).unwrap();
        assert_eq!(config.log.level, "trace");
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = SealConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = SealConfig::parse(&toml_str).unwrap();

        assert_eq!(config.kdf.to_params(), parsed.kdf.to_params());
        assert_eq!(config.lock.minify, parsed.lock.minify);
        assert_eq!(config.log.level, parsed.log.level);
    }
}
