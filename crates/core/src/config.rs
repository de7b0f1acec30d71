//! Viewer configuration.
//!
//! Settings can be loaded from a TOML file, from environment variables, or
//! built programmatically with the `with_*` setters. Every source starts from
//! [`ViewerConfig::default`] and overrides only the keys it names.

use pdf_viewer_download::DownloadConfig;
use pdf_viewer_scheduler::PoolConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_CACHE_DIR: &str = "PDF_VIEWER_CACHE_DIR";
pub const ENV_CHUNK_SIZE: &str = "PDF_VIEWER_CHUNK_SIZE";
pub const ENV_CONNECT_TIMEOUT: &str = "PDF_VIEWER_CONNECT_TIMEOUT_SECS";
pub const ENV_READ_TIMEOUT: &str = "PDF_VIEWER_READ_TIMEOUT_SECS";
pub const ENV_IO_WORKERS: &str = "PDF_VIEWER_IO_WORKERS";

/// Errors that can occur while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Configuration for a [`PdfRendererView`](crate::PdfRendererView)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Directory holding the downloaded document
    pub cache_dir: PathBuf,
    /// File name of the downloaded document inside `cache_dir`
    pub cache_file_name: String,
    /// Read size used while streaming a download (bytes)
    pub chunk_size: usize,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// Number of background worker threads
    pub io_workers: usize,
    /// Scale of the un-zoomed view
    pub min_scale: f32,
    /// Largest zoom a pinch can reach
    pub max_scale: f32,
    /// Multiplier applied to page size in points when rasterizing
    pub render_scale: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            cache_dir: Self::default_cache_dir(),
            cache_file_name: "downloaded_pdf.pdf".to_string(),
            chunk_size: 8192,
            connect_timeout_secs: 15,
            read_timeout_secs: 30,
            io_workers: 2,
            min_scale: 1.0,
            max_scale: 3.0,
            render_scale: 1.0,
        }
    }
}

impl ViewerConfig {
    /// Returns the default cache directory for the current platform.
    ///
    /// - macOS: ~/Library/Caches/pdf-viewer
    /// - Linux: ~/.cache/pdf-viewer
    /// - Windows: %LOCALAPPDATA%\pdf-viewer
    pub fn default_cache_dir() -> PathBuf {
        match dirs::cache_dir() {
            Some(dir) => dir.join("pdf-viewer"),
            None => std::env::temp_dir().join("pdf-viewer"),
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PDF_VIEWER_CACHE_DIR`: download directory
    /// - `PDF_VIEWER_CHUNK_SIZE`: download read size in bytes (default: 8192)
    /// - `PDF_VIEWER_CONNECT_TIMEOUT_SECS`: connect timeout (default: 15)
    /// - `PDF_VIEWER_READ_TIMEOUT_SECS`: read timeout (default: 30)
    /// - `PDF_VIEWER_IO_WORKERS`: background worker count (default: 2)
    ///
    /// # Errors
    /// Returns an error if any variable holds a value that does not parse or
    /// if the resulting configuration fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().merge_env()
    }

    /// Overrides fields from environment variables, keeping the rest.
    pub fn merge_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(dir) = std::env::var(ENV_CACHE_DIR) {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(value) = env_value(ENV_CHUNK_SIZE)? {
            self.chunk_size = value;
        }
        if let Some(value) = env_value(ENV_CONNECT_TIMEOUT)? {
            self.connect_timeout_secs = value;
        }
        if let Some(value) = env_value(ENV_READ_TIMEOUT)? {
            self.read_timeout_secs = value;
        }
        if let Some(value) = env_value(ENV_IO_WORKERS)? {
            self.io_workers = value;
        }

        self.validate()?;
        Ok(self)
    }

    /// Loads configuration from a TOML file.
    ///
    /// Expected file format (every key optional):
    /// ```toml
    /// cache_dir = "/path/to/cache"
    /// chunk_size = 8192
    /// io_workers = 2
    /// max_scale = 3.0
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        contents.parse()
    }

    /// Saves configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        Ok(())
    }

    /// Sets the download directory.
    pub fn with_cache_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cache_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_cache_file_name(mut self, name: impl Into<String>) -> Self {
        self.cache_file_name = name.into();
        self
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    pub fn with_timeouts(mut self, connect_secs: u64, read_secs: u64) -> Self {
        self.connect_timeout_secs = connect_secs;
        self.read_timeout_secs = read_secs;
        self
    }

    pub fn with_io_workers(mut self, workers: usize) -> Self {
        self.io_workers = workers;
        self
    }

    pub fn with_scale_limits(mut self, min_scale: f32, max_scale: f32) -> Self {
        self.min_scale = min_scale;
        self.max_scale = max_scale;
        self
    }

    pub fn with_render_scale(mut self, scale: f32) -> Self {
        self.render_scale = scale;
        self
    }

    /// Check that the configuration can drive a view.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be at least 1".into()));
        }
        if self.io_workers == 0 {
            return Err(ConfigError::Invalid("io_workers must be at least 1".into()));
        }
        if self.cache_file_name.is_empty() {
            return Err(ConfigError::Invalid("cache_file_name must not be empty".into()));
        }
        let scales_ok = self.min_scale.is_finite()
            && self.max_scale.is_finite()
            && self.min_scale >= 1.0
            && self.min_scale < self.max_scale;
        if !scales_ok {
            return Err(ConfigError::Invalid(format!(
                "scale limits must satisfy 1 <= min < max, got {}..{}",
                self.min_scale, self.max_scale
            )));
        }
        if !(self.render_scale.is_finite() && self.render_scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "render_scale must be positive, got {}",
                self.render_scale
            )));
        }
        Ok(())
    }

    /// Full path of the downloaded document
    pub fn cache_file_path(&self) -> PathBuf {
        self.cache_dir.join(&self.cache_file_name)
    }

    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig {
            chunk_size: self.chunk_size,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            ..DownloadConfig::default()
        }
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new(self.io_workers)
    }
}

impl FromStr for ViewerConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

fn env_value<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            ENV_CACHE_DIR,
            ENV_CHUNK_SIZE,
            ENV_CONNECT_TIMEOUT,
            ENV_READ_TIMEOUT,
            ENV_IO_WORKERS,
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config() {
        let config = ViewerConfig::default();
        assert_eq!(config.cache_file_name, "downloaded_pdf.pdf");
        assert_eq!(config.chunk_size, 8192);
        assert_eq!(config.io_workers, 2);
        assert_eq!(config.min_scale, 1.0);
        assert_eq!(config.max_scale, 3.0);
        assert!(config.cache_dir.ends_with("pdf-viewer"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_setters() {
        let config = ViewerConfig::default()
            .with_cache_dir("/tmp/viewer")
            .with_cache_file_name("doc.pdf")
            .with_chunk_size(4096)
            .with_timeouts(5, 10)
            .with_io_workers(4)
            .with_scale_limits(1.0, 5.0)
            .with_render_scale(2.0);

        assert_eq!(config.cache_file_path(), PathBuf::from("/tmp/viewer/doc.pdf"));
        assert_eq!(config.pool_config().num_workers, 4);

        let download = config.download_config();
        assert_eq!(download.chunk_size, 4096);
        assert_eq!(download.connect_timeout, Duration::from_secs(5));
        assert_eq!(download.read_timeout, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let base = ViewerConfig::default();
        assert!(base.clone().with_chunk_size(0).validate().is_err());
        assert!(base.clone().with_io_workers(0).validate().is_err());
        assert!(base.clone().with_scale_limits(0.5, 3.0).validate().is_err());
        assert!(base.clone().with_scale_limits(2.0, 2.0).validate().is_err());
        assert!(base.clone().with_scale_limits(1.0, f32::NAN).validate().is_err());
        assert!(base.with_render_scale(0.0).validate().is_err());
    }

    #[test]
    fn test_from_toml_overrides_named_keys() {
        let config: ViewerConfig = r#"
            cache_dir = "/var/cache/viewer"
            chunk_size = 1024
            max_scale = 4.0
        "#
        .parse()
        .unwrap();

        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/viewer"));
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.max_scale, 4.0);
        assert_eq!(config.io_workers, 2);
    }

    #[test]
    fn test_from_toml_rejects_invalid_config() {
        assert!(matches!(
            "io_workers = 0".parse::<ViewerConfig>(),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            "chunk_size = \"big\"".parse::<ViewerConfig>(),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.toml");
        let config = ViewerConfig::default()
            .with_cache_dir(dir.path())
            .with_io_workers(3);

        config.save_to_file(&path).unwrap();
        let loaded = ViewerConfig::from_file(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        let result = ViewerConfig::from_file("/nonexistent/viewer.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        clear_env();
        std::env::set_var(ENV_CACHE_DIR, "/tmp/env-cache");
        std::env::set_var(ENV_CHUNK_SIZE, "2048");
        std::env::set_var(ENV_IO_WORKERS, "3");

        let config = ViewerConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/env-cache"));
        assert_eq!(config.chunk_size, 2048);
        assert_eq!(config.io_workers, 3);
        assert_eq!(config.read_timeout_secs, 30);
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_value() {
        clear_env();
        std::env::set_var(ENV_READ_TIMEOUT, "soon");

        let result = ViewerConfig::from_env();
        clear_env();

        match result {
            Err(ConfigError::InvalidValue { key, value }) => {
                assert_eq!(key, ENV_READ_TIMEOUT);
                assert_eq!(value, "soon");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_zero_workers() {
        clear_env();
        std::env::set_var(ENV_IO_WORKERS, "0");

        let result = ViewerConfig::from_env();
        clear_env();

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
