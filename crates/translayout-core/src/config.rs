use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Language codes following ISO 639-1 with regional variants
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lang(pub String);

impl Lang {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Lang {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Lang {
    fn from(s: String) -> Self {
        Self(s)
    }
}

fn default_source_lang() -> Lang {
    Lang::new("en")
}

fn default_target_lang() -> Lang {
    Lang::new("hi")
}

/// Compute device for the OCR models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Auto,
    Cpu,
    Cuda,
    Mps,
}

impl Device {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
            Self::Mps => "mps",
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translator backend configuration for OpenAI-compatible APIs.
///
/// Supports llama.cpp, Ollama, DeepSeek, OpenAI, and any other OpenAI-compatible API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl TranslatorConfig {
    pub fn new(
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            api_key,
            model: model.into(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

const fn default_retry_count() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8080/v1".to_string(),
            api_key: None,
            model: "default_model".to_string(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// OCR service configuration.
///
/// The detector/recognition/layout batch sizes are model knobs carried in
/// every request rather than applied through process environment, so two
/// pipelines with different settings can coexist in one process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Base URL of the OCR HTTP service
    #[serde(default = "default_ocr_endpoint")]
    pub endpoint: String,

    /// Compute device requested from the OCR service
    #[serde(default)]
    pub device: Device,

    /// Pages submitted per OCR request
    #[serde(default = "default_ocr_batch_size")]
    pub batch_pages: usize,

    /// Batch size for the text detection model
    #[serde(default = "default_detector_batch_size")]
    pub detector_batch_size: usize,

    /// Batch size for the text recognition model
    #[serde(default = "default_recognition_batch_size")]
    pub recognition_batch_size: usize,

    /// Batch size for the layout analysis model
    #[serde(default = "default_layout_batch_size")]
    pub layout_batch_size: usize,
}

fn default_ocr_endpoint() -> String {
    "http://localhost:8765".to_string()
}

const fn default_ocr_batch_size() -> usize {
    4
}

const fn default_detector_batch_size() -> usize {
    16
}

const fn default_recognition_batch_size() -> usize {
    32
}

const fn default_layout_batch_size() -> usize {
    8
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ocr_endpoint(),
            device: Device::Auto,
            batch_pages: default_ocr_batch_size(),
            detector_batch_size: default_detector_batch_size(),
            recognition_batch_size: default_recognition_batch_size(),
            layout_batch_size: default_layout_batch_size(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source language
    #[serde(default = "default_source_lang")]
    pub source_lang: Lang,

    /// Target language
    #[serde(default = "default_target_lang")]
    pub target_lang: Lang,

    /// Resolution for page rasterization in raster mode
    #[serde(default = "default_dpi")]
    pub dpi: u32,

    /// Parallel workers for the translate+render stage
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,

    /// Translator backend configuration
    #[serde(default)]
    pub translator: TranslatorConfig,

    /// OCR service configuration
    #[serde(default)]
    pub ocr: OcrConfig,
}

const fn default_dpi() -> u32 {
    200
}

fn default_num_workers() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_lang: default_source_lang(),
            target_lang: default_target_lang(),
            dpi: default_dpi(),
            num_workers: default_num_workers(),
            translator: TranslatorConfig::default(),
            ocr: OcrConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::error::Error> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::error::Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        toml::from_str(&content)
            .map_err(|e| crate::error::Error::ConfigLoad(format!("Failed to parse config: {e}")))
    }

    /// Load from default locations (~/.config/translayout/config.toml, ./config.toml)
    pub fn load() -> Self {
        if let Some(config_dir) = config_dir() {
            let user_config = config_dir.join("translayout").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./config.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./config.toml: {}", e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }
}

/// Get the user's config directory following XDG conventions.
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}
