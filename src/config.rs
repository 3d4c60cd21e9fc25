use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub cors: CorsSettings,
    #[serde(default)]
    pub google: GoogleSettings,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub upload: UploadSettings,
    #[serde(default)]
    pub models: ModelSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10000
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// The single origin allowed to call this service
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allowed_origin: default_allowed_origin(),
        }
    }
}

fn default_allowed_origin() -> String {
    "https://founditforyou.netlify.app".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleSettings {
    /// Drive v3 files endpoint, overridable so tests can point at a mock server
    #[serde(default = "default_drive_endpoint")]
    pub drive_endpoint: String,
    /// A missing key is reported per-request, never a startup failure
    pub api_key: Option<String>,
    #[serde(default = "default_drive_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            drive_endpoint: default_drive_endpoint(),
            api_key: None,
            timeout_secs: default_drive_timeout_secs(),
        }
    }
}

fn default_drive_endpoint() -> String {
    "https://www.googleapis.com/drive/v3/files".to_string()
}

fn default_drive_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchSettings {
    /// Timeout for fetching one target image
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_fetch_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadSettings {
    /// Ceiling for one uploaded reference image
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
        }
    }
}

fn default_max_bytes() -> usize {
    5 * 1024 * 1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_detector_path")]
    pub detector: PathBuf,
    #[serde(default = "default_embedder_path")]
    pub embedder: PathBuf,
    #[serde(default = "default_genderage_path")]
    pub genderage: PathBuf,
    #[serde(default = "default_emotion_path")]
    pub emotion: PathBuf,
    #[serde(default = "default_race_path")]
    pub race: PathBuf,
    /// Strict mode fails analysis when no face is detected; permissive mode
    /// falls back to analyzing the whole frame
    #[serde(default)]
    pub require_face: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            detector: default_detector_path(),
            embedder: default_embedder_path(),
            genderage: default_genderage_path(),
            emotion: default_emotion_path(),
            race: default_race_path(),
            require_face: false,
        }
    }
}

fn default_detector_path() -> PathBuf {
    PathBuf::from("models/scrfd_500m.onnx")
}

fn default_embedder_path() -> PathBuf {
    PathBuf::from("models/arcface_r50.onnx")
}

fn default_genderage_path() -> PathBuf {
    PathBuf::from("models/genderage.onnx")
}

fn default_emotion_path() -> PathBuf {
    PathBuf::from("models/emotion_ferplus.onnx")
}

fn default_race_path() -> PathBuf {
    PathBuf::from("models/race_vgg.onnx")
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml, config/local.toml)
    /// 3. Environment variables (prefixed with FACEFIND__)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            // Add default config file
            .add_source(File::with_name("config/default").required(false))
            // Add local config file (for development overrides)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (prefixed with FACEFIND__)
            // e.g., FACEFIND__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("FACEFIND")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        // Fold in the bare env names the hosting platform sets
        let settings = apply_env_overrides(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("FACEFIND")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// Fold the hosting platform's bare environment variables into the config.
/// `MY_GOOGLE_API_KEY` carries the Drive API key and `PORT` the listen port.
fn apply_env_overrides(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let api_key = env::var("MY_GOOGLE_API_KEY")
        .or_else(|_| env::var("FACEFIND__GOOGLE__API_KEY"))
        .ok();

    let port = env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok());

    let mut builder = Config::builder().add_source(settings);

    if let Some(api_key) = api_key {
        builder = builder.set_override("google.api_key", api_key)?;
    }
    if let Some(port) = port {
        builder = builder.set_override("server.port", port as i64)?;
    }

    builder.build()
}
