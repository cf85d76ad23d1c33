use config::{Config, ConfigError};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub data: DataConfig,
    #[serde(default)]
    pub s3: Option<S3Config>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// Root holding `song_data/` and `log_data/`; local path or s3:// URL.
    pub input_root: String,
    /// Root the five output tables are written under.
    pub output_root: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct S3Config {
    #[serde(default)]
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    #[serde(default)]
    pub allow_http: bool,
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("APP"));

        // Build the configuration
        let config = builder.build()?;

        // Try to deserialize the entire configuration
        let settings: Settings = config.try_deserialize()?;

        debug!(
            input_root = %settings.data.input_root,
            output_root = %settings.data.output_root,
            "Loaded pipeline locations"
        );

        Ok(settings)
    }
}
