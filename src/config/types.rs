use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::metrics::MetricsConfig;

/// Prefix for environment variables overriding nested configuration keys,
/// e.g. `SREWATCH_LOGGING__LEVEL=debug`.
pub const ENV_PREFIX: &str = "SREWATCH_";

/// Main service configuration.
///
/// Read once at startup and shared behind an `Arc`; nothing mutates it
/// afterwards.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct ConfigV1 {
    /// Name reported by the root endpoint and the log resource.
    pub app_name: String,
    pub host: String,
    pub port: u16,
    /// Deployment environment tag, e.g. "staging" or "production".
    pub environment: String,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

impl Default for ConfigV1 {
    fn default() -> Self {
        ConfigV1 {
            app_name: "sre-pleno-app".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            environment: "development".to_string(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl ConfigV1 {
    /// Address the HTTP listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Layered configuration sources, lowest precedence first: built-in
/// defaults, `./config.yaml`, the plain `ENVIRONMENT`/`PORT`/`HOST`
/// variables, then `SREWATCH_`-prefixed variables.
pub fn config_figment() -> Figment {
    Figment::from(Serialized::defaults(ConfigV1::default()))
        .merge(Yaml::file("./config.yaml"))
        .merge(Env::raw().only(&["ENVIRONMENT", "PORT", "HOST"]))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Extracts the configuration from an assembled figment.
pub fn from_figment(figment: Figment) -> Result<ConfigV1, figment::Error> {
    figment.extract::<ConfigV1>()
}

/// Load the configuration, exiting the process if it cannot be parsed.
pub fn load_config() -> ConfigV1 {
    match from_figment(config_figment()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(ConfigV1);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
