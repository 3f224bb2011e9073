use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "BOOKSTORE_ENV";
const CONFIG_DIR_ENV: &str = "BOOKSTORE_CONFIG_DIR";
const ENV_PREFIX: &str = "BOOKSTORE";

/// Shape of a legacy variable's value.
#[derive(Debug, Clone, Copy)]
enum LegacyValue {
    Scalar,
    /// Comma separated, entries trimmed.
    List,
}

/// Variables understood by earlier deployments, applied on top of every other source.
const LEGACY_OVERRIDES: &[(&str, &str, LegacyValue)] = &[
    ("MONGODB_URI", "database.uri", LegacyValue::Scalar),
    ("DB_NAME", "database.name", LegacyValue::Scalar),
    ("LOG_PATH", "telemetry.log_path", LegacyValue::Scalar),
    ("ALLOWED_ORIGINS", "cors.allowed_origins", LegacyValue::List),
    ("ALLOWED_METHODS", "cors.allowed_methods", LegacyValue::List),
    ("ALLOWED_HEADERS", "cors.allowed_headers", LegacyValue::List),
    ("EXPOSED_HEADERS", "cors.exposed_headers", LegacyValue::List),
    ("ALLOW_CREDENTIALS", "cors.allow_credentials", LegacyValue::Scalar),
    ("MAX_AGE", "cors.max_age_secs", LegacyValue::Scalar),
];

type Builder = config::ConfigBuilder<config::builder::DefaultState>;

/// Apply every non-empty legacy variable returned by `lookup` as an override.
fn apply_legacy_overrides<F>(mut builder: Builder, lookup: F) -> anyhow::Result<Builder>
where
    F: Fn(&str) -> Option<String>,
{
    for (variable, key, shape) in LEGACY_OVERRIDES {
        let Some(raw) = lookup(variable).filter(|v| !v.trim().is_empty()) else {
            continue;
        };

        let value: config::Value = match shape {
            LegacyValue::Scalar => raw.trim().to_string().into(),
            LegacyValue::List => raw
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
                .into(),
        };

        builder = builder
            .set_override(*key, value)
            .with_context(|| format!("invalid override for '{}' from {}", key, variable))?;
    }

    Ok(builder)
}

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub cors: CorsSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay,
    /// prefixed environment variables and the legacy variable names.
    ///
    /// `config_dir` takes precedence over `BOOKSTORE_CONFIG_DIR`; without either the
    /// `config` directory under the working directory is used.
    pub fn load(config_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir =
            config_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));
        let config_dir = match config_dir {
            Some(dir) => dir,
            None => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        Self::from_dir(&config_dir, &environment)
    }

    /// Build settings from the files in `config_dir` for the named environment,
    /// overlaid with the process environment.
    pub fn from_dir(config_dir: &Path, environment: &str) -> anyhow::Result<Self> {
        let parsed_environment: Environment = environment.parse()?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .with_list_parse_key("cors.allowed_methods")
                    .with_list_parse_key("cors.allowed_headers")
                    .with_list_parse_key("cors.exposed_headers")
                    .try_parsing(true),
            );

        let builder = apply_legacy_overrides(builder, |name| std::env::var(name).ok())?;

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = parsed_environment;

        Ok(settings)
    }

    /// Address the HTTP listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Upper bound on the drain period once a termination signal arrives.
    #[serde(default = "ServerSettings::default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }

    fn default_shutdown_timeout_secs() -> u64 {
        5
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
            shutdown_timeout_secs: Self::default_shutdown_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_uri")]
    pub uri: String,
    #[serde(default = "DatabaseSettings::default_name")]
    pub name: String,
}

impl DatabaseSettings {
    fn default_uri() -> String {
        "mongodb://127.0.0.1:27017".to_string()
    }

    fn default_name() -> String {
        "bookstore".to_string()
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            uri: Self::default_uri(),
            name: Self::default_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// Default filter directive; `RUST_LOG` wins when set.
    #[serde(default = "TelemetrySettings::default_log_level")]
    pub log_level: String,
    /// Optional file receiving a JSON copy of every log line.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
}

impl TelemetrySettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_level: Self::default_log_level(),
            log_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Cross-origin policy applied to every route.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Exact origins, or `*` for any origin.
    #[serde(default = "CorsSettings::default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "CorsSettings::default_allowed_methods")]
    pub allowed_methods: Vec<String>,
    #[serde(default = "CorsSettings::default_allowed_headers")]
    pub allowed_headers: Vec<String>,
    #[serde(default = "CorsSettings::default_exposed_headers")]
    pub exposed_headers: Vec<String>,
    /// Ignored when any origin is allowed.
    #[serde(default)]
    pub allow_credentials: bool,
    #[serde(default = "CorsSettings::default_max_age_secs")]
    pub max_age_secs: u64,
}

impl CorsSettings {
    fn default_allowed_origins() -> Vec<String> {
        vec!["*".to_string()]
    }

    fn default_allowed_methods() -> Vec<String> {
        ["GET", "POST", "PUT", "DELETE", "OPTIONS", "HEAD"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn default_allowed_headers() -> Vec<String> {
        ["Authorization", "Content-Type", "X-Requested-With"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn default_exposed_headers() -> Vec<String> {
        vec!["Authorization".to_string()]
    }

    fn default_max_age_secs() -> u64 {
        12 * 60 * 60
    }

    /// Whether the policy admits every origin.
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == "*")
    }
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allowed_origins: Self::default_allowed_origins(),
            allowed_methods: Self::default_allowed_methods(),
            allowed_headers: Self::default_allowed_headers(),
            exposed_headers: Self::default_exposed_headers(),
            allow_credentials: false,
            max_age_secs: Self::default_max_age_secs(),
        }
    }
}
