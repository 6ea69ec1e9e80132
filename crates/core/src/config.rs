use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_INPUT_TIMEOUT_SECS: u64 = 3600;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub rules: RulesConfig,
    pub data: DataConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RulesConfig {
    pub path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataConfig {
    pub orders_path: PathBuf,
    pub membership_path: PathBuf,
    pub products_path: PathBuf,
    pub complaints_path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub input_timeout_secs: u64,
    pub exit_token: String,
}

impl SessionConfig {
    pub fn input_timeout(&self) -> Duration {
        Duration::from_secs(self.input_timeout_secs)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub rules_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub input_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rules: RulesConfig { path: PathBuf::from("config/rules.yaml") },
            data: DataConfig::under(Path::new("data")),
            session: SessionConfig { input_timeout_secs: 60, exit_token: "exit".to_string() },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Compact,
                file: None,
            },
        }
    }
}

impl DataConfig {
    /// Default file names rooted at `dir`.
    pub fn under(dir: &Path) -> Self {
        Self {
            orders_path: dir.join("orders.json"),
            membership_path: dir.join("membership.json"),
            products_path: dir.join("products.json"),
            complaints_path: dir.join("complaints.jsonl"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("chatflow.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Flattened `(key, value)` view in file order, used by `chatflow config`.
    pub fn effective_values(&self) -> Vec<(&'static str, String)> {
        vec![
            ("rules.path", self.rules.path.display().to_string()),
            ("data.orders_path", self.data.orders_path.display().to_string()),
            ("data.membership_path", self.data.membership_path.display().to_string()),
            ("data.products_path", self.data.products_path.display().to_string()),
            ("data.complaints_path", self.data.complaints_path.display().to_string()),
            ("session.input_timeout_secs", self.session.input_timeout_secs.to_string()),
            ("session.exit_token", self.session.exit_token.clone()),
            ("logging.level", self.logging.level.clone()),
            ("logging.format", self.logging.format.as_str().to_string()),
            (
                "logging.file",
                self.logging
                    .file
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "<stderr>".to_string()),
            ),
        ]
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(rules) = patch.rules {
            if let Some(path) = rules.path {
                self.rules.path = path;
            }
        }

        if let Some(data) = patch.data {
            if let Some(path) = data.orders_path {
                self.data.orders_path = path;
            }
            if let Some(path) = data.membership_path {
                self.data.membership_path = path;
            }
            if let Some(path) = data.products_path {
                self.data.products_path = path;
            }
            if let Some(path) = data.complaints_path {
                self.data.complaints_path = path;
            }
        }

        if let Some(session) = patch.session {
            if let Some(input_timeout_secs) = session.input_timeout_secs {
                self.session.input_timeout_secs = input_timeout_secs;
            }
            if let Some(exit_token) = session.exit_token {
                self.session.exit_token = exit_token;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
            if let Some(file) = logging.file {
                self.logging.file = Some(file);
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CHATFLOW_RULES_PATH") {
            self.rules.path = PathBuf::from(value);
        }

        if let Some(value) = read_env("CHATFLOW_DATA_ORDERS_PATH") {
            self.data.orders_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("CHATFLOW_DATA_MEMBERSHIP_PATH") {
            self.data.membership_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("CHATFLOW_DATA_PRODUCTS_PATH") {
            self.data.products_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("CHATFLOW_DATA_COMPLAINTS_PATH") {
            self.data.complaints_path = PathBuf::from(value);
        }

        if let Some(value) = read_env("CHATFLOW_SESSION_INPUT_TIMEOUT_SECS") {
            self.session.input_timeout_secs =
                parse_u64("CHATFLOW_SESSION_INPUT_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CHATFLOW_SESSION_EXIT_TOKEN") {
            self.session.exit_token = value;
        }

        let log_level =
            read_env("CHATFLOW_LOGGING_LEVEL").or_else(|| read_env("CHATFLOW_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CHATFLOW_LOGGING_FORMAT").or_else(|| read_env("CHATFLOW_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }
        if let Some(value) = read_env("CHATFLOW_LOGGING_FILE") {
            self.logging.file = Some(PathBuf::from(value));
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(rules_path) = overrides.rules_path {
            self.rules.path = rules_path;
        }
        if let Some(data_dir) = overrides.data_dir {
            self.data = DataConfig::under(&data_dir);
        }
        if let Some(input_timeout_secs) = overrides.input_timeout_secs {
            self.session.input_timeout_secs = input_timeout_secs;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_rules(&self.rules)?;
        validate_data(&self.data)?;
        validate_session(&self.session)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("chatflow.toml"), PathBuf::from("config/chatflow.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_rules(rules: &RulesConfig) -> Result<(), ConfigError> {
    if rules.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("rules.path must not be empty".to_string()));
    }
    Ok(())
}

fn validate_data(data: &DataConfig) -> Result<(), ConfigError> {
    let paths = [
        ("data.orders_path", &data.orders_path),
        ("data.membership_path", &data.membership_path),
        ("data.products_path", &data.products_path),
        ("data.complaints_path", &data.complaints_path),
    ];
    for (key, path) in paths {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(format!("{key} must not be empty")));
        }
    }
    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if !(1..=MAX_INPUT_TIMEOUT_SECS).contains(&session.input_timeout_secs) {
        return Err(ConfigError::Validation(format!(
            "session.input_timeout_secs must be between 1 and {MAX_INPUT_TIMEOUT_SECS}"
        )));
    }
    if session.exit_token.trim().is_empty() {
        return Err(ConfigError::Validation("session.exit_token must not be blank".to_string()));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    rules: Option<RulesPatch>,
    data: Option<DataPatch>,
    session: Option<SessionPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct RulesPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct DataPatch {
    orders_path: Option<PathBuf>,
    membership_path: Option<PathBuf>,
    products_path: Option<PathBuf>,
    complaints_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    input_timeout_secs: Option<u64>,
    exit_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
    file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const ALL_VARS: &[&str] = &[
        "CHATFLOW_RULES_PATH",
        "CHATFLOW_DATA_ORDERS_PATH",
        "CHATFLOW_SESSION_INPUT_TIMEOUT_SECS",
        "CHATFLOW_SESSION_EXIT_TOKEN",
        "CHATFLOW_LOGGING_LEVEL",
        "CHATFLOW_LOG_LEVEL",
        "CHATFLOW_LOGGING_FORMAT",
        "CHATFLOW_LOG_FORMAT",
        "TEST_CHATFLOW_DATA_DIR",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn missing_file() -> Option<PathBuf> {
        Some(PathBuf::from("/nonexistent/chatflow-test/chatflow.toml"))
    }

    #[test]
    fn defaults_are_valid() -> Result<(), String> {
        let config = AppConfig::default();
        config.validate().map_err(|err| err.to_string())?;
        ensure(config.session.input_timeout_secs == 60, "default timeout should be 60s")?;
        ensure(config.session.exit_token == "exit", "default exit token should be `exit`")?;
        ensure(
            config.rules.path == PathBuf::from("config/rules.yaml"),
            "default rules path should be config/rules.yaml",
        )?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "default format is compact")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);
        env::set_var("TEST_CHATFLOW_DATA_DIR", "/srv/chatflow");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("chatflow.toml");
            fs::write(
                &path,
                r#"
[data]
orders_path = "${TEST_CHATFLOW_DATA_DIR}/orders.json"

[session]
input_timeout_secs = 15
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.data.orders_path == PathBuf::from("/srv/chatflow/orders.json"),
                "orders path should be interpolated from environment",
            )?;
            ensure(config.session.input_timeout_secs == 15, "file timeout should apply")?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_an_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("chatflow.toml");
        fs::write(&path, "[rules]\npath = \"${TEST_CHATFLOW_DATA_DIR}/rules.yaml\"\n")
            .map_err(|err| err.to_string())?;

        let error = AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            .err();
        ensure(
            matches!(error, Some(ConfigError::MissingEnvInterpolation { ref var }) if var == "TEST_CHATFLOW_DATA_DIR"),
            "unset interpolation variable should be reported by name",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);
        env::set_var("CHATFLOW_LOG_LEVEL", "warn");
        env::set_var("CHATFLOW_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions {
                config_path: missing_file(),
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);
        env::set_var("CHATFLOW_RULES_PATH", "/env/rules.yaml");
        env::set_var("CHATFLOW_SESSION_EXIT_TOKEN", "quit");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("chatflow.toml");
            fs::write(
                &path,
                r#"
[rules]
path = "/file/rules.yaml"

[session]
input_timeout_secs = 30
exit_token = "bye"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    input_timeout_secs: Some(5),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.rules.path == PathBuf::from("/env/rules.yaml"),
                "env rules path should win over file",
            )?;
            ensure(config.session.exit_token == "quit", "env exit token should win over file")?;
            ensure(config.session.input_timeout_secs == 5, "override timeout should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn unparseable_numeric_env_value_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);
        env::set_var("CHATFLOW_SESSION_INPUT_TIMEOUT_SECS", "soon");

        let error =
            AppConfig::load(LoadOptions { config_path: missing_file(), ..LoadOptions::default() })
                .err();
        clear_vars(ALL_VARS);

        ensure(
            matches!(
                error,
                Some(ConfigError::InvalidEnvOverride { ref key, .. })
                    if key == "CHATFLOW_SESSION_INPUT_TIMEOUT_SECS"
            ),
            "bad timeout env value should be an InvalidEnvOverride",
        )
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        let error = AppConfig::load(LoadOptions {
            config_path: missing_file(),
            overrides: ConfigOverrides { input_timeout_secs: Some(0), ..ConfigOverrides::default() },
            ..LoadOptions::default()
        })
        .err();

        ensure(
            matches!(
                error,
                Some(ConfigError::Validation(ref message))
                    if message.contains("session.input_timeout_secs")
            ),
            "validation failure should mention session.input_timeout_secs",
        )
    }

    #[test]
    fn required_file_must_exist() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        let error = AppConfig::load(LoadOptions {
            config_path: missing_file(),
            require_file: true,
            ..LoadOptions::default()
        })
        .err();
        ensure(
            matches!(error, Some(ConfigError::MissingConfigFile(_))),
            "missing required file should be reported",
        )
    }

    #[test]
    fn data_dir_override_rebases_every_data_file() -> Result<(), String> {
        let mut config = AppConfig::default();
        config.apply_overrides(ConfigOverrides {
            data_dir: Some(PathBuf::from("/tmp/fixtures")),
            ..ConfigOverrides::default()
        });

        ensure(
            config.data.membership_path == PathBuf::from("/tmp/fixtures/membership.json"),
            "membership path should move under the override dir",
        )?;
        ensure(
            config.data.complaints_path == PathBuf::from("/tmp/fixtures/complaints.jsonl"),
            "complaint log should move under the override dir",
        )?;
        ensure(
            config
                .effective_values()
                .iter()
                .any(|(key, value)| *key == "logging.file" && value == "<stderr>"),
            "effective values should show stderr logging",
        )
    }
}
