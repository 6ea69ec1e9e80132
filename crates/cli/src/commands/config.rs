use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chatflow_core::config::{AppConfig, LoadOptions};
use toml::Value;

use crate::commands::CommandResult;

/// Environment variables consulted for each key, highest precedence first.
fn env_keys(key_path: &str) -> &'static [&'static str] {
    match key_path {
        "rules.path" => &["CHATFLOW_RULES_PATH"],
        "data.orders_path" => &["CHATFLOW_DATA_ORDERS_PATH"],
        "data.membership_path" => &["CHATFLOW_DATA_MEMBERSHIP_PATH"],
        "data.products_path" => &["CHATFLOW_DATA_PRODUCTS_PATH"],
        "data.complaints_path" => &["CHATFLOW_DATA_COMPLAINTS_PATH"],
        "session.input_timeout_secs" => &["CHATFLOW_SESSION_INPUT_TIMEOUT_SECS"],
        "session.exit_token" => &["CHATFLOW_SESSION_EXIT_TOKEN"],
        "logging.level" => &["CHATFLOW_LOGGING_LEVEL", "CHATFLOW_LOG_LEVEL"],
        "logging.format" => &["CHATFLOW_LOGGING_FORMAT", "CHATFLOW_LOG_FORMAT"],
        "logging.file" => &["CHATFLOW_LOGGING_FILE"],
        _ => &[],
    }
}

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("config", "config_validation", error.to_string(), 2)
        }
    };

    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value) in config.effective_values() {
        let source = field_source(key, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    CommandResult::text(0, lines.join("\n"))
}

fn detect_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("chatflow.toml"), PathBuf::from("config/chatflow.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys(key_path).iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, env_keys};

    #[test]
    fn nested_keys_are_found_in_the_file_document() {
        let doc = "[session]\nexit_token = \"quit\"\n".parse::<Value>().expect("toml");

        assert!(contains_path(&doc, "session.exit_token"));
        assert!(!contains_path(&doc, "session.input_timeout_secs"));
        assert!(!contains_path(&doc, "logging.level"));
    }

    #[test]
    fn log_aliases_are_consulted_after_the_primary_name() {
        assert_eq!(env_keys("logging.level"), ["CHATFLOW_LOGGING_LEVEL", "CHATFLOW_LOG_LEVEL"]);
        assert!(env_keys("unknown.key").is_empty());
    }
}
