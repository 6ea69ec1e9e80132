//! Subcommands. Each returns a `CommandResult` that `crate::run` prints.

pub mod chat;
pub mod check;
pub mod config;

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// JSON body printed when a command cannot run.
#[derive(Debug, Serialize)]
struct FailurePayload<'a> {
    command: &'a str,
    status: &'static str,
    error_class: &'a str,
    message: String,
}

impl CommandResult {
    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = FailurePayload { command, status: "error", error_class, message: message.into() };
        Self { exit_code, output: json_or_error(&payload, command, false) }
    }

    pub fn text(exit_code: u8, output: impl Into<String>) -> Self {
        Self { exit_code, output: output.into() }
    }
}

/// `payload` as JSON, or a hand-built `serialization` error object for
/// `command` when serde refuses it.
pub(crate) fn json_or_error<T: Serialize>(payload: &T, command: &str, pretty: bool) -> String {
    let serialized =
        if pretty { serde_json::to_string_pretty(payload) } else { serde_json::to_string(payload) };
    serialized.unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"{}\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            escape_json(command),
            escape_json(&error.to_string())
        )
    })
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::Value;

    use super::{json_or_error, CommandResult};

    #[test]
    fn failure_payload_carries_class_and_message() {
        let result = CommandResult::failure("chat", "rules_validation", "missing \"DEFAULT\"", 2);

        assert_eq!(result.exit_code, 2);
        let payload: Value = serde_json::from_str(&result.output).expect("json");
        assert_eq!(payload["command"], "chat");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "rules_validation");
        assert_eq!(payload["message"], "missing \"DEFAULT\"");
    }

    #[test]
    fn unserializable_payload_falls_back_to_an_error_object() {
        let mut keyed_by_tuple = BTreeMap::new();
        keyed_by_tuple.insert((1, 2), "value");

        let output = json_or_error(&keyed_by_tuple, "check", true);

        let payload: Value = serde_json::from_str(&output).expect("fallback is valid json");
        assert_eq!(payload["command"], "check");
        assert_eq!(payload["error_class"], "serialization");
    }
}
