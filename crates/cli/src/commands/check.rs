use chatflow_core::actions::unrecognized_actions;
use chatflow_core::config::{AppConfig, LoadOptions};
use chatflow_core::rules::RuleSet;
use chatflow_db::check_data_files;
use serde::Serialize;

use crate::commands::{json_or_error, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Serialize)]
struct CheckItem {
    name: String,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    command: &'static str,
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<CheckItem>,
}

/// Validates config, rules and data files without starting a conversation.
/// Config or rules failures exit 2; unreadable data files exit 1.
pub fn run(options: LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("check", "config_validation", error.to_string(), 2)
        }
    };
    let rules = match RuleSet::load(&config.rules.path) {
        Ok(rules) => rules,
        Err(error) => {
            return CommandResult::failure("check", "rules_validation", error.to_string(), 2)
        }
    };

    let report = build_report(&config, &rules);
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };
    CommandResult::text(exit_code, json_or_error(&report, "check", true))
}

fn build_report(config: &AppConfig, rules: &RuleSet) -> CheckReport {
    let mut checks = vec![
        CheckItem {
            name: "config_validation".to_string(),
            status: CheckStatus::Pass,
            details: "configuration loaded and validated".to_string(),
        },
        CheckItem {
            name: "rules_validation".to_string(),
            status: CheckStatus::Pass,
            details: format!(
                "{} intents, {} rules loaded from `{}`",
                rules.intents().count(),
                rules.rule_count(),
                config.rules.path.display()
            ),
        },
    ];

    let unknown = unrecognized_actions(rules);
    checks.push(if unknown.is_empty() {
        CheckItem {
            name: "rules_actions".to_string(),
            status: CheckStatus::Pass,
            details: "every referenced action is built in".to_string(),
        }
    } else {
        CheckItem {
            name: "rules_actions".to_string(),
            status: CheckStatus::Warn,
            details: format!("unrecognized actions: {}", unknown.join(", ")),
        }
    });

    for file in check_data_files(&config.data) {
        let name = format!("data.{}", file.name);
        checks.push(match (file.records, file.error) {
            (_, Some(error)) => CheckItem { name, status: CheckStatus::Fail, details: error },
            (records, None) => CheckItem {
                name,
                status: CheckStatus::Pass,
                details: format!(
                    "{} records in `{}`",
                    records.unwrap_or_default(),
                    file.path.display()
                ),
            },
        });
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let warned = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = match (failed, warned) {
        (true, _) => (CheckStatus::Fail, "check: one or more checks failed"),
        (false, true) => (CheckStatus::Warn, "check: passed with warnings"),
        (false, false) => (CheckStatus::Pass, "check: all checks passed"),
    };

    CheckReport { command: "check", overall_status, summary: summary.to_string(), checks }
}
