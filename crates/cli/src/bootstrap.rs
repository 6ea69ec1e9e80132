use std::sync::Arc;

use chatflow_agent::{default_extractors, KeywordIntentClassifier, PreferenceRecommender};
use chatflow_core::actions::{unrecognized_actions, ActionDispatcher};
use chatflow_core::audit::{AuditSink, TracingAuditSink};
use chatflow_core::config::{AppConfig, ConfigError, LoadOptions};
use chatflow_core::ports::RecordStores;
use chatflow_core::rules::{RuleSet, RulesError};
use chatflow_core::service::ChatService;
use chatflow_core::workflow::WorkflowEngine;
use chatflow_db::open_record_stores;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub service: ChatService,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Rules(#[from] RulesError),
}

impl BootstrapError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_validation",
            Self::Rules(_) => "rules_validation",
        }
    }
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

/// Loads the rules and wires the file-backed stores and default capabilities
/// into a ready `ChatService`. Invalid rules refuse to start.
pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        rules_path = %config.rules.path.display(),
        "starting chat bootstrap"
    );

    let rules = Arc::new(RuleSet::load(&config.rules.path)?);
    let unknown = unrecognized_actions(&rules);
    info!(
        event_name = "system.bootstrap.rules_loaded",
        correlation_id = "bootstrap",
        rules = rules.rule_count(),
        unrecognized_actions = unknown.len(),
        "workflow rules loaded"
    );

    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let service = build_service(&config, rules, open_record_stores(&config.data), audit);
    Ok(Application { config, service })
}

/// Wires a service from already-loaded parts.
pub fn build_service(
    config: &AppConfig,
    rules: Arc<RuleSet>,
    stores: RecordStores,
    audit: Arc<dyn AuditSink>,
) -> ChatService {
    let extractors = default_extractors();
    let classifier = Arc::new(KeywordIntentClassifier::from_rules(&rules));
    let dispatcher = ActionDispatcher::new(
        stores,
        Arc::new(PreferenceRecommender),
        extractors.clone(),
        Arc::clone(&audit),
    );
    let engine = WorkflowEngine::new(rules, classifier, extractors, dispatcher, Arc::clone(&audit));
    ChatService::new(engine, config.session.exit_token.clone(), audit)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chatflow_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use tempfile::TempDir;

    use super::{bootstrap, bootstrap_with_config, BootstrapError};

    #[test]
    fn invalid_rules_refuse_to_start() {
        let dir = TempDir::new().expect("tempdir");
        let rules_path = dir.path().join("rules.yaml");
        fs::write(
            &rules_path,
            "intents:\n  DEFAULT: { description: \"兜底\" }\nrules:\n  GHOST: { action_type: reply, message: \"hi\" }\n",
        )
        .expect("write rules");

        let mut config = AppConfig::default();
        config.rules.path = rules_path;

        let error = bootstrap_with_config(config).err().expect("undeclared intent is fatal");
        assert!(matches!(error, BootstrapError::Rules(_)));
        assert_eq!(error.error_class(), "rules_validation");
    }

    #[test]
    fn missing_rules_file_is_reported() {
        let dir = TempDir::new().expect("tempdir");
        let error = bootstrap(LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            overrides: ConfigOverrides {
                rules_path: Some(dir.path().join("absent.yaml")),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .err()
        .expect("missing rules file");

        assert!(error.to_string().contains("absent.yaml"));
    }
}
