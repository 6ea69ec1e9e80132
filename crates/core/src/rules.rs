//! Declarative workflow rules: the intent catalog and the rule bound to each
//! intent, loaded once at startup and shared read-only by every session.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_FALLBACK_INTENT: &str = "DEFAULT";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentDefinition {
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    OrderNumber,
    PhoneNumber,
    ComplaintSummary,
    FreeText,
}

impl ExtractorKind {
    pub fn for_slot_name(name: &str) -> Self {
        match name {
            "order_number" => Self::OrderNumber,
            "phone_number" => Self::PhoneNumber,
            "complaint" | "complaint_summary" => Self::ComplaintSummary,
            _ => Self::FreeText,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorKind {
    OrderNumber,
    PhoneNumber,
    NonEmpty,
}

impl ValidatorKind {
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            Self::OrderNumber => is_order_number(value),
            Self::PhoneNumber => crate::domain::phone::is_valid_phone_number(value),
            Self::NonEmpty => !value.trim().is_empty(),
        }
    }
}

/// 8 to 20 ASCII alphanumerics with at least one digit.
pub fn is_order_number(value: &str) -> bool {
    (8..=20).contains(&value.len())
        && value.chars().all(|ch| ch.is_ascii_alphanumeric())
        && value.chars().any(|ch| ch.is_ascii_digit())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSpec {
    pub name: String,
    pub clarification_prompt: String,
    #[serde(default)]
    pub extractor: Option<ExtractorKind>,
    #[serde(default)]
    pub validator: Option<ValidatorKind>,
}

impl SlotSpec {
    pub fn extractor_kind(&self) -> ExtractorKind {
        self.extractor.unwrap_or_else(|| ExtractorKind::for_slot_name(&self.name))
    }

    pub fn validate(&self, value: &str) -> bool {
        self.validator.unwrap_or(ValidatorKind::NonEmpty).accepts(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum Rule {
    Reply {
        message: String,
    },
    ExtractAndExecute {
        required_slots: Vec<SlotSpec>,
        handler: String,
    },
    Actions {
        actions: Vec<String>,
    },
}

impl Rule {
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::Reply { .. } => "reply",
            Self::ExtractAndExecute { .. } => "extract_and_execute",
            Self::Actions { .. } => "actions",
        }
    }

    pub fn action_names(&self) -> Vec<&str> {
        match self {
            Self::Reply { .. } => Vec::new(),
            Self::ExtractAndExecute { handler, .. } => vec![handler.as_str()],
            Self::Actions { actions } => actions.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("could not read rules file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse rules file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: serde_yaml::Error },
    #[error("could not parse rules: {0}")]
    Parse(#[source] serde_yaml::Error),
    #[error("rules validation failed: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default = "default_fallback_intent")]
    fallback_intent: String,
    intents: BTreeMap<String, IntentDefinition>,
    #[serde(default)]
    rules: BTreeMap<String, Rule>,
}

fn default_fallback_intent() -> String {
    DEFAULT_FALLBACK_INTENT.to_string()
}

impl RuleSet {
    pub fn load(path: &Path) -> Result<Self, RulesError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| RulesError::ReadFile { path: path.to_path_buf(), source })?;
        let rules = serde_yaml::from_str::<Self>(&raw)
            .map_err(|source| RulesError::ParseFile { path: path.to_path_buf(), source })?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, RulesError> {
        let rules = serde_yaml::from_str::<Self>(raw).map_err(RulesError::Parse)?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn validate(&self) -> Result<(), RulesError> {
        if self.intents.is_empty() {
            return Err(RulesError::Validation("at least one intent must be declared".to_string()));
        }

        for (label, intent) in &self.intents {
            if label.trim().is_empty() {
                return Err(RulesError::Validation("intent labels must be non-empty".to_string()));
            }
            if intent.description.trim().is_empty() {
                return Err(RulesError::Validation(format!(
                    "intents.{label}.description must be non-empty"
                )));
            }
        }

        if !self.intents.contains_key(&self.fallback_intent) {
            return Err(RulesError::Validation(format!(
                "fallback_intent `{}` is not a declared intent",
                self.fallback_intent
            )));
        }

        for (label, rule) in &self.rules {
            if !self.intents.contains_key(label) {
                return Err(RulesError::Validation(format!(
                    "rules.{label} is bound to an undeclared intent"
                )));
            }
            validate_rule(label, rule)?;
        }

        Ok(())
    }

    pub fn fallback_intent(&self) -> &str {
        &self.fallback_intent
    }

    pub fn intent(&self, label: &str) -> Option<&IntentDefinition> {
        self.intents.get(label)
    }

    pub fn intents(&self) -> impl Iterator<Item = (&str, &IntentDefinition)> {
        self.intents.iter().map(|(label, intent)| (label.as_str(), intent))
    }

    pub fn rule_for(&self, intent: &str) -> Option<&Rule> {
        self.rules.get(intent)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Candidate label set handed to the intent classifier.
    pub fn candidates(&self) -> BTreeMap<String, String> {
        self.intents
            .iter()
            .map(|(label, intent)| (label.clone(), intent.description.clone()))
            .collect()
    }

    /// Every action name referenced by any rule, deduplicated.
    pub fn referenced_actions(&self) -> BTreeSet<&str> {
        self.rules.values().flat_map(Rule::action_names).collect()
    }
}

fn validate_rule(label: &str, rule: &Rule) -> Result<(), RulesError> {
    match rule {
        Rule::Reply { message } => {
            if message.trim().is_empty() {
                return Err(RulesError::Validation(format!(
                    "rules.{label}.message must be non-empty"
                )));
            }
        }
        Rule::ExtractAndExecute { required_slots, handler } => {
            if handler.trim().is_empty() {
                return Err(RulesError::Validation(format!(
                    "rules.{label}.handler must be non-empty"
                )));
            }
            let mut seen = BTreeSet::new();
            for slot in required_slots {
                if slot.name.trim().is_empty() {
                    return Err(RulesError::Validation(format!(
                        "rules.{label}.required_slots contains a slot without a name"
                    )));
                }
                if slot.clarification_prompt.trim().is_empty() {
                    return Err(RulesError::Validation(format!(
                        "rules.{label}.required_slots.{}.clarification_prompt must be non-empty",
                        slot.name
                    )));
                }
                if !seen.insert(slot.name.as_str()) {
                    return Err(RulesError::Validation(format!(
                        "rules.{label}.required_slots declares `{}` more than once",
                        slot.name
                    )));
                }
            }
        }
        Rule::Actions { actions } => {
            if actions.is_empty() {
                return Err(RulesError::Validation(format!(
                    "rules.{label}.actions must list at least one action"
                )));
            }
        }
    }
    Ok(())
}
