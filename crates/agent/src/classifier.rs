use std::collections::BTreeMap;

use chatflow_core::ports::{ClassifierError, IntentClassifier};
use chatflow_core::rules::RuleSet;

/// Deterministic intent classifier driven by the `keywords` declared on each
/// intent. The longest total keyword match wins; ties go to the label that
/// sorts first.
#[derive(Clone, Debug, Default)]
pub struct KeywordIntentClassifier {
    keywords: BTreeMap<String, Vec<String>>,
}

impl KeywordIntentClassifier {
    pub fn from_rules(rules: &RuleSet) -> Self {
        let keywords = rules
            .intents()
            .map(|(label, intent)| {
                let words = intent
                    .keywords
                    .iter()
                    .map(|keyword| normalize_text(keyword))
                    .filter(|keyword| !keyword.is_empty())
                    .collect::<Vec<_>>();
                (label.to_string(), words)
            })
            .collect();
        Self { keywords }
    }

    pub fn with_keywords<I, S>(mut self, label: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords.insert(
            label.into(),
            keywords.into_iter().map(|keyword| normalize_text(keyword.as_ref())).collect(),
        );
        self
    }

    fn score(&self, label: &str, text: &str) -> usize {
        self.keywords
            .get(label)
            .map(|keywords| {
                keywords
                    .iter()
                    .filter(|keyword| text.contains(keyword.as_str()))
                    .map(|keyword| keyword.chars().count())
                    .sum()
            })
            .unwrap_or(0)
    }
}

impl IntentClassifier for KeywordIntentClassifier {
    fn classify(
        &self,
        utterance: &str,
        candidates: &BTreeMap<String, String>,
    ) -> Result<Option<String>, ClassifierError> {
        let text = normalize_text(utterance);
        if text.is_empty() {
            return Ok(None);
        }

        let mut best: Option<(&str, usize)> = None;
        for label in candidates.keys() {
            let score = self.score(label, &text);
            if score == 0 {
                continue;
            }
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((label.as_str(), score));
            }
        }

        tracing::debug!(
            event_name = "intent.keyword_scored",
            candidates = candidates.len(),
            matched = best.map(|(label, _)| label).unwrap_or("none"),
            "keyword classification finished"
        );
        Ok(best.map(|(label, _)| label.to_string()))
    }
}

fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}
