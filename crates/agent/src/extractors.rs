//! Default slot extractors. Each one searches the accumulated conversation,
//! newest user utterance first.

use chatflow_core::domain::phone::PHONE_NUMBER_LEN;
use chatflow_core::ports::{ExtractorSet, SlotExtractor};
use chatflow_core::rules::{is_order_number, ExtractorKind};
use chatflow_core::session::ChatHistory;

const ORDER_PREFIX: &str = "ORD";
pub const COMPLAINT_SUMMARY_MAX_CHARS: usize = 60;

pub fn default_extractors() -> ExtractorSet {
    ExtractorSet::default()
        .with(ExtractorKind::OrderNumber, OrderNumberExtractor)
        .with(ExtractorKind::PhoneNumber, PhoneNumberExtractor)
        .with(ExtractorKind::ComplaintSummary, ComplaintSummaryExtractor)
        .with(ExtractorKind::FreeText, FreeTextExtractor)
}

/// An 11-digit run (spaces and dashes ignored) from any user utterance. When
/// none exists, the longest digit run of the newest utterance is returned so
/// that validation can reject it.
#[derive(Clone, Copy, Debug, Default)]
pub struct PhoneNumberExtractor;

impl SlotExtractor for PhoneNumberExtractor {
    fn extract(&self, history: &ChatHistory) -> Option<String> {
        let phone = history.user_texts_newest_first().find_map(|text| {
            digit_runs(&strip_separators(text)).into_iter().find(|run| run.len() == PHONE_NUMBER_LEN)
        });
        phone.or_else(|| {
            let latest = strip_separators(history.latest_user_text()?);
            digit_runs(&latest).into_iter().max_by_key(String::len)
        })
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct OrderNumberExtractor;

impl SlotExtractor for OrderNumberExtractor {
    fn extract(&self, history: &ChatHistory) -> Option<String> {
        history.user_texts_newest_first().find_map(order_number_in)
    }
}

/// Normalizes the latest user utterance into a short complaint summary.
#[derive(Clone, Copy, Debug, Default)]
pub struct ComplaintSummaryExtractor;

impl SlotExtractor for ComplaintSummaryExtractor {
    fn extract(&self, history: &ChatHistory) -> Option<String> {
        let text = collapse_whitespace(history.latest_user_text()?);
        if text.is_empty() {
            return None;
        }

        let mut summary = text.chars().take(COMPLAINT_SUMMARY_MAX_CHARS).collect::<String>();
        if text.chars().count() > COMPLAINT_SUMMARY_MAX_CHARS {
            summary.push('…');
        }
        Some(format!("用户投诉：{summary}"))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FreeTextExtractor;

impl SlotExtractor for FreeTextExtractor {
    fn extract(&self, history: &ChatHistory) -> Option<String> {
        let text = history.latest_user_text()?.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

fn strip_separators(text: &str) -> String {
    text.chars().filter(|ch| !matches!(ch, '-' | ' ')).collect()
}

fn digit_runs(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .map(str::to_string)
        .collect()
}

/// `ORD`-prefixed tokens are preferred over other order-shaped tokens.
fn order_number_in(text: &str) -> Option<String> {
    let tokens = text
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|token| is_order_number(token))
        .collect::<Vec<_>>();
    tokens
        .iter()
        .find(|token| token.to_ascii_uppercase().starts_with(ORDER_PREFIX))
        .or_else(|| tokens.first())
        .map(|token| token.to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
