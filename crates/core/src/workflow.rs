//! Turn processing: classify, resolve the rule, fill slots, dispatch.

use std::sync::Arc;

use crate::actions::{ActionDispatcher, ActionKind};
use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::errors::{ApplicationError, DomainError, TurnError};
use crate::flows::{transition, SlotFillEvent, SlotFillOutcome, SlotFillState, SlotFiller};
use crate::ports::{ExtractorSet, IntentClassifier, Prompter};
use crate::rules::{Rule, RuleSet, SlotSpec};
use crate::session::{PendingSlotFill, SessionState};

pub const CANNOT_HANDLE_RESPONSE: &str = "抱歉，我不知道如何处理这个请求。";

pub struct WorkflowEngine {
    rules: Arc<RuleSet>,
    classifier: Arc<dyn IntentClassifier>,
    extractors: ExtractorSet,
    dispatcher: ActionDispatcher,
    audit: Arc<dyn AuditSink>,
}

impl WorkflowEngine {
    pub fn new(
        rules: Arc<RuleSet>,
        classifier: Arc<dyn IntentClassifier>,
        extractors: ExtractorSet,
        dispatcher: ActionDispatcher,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { rules, classifier, extractors, dispatcher, audit }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Processes one utterance and returns the assistant's response. Only a
    /// failed interactive read inside a collection action is an error.
    pub fn process(
        &self,
        session: &mut SessionState,
        utterance: &str,
        prompter: &mut dyn Prompter,
    ) -> Result<String, TurnError> {
        let context = AuditContext::for_turn(session.id.clone(), "workflow-engine");
        session.history.push_user(utterance);

        let intent = match self.answered_pending(session, &context) {
            Some(intent) => intent,
            None => {
                let classified = self.classify(utterance, &context);
                self.resolve_pending(session, classified, &context)
            }
        };

        let response = match self.rules.rule_for(&intent) {
            None => {
                self.audit.emit(
                    context
                        .event("rule.missing", AuditCategory::Rule, AuditOutcome::Rejected)
                        .with_metadata("intent", intent.clone()),
                );
                CANNOT_HANDLE_RESPONSE.to_string()
            }
            Some(Rule::Reply { message }) => message.clone(),
            Some(Rule::ExtractAndExecute { required_slots, handler }) => self.extract_and_execute(
                &intent,
                required_slots,
                handler,
                session,
                prompter,
                &context,
            )?,
            Some(Rule::Actions { actions }) => {
                let mut messages = Vec::with_capacity(actions.len());
                for name in actions {
                    let outcome = self.dispatcher.dispatch(
                        &ActionKind::parse(name),
                        session,
                        prompter,
                        &context,
                    )?;
                    messages.push(outcome.message);
                }
                messages.join("\n")
            }
        };

        session.history.push_assistant(response.clone());
        Ok(response)
    }

    /// Classifier failures, "no match" and labels outside the candidate set
    /// all degrade to the fallback intent.
    fn classify(&self, utterance: &str, context: &AuditContext) -> Option<String> {
        let candidates = self.rules.candidates();
        match self.classifier.classify(utterance, &candidates) {
            Ok(Some(label)) if candidates.contains_key(&label) => {
                self.audit.emit(
                    context
                        .event("intent.classified", AuditCategory::Classification, AuditOutcome::Success)
                        .with_metadata("intent", label.clone()),
                );
                Some(label)
            }
            Ok(Some(label)) => {
                self.audit.emit(
                    context
                        .event("intent.fallback", AuditCategory::Classification, AuditOutcome::Rejected)
                        .with_metadata("reason", "unknown_label")
                        .with_metadata("label", label),
                );
                None
            }
            Ok(None) => {
                self.audit.emit(
                    context
                        .event("intent.fallback", AuditCategory::Classification, AuditOutcome::Rejected)
                        .with_metadata("reason", "no_match"),
                );
                None
            }
            Err(error) => {
                self.audit.emit(
                    context
                        .event("intent.fallback", AuditCategory::Classification, AuditOutcome::Failed)
                        .with_metadata("reason", "classifier_error")
                        .with_metadata("error", error.to_string()),
                );
                None
            }
        }
    }

    /// The suspended rule keeps the turn when the extended history now fills
    /// its pending slot, whatever the utterance would classify to.
    fn answered_pending(&self, session: &SessionState, context: &AuditContext) -> Option<String> {
        let pending = session.pending.as_ref()?;
        let Some(Rule::ExtractAndExecute { required_slots, .. }) =
            self.rules.rule_for(&pending.intent)
        else {
            return None;
        };
        let spec = required_slots.iter().find(|spec| spec.name == pending.state.slot())?;
        let value = self.extractors.get(spec.extractor_kind())?.extract(&session.history)?;
        if !spec.validate(value.trim()) {
            return None;
        }

        self.audit.emit(
            context
                .event("slot.answered", AuditCategory::Slot, AuditOutcome::Success)
                .with_metadata("intent", pending.intent.clone())
                .with_metadata("slot", spec.name.clone()),
        );
        Some(pending.intent.clone())
    }

    fn resolve_pending(
        &self,
        session: &mut SessionState,
        classified: Option<String>,
        context: &AuditContext,
    ) -> String {
        let fallback = self.rules.fallback_intent();
        let Some(pending) = session.pending.as_ref() else {
            return classified.unwrap_or_else(|| fallback.to_string());
        };

        match classified {
            Some(intent) if intent != fallback && intent != pending.intent => {
                self.audit.emit(
                    context
                        .event("slot.abandoned", AuditCategory::Slot, AuditOutcome::Rejected)
                        .with_metadata("intent", pending.intent.clone())
                        .with_metadata("slot", pending.state.slot().to_string()),
                );
                session.pending = None;
                intent
            }
            _ => pending.intent.clone(),
        }
    }

    fn extract_and_execute(
        &self,
        intent: &str,
        required_slots: &[SlotSpec],
        handler: &str,
        session: &mut SessionState,
        prompter: &mut dyn Prompter,
        context: &AuditContext,
    ) -> Result<String, TurnError> {
        match self.fill_slots(intent, required_slots, session, context) {
            Ok(SlotFillOutcome::NeedsClarification { prompt, .. }) => Ok(prompt),
            Ok(SlotFillOutcome::Complete) => {
                let outcome = self.dispatcher.dispatch(
                    &ActionKind::parse(handler),
                    session,
                    prompter,
                    context,
                )?;
                session.consume_slots(required_slots.iter().map(|slot| slot.name.as_str()));
                Ok(outcome.message)
            }
            Err(error) => {
                session.pending = None;
                let error = ApplicationError::from(error);
                tracing::error!(
                    event_name = "slot.fill_failed",
                    session_id = %session.id,
                    correlation_id = %context.correlation_id,
                    error_class = error.error_class(),
                    error = %error,
                    "slot filling failed"
                );
                Ok(error.into_interface(context.correlation_id.clone()).user_message().to_string())
            }
        }
    }

    fn fill_slots(
        &self,
        intent: &str,
        required_slots: &[SlotSpec],
        session: &mut SessionState,
        context: &AuditContext,
    ) -> Result<SlotFillOutcome, DomainError> {
        if let Some(pending) = session.pending.take() {
            transition(&pending.state, &SlotFillEvent::UtteranceReceived)?;
        }

        let filler = SlotFiller::new(&self.extractors, self.audit.as_ref());
        let outcome = filler.run(required_slots, session, context)?;
        if let SlotFillOutcome::NeedsClarification { slot, .. } = &outcome {
            session.pending = Some(PendingSlotFill {
                intent: intent.to_string(),
                state: SlotFillState::Clarifying { slot: slot.clone() },
            });
        }
        Ok(outcome)
    }
}
