use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::flows::states::{SlotFillEvent, SlotFillState, SlotTransition};
use crate::ports::ExtractorSet;
use crate::rules::SlotSpec;
use crate::session::SessionState;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SlotFillError {
    #[error("invalid slot-filling transition from {state:?} using event {event:?}")]
    InvalidTransition { state: SlotFillState, event: SlotFillEvent },
    #[error("slot filling stopped in unsettled state {state:?}")]
    Unsettled { state: SlotFillState },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotFillOutcome {
    /// Every required slot is present in the session.
    Complete,
    /// The turn ends on this slot's clarification prompt.
    NeedsClarification { slot: String, prompt: String },
}

pub fn transition(
    current: &SlotFillState,
    event: &SlotFillEvent,
) -> Result<SlotTransition, SlotFillError> {
    use SlotFillEvent::{
        Extracted, NotFound, UtteranceReceived, ValidationFailed, ValidationPassed,
    };
    use SlotFillState::{AwaitingSlot, Clarifying, Filled, Validating};

    let to = match (current, event) {
        (AwaitingSlot { slot }, Extracted { value }) => {
            Validating { slot: slot.clone(), value: value.clone() }
        }
        (AwaitingSlot { slot }, NotFound) => Clarifying { slot: slot.clone() },
        (Validating { slot, value }, ValidationPassed) => {
            Filled { slot: slot.clone(), value: value.clone() }
        }
        (Validating { slot, .. }, ValidationFailed) => Clarifying { slot: slot.clone() },
        (Clarifying { slot }, UtteranceReceived) => AwaitingSlot { slot: slot.clone() },
        _ => {
            return Err(SlotFillError::InvalidTransition {
                state: current.clone(),
                event: event.clone(),
            });
        }
    };

    Ok(SlotTransition { from: current.clone(), to, event: event.clone() })
}

/// Drives the slot-filling protocol for one turn. Never loops waiting for
/// input: the first slot that cannot be filled suspends the turn.
pub struct SlotFiller<'a> {
    extractors: &'a ExtractorSet,
    audit: &'a dyn AuditSink,
}

impl<'a> SlotFiller<'a> {
    pub fn new(extractors: &'a ExtractorSet, audit: &'a dyn AuditSink) -> Self {
        Self { extractors, audit }
    }

    pub fn run(
        &self,
        slots: &[SlotSpec],
        session: &mut SessionState,
        context: &AuditContext,
    ) -> Result<SlotFillOutcome, SlotFillError> {
        for spec in slots {
            if session.slot(&spec.name).is_some() {
                continue;
            }

            match self.fill_one(spec, session)? {
                SlotFillState::Filled { slot, value } => {
                    self.audit.emit(
                        context
                            .event("slot.filled", AuditCategory::Slot, AuditOutcome::Success)
                            .with_metadata("slot", slot.clone()),
                    );
                    session.fill_slot(slot, value);
                }
                SlotFillState::Clarifying { slot } => {
                    self.audit.emit(
                        context
                            .event("slot.clarifying", AuditCategory::Slot, AuditOutcome::Rejected)
                            .with_metadata("slot", slot.clone()),
                    );
                    return Ok(SlotFillOutcome::NeedsClarification {
                        slot,
                        prompt: spec.clarification_prompt.clone(),
                    });
                }
                state => return Err(SlotFillError::Unsettled { state }),
            }
        }

        Ok(SlotFillOutcome::Complete)
    }

    fn fill_one(
        &self,
        spec: &SlotSpec,
        session: &SessionState,
    ) -> Result<SlotFillState, SlotFillError> {
        let awaiting = SlotFillState::AwaitingSlot { slot: spec.name.clone() };

        let extracted = match self.extractors.get(spec.extractor_kind()) {
            Some(extractor) => extractor.extract(&session.history),
            None => {
                tracing::warn!(
                    event_name = "slot.extractor_missing",
                    slot = %spec.name,
                    extractor = ?spec.extractor_kind(),
                    "no extractor registered for slot type"
                );
                None
            }
        };
        let event = match extracted {
            Some(value) => SlotFillEvent::Extracted { value: value.trim().to_string() },
            None => SlotFillEvent::NotFound,
        };
        let state = transition(&awaiting, &event)?.to;

        let SlotFillState::Validating { value, .. } = &state else {
            return Ok(state);
        };
        let verdict = if spec.validate(value) {
            SlotFillEvent::ValidationPassed
        } else {
            SlotFillEvent::ValidationFailed
        };
        Ok(transition(&state, &verdict)?.to)
    }
}
