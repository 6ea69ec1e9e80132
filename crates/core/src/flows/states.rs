use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotFillState {
    AwaitingSlot { slot: String },
    Validating { slot: String, value: String },
    Filled { slot: String, value: String },
    Clarifying { slot: String },
}

impl SlotFillState {
    pub fn slot(&self) -> &str {
        match self {
            Self::AwaitingSlot { slot }
            | Self::Validating { slot, .. }
            | Self::Filled { slot, .. }
            | Self::Clarifying { slot } => slot,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotFillEvent {
    Extracted { value: String },
    NotFound,
    ValidationPassed,
    ValidationFailed,
    /// A new user turn arrived while suspended on a clarification prompt.
    UtteranceReceived,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotTransition {
    pub from: SlotFillState,
    pub to: SlotFillState,
    pub event: SlotFillEvent,
}
