pub mod engine;
pub mod states;

pub use engine::{transition, SlotFillError, SlotFillOutcome, SlotFiller};
pub use states::{SlotFillEvent, SlotFillState, SlotTransition};
