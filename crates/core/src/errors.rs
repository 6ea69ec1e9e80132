use thiserror::Error;

use crate::flows::SlotFillError;
use crate::ports::InputError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    SlotFill(#[from] SlotFillError),
}

/// Failures raised while running a rule. Store and classifier failures never
/// reach this layer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Why a turn could not produce a response. Every variant ends the session.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("input collection timed out; session ending")]
    InputTimedOut,
    #[error("input stream closed; session ending")]
    InputClosed,
    #[error("input read failed: {0}")]
    Input(String),
}

impl From<InputError> for TurnError {
    fn from(value: InputError) -> Self {
        match value {
            InputError::TimedOut(_) => Self::InputTimedOut,
            InputError::Closed => Self::InputClosed,
            InputError::Io(message) => Self::Input(message),
        }
    }
}

impl TurnError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InputTimedOut => "操作超时，会话结束。",
            Self::InputClosed | Self::Input(_) => "会话已结束。",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "抱歉，暂时无法处理您的请求，请换个说法再试。",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::Domain(DomainError::SlotFill(_)) => InterfaceError::BadRequest {
                message: "domain validation failed".to_owned(),
                correlation_id,
            },
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Domain(_) => "domain",
        }
    }
}
