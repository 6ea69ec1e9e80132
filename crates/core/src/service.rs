use std::sync::Arc;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::errors::TurnError;
use crate::ports::Prompter;
use crate::session::{lock, SessionId, SessionRegistry, SessionState};
use crate::workflow::WorkflowEngine;

pub const FAREWELL_RESPONSE: &str = "再见！";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnReply {
    Response(String),
    /// The exit token was received; the session no longer exists.
    Ended(String),
    /// Blank input; nothing was recorded.
    Ignored,
}

/// Turn-level entry point shared by every transport.
pub struct ChatService {
    engine: WorkflowEngine,
    sessions: SessionRegistry,
    exit_token: String,
    audit: Arc<dyn AuditSink>,
}

impl ChatService {
    pub fn new(engine: WorkflowEngine, exit_token: impl Into<String>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            engine,
            sessions: SessionRegistry::default(),
            exit_token: exit_token.into(),
            audit,
        }
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    pub fn exit_token(&self) -> &str {
        &self.exit_token
    }

    pub fn is_exit_token(&self, utterance: &str) -> bool {
        utterance.trim().eq_ignore_ascii_case(self.exit_token.trim())
    }

    pub fn handle(
        &self,
        session_id: &SessionId,
        utterance: &str,
        prompter: &mut dyn Prompter,
    ) -> Result<TurnReply, TurnError> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Ok(TurnReply::Ignored);
        }
        if self.is_exit_token(utterance) {
            self.end(session_id, "exit_token");
            return Ok(TurnReply::Ended(FAREWELL_RESPONSE.to_string()));
        }

        let session = self.sessions.get_or_create(session_id);
        let result = {
            let mut state = lock(&session);
            self.engine.process(&mut state, utterance, prompter)
        };

        match result {
            Ok(response) => Ok(TurnReply::Response(response)),
            Err(error) => {
                self.end(session_id, reason(&error));
                Err(error)
            }
        }
    }

    /// Drops the session; the next utterance starts a fresh one.
    pub fn reset(&self, session_id: &SessionId) -> bool {
        self.end(session_id, "reset")
    }

    pub fn snapshot(&self, session_id: &SessionId) -> Option<SessionState> {
        self.sessions.snapshot(session_id)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    fn end(&self, session_id: &SessionId, reason: &'static str) -> bool {
        let removed = self.sessions.remove(session_id);
        if removed {
            self.audit.emit(
                AuditContext::for_turn(session_id.clone(), "chat-service")
                    .event("session.ended", AuditCategory::Session, AuditOutcome::Success)
                    .with_metadata("reason", reason),
            );
        }
        removed
    }
}

fn reason(error: &TurnError) -> &'static str {
    match error {
        TurnError::InputTimedOut => "input_timeout",
        TurnError::InputClosed => "input_closed",
        TurnError::Input(_) => "input_error",
    }
}
