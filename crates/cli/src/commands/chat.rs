use std::io::{self, Write};

use anyhow::{Context, Result};
use chatflow_core::config::{AppConfig, LoadOptions};
use chatflow_core::errors::TurnError;
use chatflow_core::ports::InputError;
use chatflow_core::service::{ChatService, TurnReply};
use chatflow_core::session::SessionId;
use tracing::info;

use crate::bootstrap::bootstrap_with_config;
use crate::commands::CommandResult;
use crate::input::{LineSource, StdinLineSource, TimedPrompter};
use crate::logging::init_logging;

pub const EXIT_CODE_TIMED_OUT: u8 = 124;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatEnd {
    /// The exit token was entered.
    Exited,
    /// Input reached end of stream.
    InputClosed,
    /// No utterance or prompt answer arrived before the input deadline.
    TimedOut,
}

pub fn banner(exit_token: &str) -> String {
    format!("聊天机器人已启动。(输入 '{exit_token}' 退出)")
}

pub fn run(options: LoadOptions, session: Option<String>) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("chat", "config_validation", error.to_string(), 2)
        }
    };
    if let Err(error) = init_logging(&config.logging) {
        return CommandResult::failure("chat", "logging", format!("{error:#}"), 2);
    }

    let application = match bootstrap_with_config(config) {
        Ok(application) => application,
        Err(error) => {
            return CommandResult::failure("chat", error.error_class(), error.to_string(), 2)
        }
    };

    let session_id = session.map(SessionId).unwrap_or_else(SessionId::generate);
    let timeout = application.config.session.input_timeout();
    let ended = StdinLineSource::spawn()
        .and_then(|source| TimedPrompter::new(source, io::stdout(), timeout))
        .context("could not attach to the console")
        .and_then(|mut prompter| converse(&application.service, &session_id, &mut prompter));

    match ended {
        Ok(ChatEnd::TimedOut) => CommandResult::text(EXIT_CODE_TIMED_OUT, ""),
        Ok(end) => {
            info!(
                event_name = "system.chat.stopped",
                correlation_id = %session_id,
                reason = ?end,
                "chat loop finished"
            );
            CommandResult::text(0, "")
        }
        Err(error) => CommandResult::failure("chat", "io", format!("{error:#}"), 1),
    }
}

/// Reads utterances until the exit token, end of input, or an input timeout,
/// printing every reply through `prompter`.
pub fn converse<S, W>(
    service: &ChatService,
    session_id: &SessionId,
    prompter: &mut TimedPrompter<S, W>,
) -> Result<ChatEnd>
where
    S: LineSource,
    W: Write,
{
    prompter.banner(&banner(service.exit_token()))?;
    info!(
        event_name = "system.chat.started",
        correlation_id = %session_id,
        input_timeout_secs = prompter.timeout().as_secs(),
        "chat loop started"
    );

    loop {
        let utterance = match prompter.read_utterance() {
            Ok(Some(utterance)) => utterance,
            Ok(None) => {
                service.reset(session_id);
                return Ok(ChatEnd::InputClosed);
            }
            Err(InputError::TimedOut(_)) => {
                service.reset(session_id);
                prompter.say(TurnError::InputTimedOut.user_message())?;
                return Ok(ChatEnd::TimedOut);
            }
            Err(error) => return Err(error.into()),
        };

        match service.handle(session_id, &utterance, prompter) {
            Ok(TurnReply::Response(text)) => prompter.say(&text)?,
            Ok(TurnReply::Ended(text)) => {
                prompter.say(&text)?;
                return Ok(ChatEnd::Exited);
            }
            Ok(TurnReply::Ignored) => {}
            Err(TurnError::InputTimedOut) => {
                prompter.say(TurnError::InputTimedOut.user_message())?;
                return Ok(ChatEnd::TimedOut);
            }
            Err(TurnError::InputClosed) => return Ok(ChatEnd::InputClosed),
            Err(error) => return Err(error.into()),
        }
    }
}
