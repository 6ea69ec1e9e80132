//! Interactive console I/O. Every read is bounded by the input deadline.

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use chatflow_core::ports::{InputError, Prompter};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;

pub const ASSISTANT_LABEL: &str = "机器人";
pub const USER_LABEL: &str = "您";

#[async_trait]
pub trait LineSource: Send {
    /// Next line without its terminator, or `None` once input is exhausted.
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Stdin read on a dedicated thread. Abandoning a pending `next_line` leaves
/// the thread blocked in `read_line`; the process is expected to exit.
pub struct StdinLineSource {
    lines: mpsc::Receiver<io::Result<String>>,
}

impl StdinLineSource {
    pub fn spawn() -> io::Result<Self> {
        let (sender, lines) = mpsc::channel(16);
        thread::Builder::new().name("chatflow-stdin".to_string()).spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let failed = line.is_err();
                if sender.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        })?;
        Ok(Self { lines })
    }
}

#[async_trait]
impl LineSource for StdinLineSource {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lines.recv().await.transpose()
    }
}

/// Console prompter: prints assistant lines to `output` and reads lines
/// from `source`. Utterances and answers to collection prompts must both
/// arrive within `timeout`.
pub struct TimedPrompter<S, W> {
    source: S,
    output: W,
    timeout: Duration,
    runtime: Runtime,
}

impl<S, W> TimedPrompter<S, W>
where
    S: LineSource,
    W: Write,
{
    pub fn new(source: S, output: W, timeout: Duration) -> io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_time().build()?;
        Ok(Self { source, output, timeout, runtime })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn say(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{ASSISTANT_LABEL}: {text}")?;
        self.output.flush()
    }

    pub fn banner(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{text}")?;
        self.output.flush()
    }

    /// Next top-level utterance, or `None` once input is exhausted.
    pub fn read_utterance(&mut self) -> Result<Option<String>, InputError> {
        self.label()?;
        self.next_line_before_deadline()
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn label(&mut self) -> Result<(), InputError> {
        write!(self.output, "{USER_LABEL}: ")
            .and_then(|()| self.output.flush())
            .map_err(|error| InputError::Io(error.to_string()))
    }

    fn next_line_before_deadline(&mut self) -> Result<Option<String>, InputError> {
        let timeout = self.timeout;
        let source = &mut self.source;
        let outcome =
            self.runtime.block_on(async { tokio::time::timeout(timeout, source.next_line()).await });
        match outcome {
            Ok(line) => line.map_err(|error| InputError::Io(error.to_string())),
            Err(_) => {
                tracing::warn!(
                    event_name = "input.timed_out",
                    timeout_secs = timeout.as_secs(),
                    "no input before the deadline"
                );
                Err(InputError::TimedOut(timeout))
            }
        }
    }
}

impl<S, W> Prompter for TimedPrompter<S, W>
where
    S: LineSource,
    W: Write,
{
    fn ask(&mut self, prompt: &str) -> Result<String, InputError> {
        self.say(prompt).map_err(|error| InputError::Io(error.to_string()))?;
        self.label()?;
        match self.next_line_before_deadline()? {
            Some(line) => Ok(line.trim().to_string()),
            None => Err(InputError::Closed),
        }
    }
}
