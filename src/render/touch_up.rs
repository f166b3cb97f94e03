//! Optional post-processing hook applied to the composed output.
//!
//! A touch-up only adjusts whitespace and line breaks (typically an LLM
//! pass). It is best-effort: any failure, cancellation, or timeout makes the
//! renderer keep its deterministic output.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{RenderError, Result};

/// How often a running touch-up command is polled for exit or cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Cancellable context handed to a touch-up hook.
///
/// Clones share the cancellation flag, so a caller can keep one clone and
/// cancel the hook from another thread.
#[derive(Debug, Clone, Default)]
pub struct TouchUpContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl TouchUpContext {
    /// A context without deadline that is only done when cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::default(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Mark the context (and all its clones) as cancelled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// `Ok(())` while the context is live, otherwise the reason it is done.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(RenderError::Cancelled)
        } else if self.is_expired() {
            Err(RenderError::Timeout)
        } else {
            Ok(())
        }
    }
}

/// A best-effort text post-processor.
pub trait TouchUp {
    /// Return an adjusted version of `text` for a terminal `wrap_width`
    /// columns wide (0 = unbounded). Implementations should honor `ctx`.
    fn touch_up(&self, ctx: &TouchUpContext, text: &str, wrap_width: usize) -> Result<String>;
}

impl<F> TouchUp for F
where
    F: Fn(&TouchUpContext, &str, usize) -> Result<String>,
{
    fn touch_up(&self, ctx: &TouchUpContext, text: &str, wrap_width: usize) -> Result<String> {
        self(ctx, text, wrap_width)
    }
}

/// Touch-up that pipes the text through an external command.
///
/// The text goes to the command's stdin and its stdout is the result. The
/// wrap width is exported as `MAILRENDER_WRAP_WIDTH`. The child is killed
/// when the context is cancelled or expires.
#[derive(Debug, Clone)]
pub struct CommandTouchUp {
    program: String,
    args: Vec<String>,
}

impl CommandTouchUp {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a whitespace-separated command line; `None` if blank.
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

impl TouchUp for CommandTouchUp {
    fn touch_up(&self, ctx: &TouchUpContext, text: &str, wrap_width: usize) -> Result<String> {
        ctx.check()?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("MAILRENDER_WRAP_WIDTH", wrap_width.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| RenderError::TouchUp(format!("cannot run '{}': {e}", self.program)))?;

        // Pipes are serviced on detached threads: a child that never drains
        // stdin, or a grandchild that keeps stdout open after the child is
        // killed, must not hold this call past the context.
        if let Some(mut pipe) = child.stdin.take() {
            let input = text.to_owned();
            std::thread::spawn(move || {
                // A child that exits early closes its stdin; that is not an error here.
                let _ = pipe.write_all(input.as_bytes());
            });
        }
        let (tx, rx) = mpsc::channel();
        if let Some(mut pipe) = child.stdout.take() {
            std::thread::spawn(move || {
                let mut buf = String::new();
                let result = pipe.read_to_string(&mut buf).map(|_| buf);
                let _ = tx.send(result);
            });
        } else {
            let _ = tx.send(Ok(String::new()));
        }

        let status = loop {
            if let Err(e) = ctx.check() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
            match child.try_wait()? {
                Some(status) => break status,
                None => std::thread::sleep(POLL_INTERVAL),
            }
        };
        if !status.success() {
            return Err(RenderError::TouchUp(format!(
                "'{}' exited with {status}",
                self.program
            )));
        }

        // The child has exited, but a grandchild may still hold stdout.

        let output = loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(result) => break result,
                Err(RecvTimeoutError::Timeout) => ctx.check()?,
                Err(RecvTimeoutError::Disconnected) => {
                    break Err(std::io::Error::other("stdout reader stopped"));
                }
            }
        };
        let output = output?;
        debug!(program = %self.program, bytes = output.len(), "Touch-up command finished");
        Ok(output)
    }
}
