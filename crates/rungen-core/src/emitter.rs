//! Newline-delimited JSON output.

use std::io::{self, Write};

use crate::error::{Result, RungenError};
use crate::message::Message;
use crate::obs;

/// Writes each message as one JSON object per line, flushed immediately.
pub struct Emitter<W: Write> {
    out: W,
    emitted: usize,
}

impl Emitter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Emitter<W> {
    pub fn new(out: W) -> Self {
        Self { out, emitted: 0 }
    }

    pub fn emit(&mut self, message: &Message) -> Result<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        self.out.write_all(&line).map_err(RungenError::Emit)?;
        self.out.flush().map_err(RungenError::Emit)?;
        self.emitted += 1;
        obs::emit_message_written(message.message_id(), message.correlation_id());
        Ok(())
    }

    /// Messages written so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
