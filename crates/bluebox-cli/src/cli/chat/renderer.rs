//! Terminal output for chat replies and stored transcripts.
//!
//! The engine reports the whole accumulated reply on every update;
//! `StreamPrinter` turns that into incremental writes.

use std::io::{self, Write};

use bluebox_types::chat::{ChatMessage, MessageRole};
use console::style;

/// Writes the growth of a streaming reply.
#[derive(Debug, Default)]
pub struct StreamPrinter {
    printed: usize,
    started: bool,
}

impl StreamPrinter {
    /// Write whatever part of `full_text` has not been written yet.
    ///
    /// Text that no longer extends what was printed (a new turn) restarts
    /// the line.
    pub fn render(&mut self, out: &mut impl Write, full_text: &str) -> io::Result<()> {
        if self.started && full_text.len() < self.printed {
            self.finish(out)?;
        }
        if !self.started {
            write!(out, "\n  {} ", style("Bluebox").cyan().bold())?;
            self.started = true;
        }
        if let Some(delta) = full_text.get(self.printed..) {
            out.write_all(delta.as_bytes())?;
            self.printed = full_text.len();
        }
        out.flush()
    }

    /// End the current line, if a reply was started.
    pub fn finish(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.started {
            writeln!(out)?;
        }
        self.printed = 0;
        self.started = false;
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

/// Write each message as a labelled line.
pub fn write_transcript(out: &mut impl Write, messages: &[ChatMessage]) -> io::Result<()> {
    if messages.is_empty() {
        writeln!(out, "  {}", style("(no messages yet)").dim())?;
        return Ok(());
    }
    for message in messages {
        let label = match message.role {
            MessageRole::User => style("You").green().bold(),
            MessageRole::Assistant => style("Bluebox").cyan().bold(),
        };
        writeln!(out, "  {label} {}", message.text)?;
    }
    Ok(())
}
