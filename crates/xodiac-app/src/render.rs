//! Plain-text rendering of transcript snapshots.
//!
//! Stand-in for a graphical front end: the answer is printed incrementally as
//! snapshots arrive, and citations, image link and follow-up questions are
//! listed once the entry is closed.

use std::io::{self, Write};

use uuid::Uuid;
use xodiac_chat::{ConversationEntry, LoadingStatus, Transcript};

/// Incremental renderer for the trailing assistant entry.
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    entry_id: Option<Uuid>,
    printed: String,
    status: Option<LoadingStatus>,
    reasoning_shown: bool,
    finished: bool,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print whatever changed in the most recent assistant entry.
    pub fn render(&mut self, transcript: &Transcript, out: &mut impl Write) -> io::Result<()> {
        let Some(entry) = transcript.last_assistant() else {
            return Ok(());
        };
        if self.entry_id != Some(entry.id()) {
            *self = Self {
                entry_id: Some(entry.id()),
                ..Self::default()
            };
            writeln!(out, "[{}]", entry.mode())?;
        }
        if self.finished {
            return Ok(());
        }

        if let Some(status) = entry.loading_status() {
            if self.status != Some(status) {
                writeln!(out, "{}", status.message())?;
                self.status = Some(status);
            }
        }

        if !self.reasoning_shown && !entry.display_text().is_empty() {
            if let Some(trace) = entry.reasoning_trace() {
                writeln!(out, "Reasoning:\n{}\n", trace.trim())?;
                self.reasoning_shown = true;
            }
        }

        self.write_text(entry.display_text(), out)?;

        if entry.is_closed() {
            self.finished = true;
            writeln!(out)?;
            write_footer(entry, out)?;
        }
        out.flush()
    }

    /// Append the new suffix of the display text; reprint if it was rewritten.
    fn write_text(&mut self, display: &str, out: &mut impl Write) -> io::Result<()> {
        if let Some(suffix) = display.strip_prefix(self.printed.as_str()) {
            out.write_all(suffix.as_bytes())?;
        } else {
            write!(out, "\n{}", display)?;
        }
        self.printed = display.to_string();
        Ok(())
    }
}

fn write_footer(entry: &ConversationEntry, out: &mut impl Write) -> io::Result<()> {
    if let Some(url) = entry.image_url() {
        writeln!(out, "Image: {}", url)?;
    }
    if !entry.sources().is_empty() {
        writeln!(out, "\nSources:")?;
        for (i, source) in entry.sources().iter().enumerate() {
            writeln!(out, "  [{}] {} <{}>", i + 1, source.title, source.uri)?;
        }
    }
    if !entry.related_questions().is_empty() {
        writeln!(out, "\nRelated (type a number to ask):")?;
        for (i, question) in entry.related_questions().iter().enumerate() {
            writeln!(out, "  {}. {}", i + 1, question)?;
        }
    }
    Ok(())
}
