//! Compass rendering to the terminal

pub mod formats;

use crossterm::cursor::MoveToColumn;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use std::io::{self, Stdout, Write};
use std::time::Duration;

use crate::config::{DisplayConfig, OutputFormat};
use crate::direction::DirectionSnapshot;

pub use formats::{
    compass_gauge, direction_label, format_json, format_json_at, format_text, format_text_at,
    format_timestamp,
};

/// Consumer of direction snapshots.
///
/// Called from the display tick; may be called faster than it can redraw.
pub trait Renderer {
    /// Draw the latest snapshot
    fn render(&mut self, snapshot: &DirectionSnapshot) -> io::Result<()>;

    /// Leave the output in a clean state
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Renders the compass as text or JSON lines.
///
/// In live text mode the same line is redrawn in place. Line endings are
/// `\r\n` so output stays aligned while the terminal is in raw mode.
pub struct ConsoleRenderer<W: Write = Stdout> {
    config: DisplayConfig,
    out: W,
    live: bool,
    last_updates: Option<u64>,
    drew_live_line: bool,
}

impl ConsoleRenderer<Stdout> {
    /// Render to stdout
    pub fn stdout(config: DisplayConfig, live: bool) -> Self {
        Self::new(config, io::stdout(), live)
    }
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(config: DisplayConfig, out: W, live: bool) -> Self {
        Self {
            config,
            out,
            live,
            last_updates: None,
            drew_live_line: false,
        }
    }

    /// Write one timestamped line (offline analysis)
    pub fn render_at(&mut self, at: Duration, snapshot: &DirectionSnapshot) -> io::Result<()> {
        let line = match self.config.format {
            OutputFormat::Text => format_text_at(at, snapshot, &self.config),
            OutputFormat::Json => format_json_at(at, snapshot),
        };
        write!(self.out, "{}\r\n", line)?;
        self.out.flush()
    }

    /// Give back the underlying writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn render_live_text(&mut self, snapshot: &DirectionSnapshot) -> io::Result<()> {
        let line = format_text(snapshot, &self.config);
        crossterm::queue!(
            self.out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(line)
        )?;
        self.drew_live_line = true;
        Ok(())
    }
}

impl<W: Write> Renderer for ConsoleRenderer<W> {
    fn render(&mut self, snapshot: &DirectionSnapshot) -> io::Result<()> {
        match (self.config.format, self.live) {
            (OutputFormat::Text, true) => self.render_live_text(snapshot)?,
            (OutputFormat::Text, false) => {
                write!(self.out, "{}\r\n", format_text(snapshot, &self.config))?
            }
            (OutputFormat::Json, _) => {
                // Repeating an unchanged snapshot adds nothing to a JSON stream
                if self.live && self.last_updates == Some(snapshot.updates) {
                    return Ok(());
                }
                write!(self.out, "{}\r\n", format_json(snapshot))?;
            }
        }

        self.last_updates = Some(snapshot.updates);
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.drew_live_line {
            write!(self.out, "\r\n")?;
            self.drew_live_line = false;
        }
        self.out.flush()
    }
}
