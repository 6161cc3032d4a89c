use anstyle::{AnsiColor, Style};
use is_terminal::IsTerminal;
use std::fmt::Display;
use std::io::{self, Write};
use std::time::{Duration, Instant};

const LABEL_WIDTH: usize = 12;

/// Colour of a status label. Warnings and errors go to stderr.
#[derive(Debug, Clone, Copy)]
enum Tone {
    Pending,
    Success,
    Info,
    Warn,
    Error,
}

impl Tone {
    fn color(self) -> AnsiColor {
        match self {
            Tone::Pending => AnsiColor::Cyan,
            Tone::Success => AnsiColor::Green,
            Tone::Info => AnsiColor::Blue,
            Tone::Warn => AnsiColor::Yellow,
            Tone::Error => AnsiColor::Red,
        }
    }

    fn to_stderr(self) -> bool {
        matches!(self, Tone::Warn | Tone::Error)
    }
}

fn status_line(tone: Tone, label: &str, message: &str, color: bool) -> String {
    let label = format!("{label:>width$}", width = LABEL_WIDTH);
    if color {
        let style = Style::new().bold().fg_color(Some(tone.color().into()));
        format!("{}{label}{} {message}", style.render(), style.render_reset())
    } else {
        format!("{label} {message}")
    }
}

fn write_status(tone: Tone, label: &str, message: &str) {
    let no_color = std::env::var_os("NO_COLOR").is_some();
    if tone.to_stderr() {
        let stderr = io::stderr();
        let line = status_line(tone, label, message, !no_color && stderr.is_terminal());
        let _ = writeln!(stderr.lock(), "{line}");
    } else {
        let stdout = io::stdout();
        let line = status_line(tone, label, message, !no_color && stdout.is_terminal());
        let _ = writeln!(stdout.lock(), "{line}");
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs_f64() >= 1.0 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

pub fn info(message: impl Display) {
    write_status(Tone::Info, "Info", &message.to_string());
}

pub fn warn(message: impl Display) {
    write_status(Tone::Warn, "Warning", &message.to_string());
}

pub fn error(message: impl Display) {
    write_status(Tone::Error, "Error", &message.to_string());
}

pub fn success(label: &str, message: impl Display) {
    write_status(Tone::Success, label, &message.to_string());
}

/// A pending status line for a slow step, closed with its elapsed time.
pub struct Progress {
    message: String,
    started: Instant,
    complete: bool,
}

impl Progress {
    pub fn new(label: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        write_status(Tone::Pending, label, &message);

        Self {
            message,
            started: Instant::now(),
            complete: false,
        }
    }

    pub fn success(mut self, label: &str, detail: Option<String>) {
        self.complete = true;
        let elapsed = format_duration(self.started.elapsed());
        let message = match detail.filter(|d| !d.is_empty()) {
            Some(detail) => format!("{} ({detail}) in {elapsed}", self.message),
            None => format!("{} in {elapsed}", self.message),
        };
        write_status(Tone::Success, label, &message);
    }

    pub fn fail(mut self, label: &str, error: impl Display) {
        self.complete = true;
        let elapsed = format_duration(self.started.elapsed());
        write_status(
            Tone::Error,
            label,
            &format!("{} after {elapsed}: {error}", self.message),
        );
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if !self.complete {
            write_status(Tone::Warn, "Cancelled", &format!("{} (aborted)", self.message));
        }
    }
}
