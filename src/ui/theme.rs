//! Terminal styling, decided once per process

use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// Output stream a piece of text is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Role of a piece of output text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Header,
    Success,
    Error,
    Warn,
    Info,
    Dim,
    Muted,
    Key,
}

impl Tone {
    /// Errors and warnings go to stderr, everything else to stdout
    pub fn stream(self) -> Stream {
        match self {
            Tone::Error | Tone::Warn => Stream::Stderr,
            _ => Stream::Stdout,
        }
    }

    fn palette(self) -> Style {
        let base = Style::new();
        match self {
            Tone::Header => base.cyan().bold(),
            Tone::Success => base.green().bold(),
            Tone::Error => base.red().bold(),
            Tone::Warn => base.yellow().bold(),
            Tone::Info => base.magenta(),
            Tone::Dim => base.white().dimmed(),
            Tone::Muted => base.bright_black(),
            Tone::Key => base.blue(),
        }
    }
}

/// Which streams get colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    stdout: bool,
    stderr: bool,
}

impl Theme {
    /// Color each stream only when it is a terminal, and never with
    /// `NO_COLOR` set
    pub fn detect() -> Self {
        if std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()) {
            return Self::plain();
        }
        Self {
            stdout: console::Term::stdout().is_term(),
            stderr: console::Term::stderr().is_term(),
        }
    }

    pub fn colored() -> Self {
        Self { stdout: true, stderr: true }
    }

    pub fn plain() -> Self {
        Self { stdout: false, stderr: false }
    }

    pub fn colors(&self, stream: Stream) -> bool {
        match stream {
            Stream::Stdout => self.stdout,
            Stream::Stderr => self.stderr,
        }
    }

    pub fn style(&self, tone: Tone) -> Style {
        if self.colors(tone.stream()) {
            tone.palette()
        } else {
            Style::new()
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
