//! Rendering of events and persisted traces for terminal consumption, plus
//! tracing-subscriber bootstrap.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

use crate::event_bus::Event;
use crate::runtime::NodeExecutionLog;

pub const CONTEXT_COLOR: &str = "\x1b[32m"; // green
pub const LINE_COLOR: &str = "\x1b[35m"; // magenta
pub const RESET_COLOR: &str = "\x1b[0m";

/// Install the global tracing subscriber.
///
/// Reads `RUST_LOG` when set, otherwise defaults to `info` with this crate at
/// `info`. Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,flowloom=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Formatter color mode for telemetry output.
///
/// Controls whether ANSI color codes are included in formatted output:
/// - [`FormatterMode::Auto`]: detects TTY capability via `stderr.is_terminal()`
/// - [`FormatterMode::Colored`]: always include color codes
/// - [`FormatterMode::Plain`]: never include color codes (for logs/files)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatterMode {
    /// Auto-detect TTY capability (checks `stderr.is_terminal()`)
    #[default]
    Auto,
    /// Always include ANSI color codes
    Colored,
    /// Never include ANSI color codes
    Plain,
}

impl FormatterMode {
    /// Auto-detect formatter mode based on stderr TTY capability.
    pub fn auto_detect() -> Self {
        if std::io::stderr().is_terminal() {
            FormatterMode::Colored
        } else {
            FormatterMode::Plain
        }
    }

    /// Returns true if this mode should use colored output.
    ///
    /// For `Auto` mode, performs TTY detection on each call.
    pub fn is_colored(&self) -> bool {
        match self {
            FormatterMode::Auto => std::io::stderr().is_terminal(),
            FormatterMode::Colored => true,
            FormatterMode::Plain => false,
        }
    }
}

/// Rendered output for a telemetry item that can be consumed by sinks.
#[derive(Clone, Debug, Default)]
pub struct EventRender {
    pub context: Option<String>,
    pub lines: Vec<String>,
}

impl EventRender {
    pub fn join_lines(&self) -> String {
        self.lines.join("")
    }
}

pub trait TelemetryFormatter: Send + Sync {
    fn render_event(&self, event: &Event) -> EventRender;
    fn render_trace(&self, logs: &[NodeExecutionLog]) -> Vec<EventRender>;
}

/// Plain text formatter with optional ANSI color codes.
///
/// # Examples
/// ```
/// use flowloom::telemetry::{FormatterMode, PlainFormatter};
///
/// // Auto-detect TTY
/// let formatter = PlainFormatter::new();
///
/// // Force plain output (no colors)
/// let formatter = PlainFormatter::with_mode(FormatterMode::Plain);
/// ```
pub struct PlainFormatter {
    mode: FormatterMode,
}

impl PlainFormatter {
    /// Create a new formatter with auto-detected color mode.
    pub fn new() -> Self {
        Self {
            mode: FormatterMode::Auto,
        }
    }

    /// Create a new formatter with explicit color mode.
    pub fn with_mode(mode: FormatterMode) -> Self {
        Self { mode }
    }

    fn color<'a>(&self, ansi_code: &'a str) -> &'a str {
        if self.mode.is_colored() {
            ansi_code
        } else {
            ""
        }
    }

    fn reset(&self) -> &str {
        if self.mode.is_colored() {
            RESET_COLOR
        } else {
            ""
        }
    }
}

impl Default for PlainFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryFormatter for PlainFormatter {
    fn render_event(&self, event: &Event) -> EventRender {
        let line = if self.mode.is_colored() {
            format!("{LINE_COLOR}{event}{RESET_COLOR}\n")
        } else {
            format!("{event}\n")
        };
        EventRender {
            context: Some(event.scope_label().to_string()),
            lines: vec![line],
        }
    }

    fn render_trace(&self, logs: &[NodeExecutionLog]) -> Vec<EventRender> {
        logs.iter()
            .enumerate()
            .map(|(i, log)| {
                let mut lines = Vec::new();
                let header = format!(
                    "[{i}] {} ({}) | {} | {}ms\n",
                    log.node_id, log.node_type, log.status, log.duration_ms
                );
                lines.push(format!(
                    "{}{header}{}",
                    self.color(CONTEXT_COLOR),
                    self.reset()
                ));

                if let Some(details) = &log.error_details {
                    lines.push(format!(
                        "{}  error: {details}{}\n",
                        self.color(LINE_COLOR),
                        self.reset()
                    ));
                }

                if !log.output_data.is_empty() {
                    let rendered = serde_json::to_string(&log.output_json())
                        .unwrap_or_else(|_| "{}".to_string());
                    lines.push(format!(
                        "{}  output: {rendered}{}\n",
                        self.color(LINE_COLOR),
                        self.reset()
                    ));
                }

                EventRender {
                    context: Some(log.node_id.clone()),
                    lines,
                }
            })
            .collect()
    }
}
