// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (scripting), and JSON-lines output modes.

use serde::Serialize;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly tables and progress messages
    Normal,
    /// Only the essential result, e.g. a command id
    Quiet,
    /// One JSON document per line
    Json,
}

impl OutputMode {
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        match (json, quiet) {
            (true, _) => OutputMode::Json,
            (false, true) => OutputMode::Quiet,
            (false, false) => OutputMode::Normal,
        }
    }
}

/// Handles CLI output based on the configured mode.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    mode: OutputMode,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a result. JSON mode serializes `value`; the other modes run
    /// `human`, which is expected to respect quiet mode itself.
    pub fn record<T: Serialize>(&self, value: &T, human: impl FnOnce(OutputMode)) {
        match self.mode {
            OutputMode::Json => match serde_json::to_string(value) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("Error: failed to encode output: {e}"),
            },
            mode => human(mode),
        }
    }

    /// Print a list of results; JSON mode emits one line per item.
    pub fn records<T: Serialize>(&self, values: &[T], human: impl FnOnce(OutputMode)) {
        match self.mode {
            OutputMode::Json => {
                for value in values {
                    self.record(value, |_| {});
                }
            }
            mode => human(mode),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
}
