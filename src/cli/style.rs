//! Terminal styling
//!
//! Output goes through `anstream`, which strips these escapes when stdout is
//! not a terminal.

use owo_colors::OwoColorize;
use std::fmt::Display;

/// Check mark for completed steps
pub const CHECK: &str = "✓";

/// Semantic styles for CLI output
pub trait Stylize {
    /// Names, ids and other values the user typed or should notice
    fn emphasis(&self) -> String;
    /// Secondary information
    fn muted(&self) -> String;
    /// Headings
    fn heading(&self) -> String;
}

impl<T: Display> Stylize for T {
    fn emphasis(&self) -> String {
        self.cyan().bold().to_string()
    }

    fn muted(&self) -> String {
        self.dimmed().to_string()
    }

    fn heading(&self) -> String {
        self.bold().underline().to_string()
    }
}

/// Green check mark
pub fn check() -> String {
    CHECK.green().to_string()
}
