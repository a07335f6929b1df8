//! CLI theme and styling.

use colored::Colorize;
use warden_core::Decision;

/// CLI theme configuration.
pub(crate) struct Theme;

impl Theme {
    /// Format a header.
    pub(crate) fn header(text: &str) -> String {
        format!("{}", text.bold().cyan())
    }

    /// Format a success message.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    /// Format an error message.
    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    /// Format an info message.
    pub(crate) fn info(text: &str) -> String {
        format!("{} {}", "i".blue(), text)
    }

    /// Format a dimmed message.
    pub(crate) fn dimmed(text: &str) -> String {
        format!("{}", text.dimmed())
    }

    /// Format a decision, colored by outcome.
    pub(crate) fn decision(decision: Decision) -> String {
        let label = decision.to_string();
        match decision {
            Decision::Grant => label.green().bold().to_string(),
            Decision::Deny => label.red().bold().to_string(),
            Decision::Abstain => label.yellow().to_string(),
        }
    }

    /// Format an allowed/denied verdict.
    pub(crate) fn verdict(allowed: bool) -> String {
        if allowed {
            Self::success("allowed")
        } else {
            Self::error("denied")
        }
    }
}
