//! User-friendly diagnostic messages.
//!
//! Every error shown to a user names the root cause, the rules involved and, where
//! one exists, the fix.

use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

use miette::{Diagnostic as MietteDiagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when a template needs a prefix.
    pub const MISSING_PREFIX: &str =
        "Pass the install prefix with `--prefix <name>=<path>` or set `[store] root` in .keel/config.toml";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
    Help,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
            Severity::Help => write!(f, "help"),
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related location (file path)
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(message)
        }
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add a file location.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = if color {
            match self.severity {
                Severity::Error => "\x1b[1;31merror\x1b[0m".to_string(),
                Severity::Warning => "\x1b[1;33mwarning\x1b[0m".to_string(),
                Severity::Note => "\x1b[1;36mnote\x1b[0m".to_string(),
                Severity::Help => "\x1b[1;32mhelp\x1b[0m".to_string(),
            }
        } else {
            self.severity.to_string()
        };

        output.push_str(&format!("{}: {}\n", severity_str, self.message));

        if let Some(ref path) = self.location {
            output.push_str(&format!("  --> {}\n", path.display()));
        }

        for ctx in &self.context {
            output.push_str(&format!("  = {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            output.push('\n');
            let help_prefix = if color {
                "\x1b[1;32mhelp\x1b[0m"
            } else {
                "help"
            };
            output.push_str(&format!("{}: consider:\n", help_prefix));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// A descriptor that is not valid TOML, pointing at the offending source.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("failed to parse descriptor: {message}")]
#[diagnostic(code(keel::descriptor::syntax))]
pub struct DescriptorSyntaxError {
    pub message: String,
    #[source_code]
    pub src: NamedSource<String>,
    #[label("here")]
    pub span: Option<SourceSpan>,
}

impl DescriptorSyntaxError {
    pub fn new(
        name: impl AsRef<str>,
        source: String,
        message: impl Into<String>,
        span: Option<Range<usize>>,
    ) -> Self {
        DescriptorSyntaxError {
            message: message.into(),
            src: NamedSource::new(name, source),
            span: span.map(SourceSpan::from),
        }
    }

    /// Render with source excerpt, the way miette's fancy handler does.
    pub fn render(&self, color: bool) -> String {
        let theme = if color {
            miette::GraphicalTheme::unicode()
        } else {
            miette::GraphicalTheme::unicode_nocolor()
        };
        let mut out = String::new();
        match miette::GraphicalReportHandler::new_themed(theme).render_report(&mut out, self) {
            Ok(()) => out,
            Err(_) => format!("error: {}\n", self),
        }
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

/// Print an error message with context and suggestions.
pub fn emit_error(message: &str, context: &[&str], suggestions: &[&str], color: bool) {
    let mut diag = Diagnostic::error(message);
    for ctx in context {
        diag = diag.with_context(*ctx);
    }
    for sug in suggestions {
        diag = diag.with_suggestion(*sug);
    }
    emit(&diag, color);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::error("2 conflict(s) in the selection for `vistle`")
            .with_context("Python is required to interpret user input (`+tui` with `~python`)")
            .with_context("kokkos needs rocm (`+kokkos` with `~rocm`)")
            .with_location("demos/vistle.toml")
            .with_suggestion("Change the selection so that no rule has both sides true");

        let output = diag.format(false);
        assert!(output.starts_with("error: 2 conflict(s)"));
        assert!(output.contains("  --> demos/vistle.toml"));
        assert!(output.contains("  = Python is required"));
        assert!(output.contains("help: consider:"));
        assert!(output.contains("1. Change the selection"));
    }

    #[test]
    fn test_warning_colored() {
        let output = Diagnostic::warning("contradictory propagated values").format(true);
        assert!(output.contains("\x1b[1;33mwarning\x1b[0m"));
    }

    #[test]
    fn test_syntax_error_render() {
        let src = "[package]\nname = \n".to_string();
        let err = DescriptorSyntaxError::new("keel.toml", src, "expected a value", Some(17..18));
        let output = err.render(false);
        assert!(output.contains("expected a value"));
        assert!(output.contains("keel.toml"));
    }
}
