//! Output formatting for CLI commands

use std::io::IsTerminal;

use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Confirm};

/// Output helper for consistent formatting
///
/// Results go to stdout; warnings, errors and hints go to stderr.
#[derive(Debug, Clone, Default)]
pub struct Output {
    verbose: bool,
}

impl Output {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Prints a success message
    pub fn success(&self, message: &str) {
        println!("{}", message);
    }

    /// Prints an informational line
    pub fn info(&self, message: &str) {
        println!("{}", message);
    }

    /// Prints a warning
    pub fn warn(&self, message: &str) {
        eprintln!("Warning: {}", message);
    }

    /// Prints an error message
    pub fn error(&self, message: &str) {
        eprintln!("Error: {}", message);
    }

    /// Prints a follow-up suggestion
    pub fn hint(&self, message: &str) {
        eprintln!("Hint: {}", message);
    }

    /// Prints a blank line
    pub fn blank(&self) {
        println!();
    }

    /// Returns true if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Prints a verbose debug message (only when --verbose is set)
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            eprintln!("[verbose] {}", message);
        }
    }

    /// Prints a verbose debug message with context (only when --verbose is set)
    pub fn verbose_ctx(&self, context: &str, message: &str) {
        if self.verbose {
            eprintln!("[verbose:{}] {}", context, message);
        }
    }

    /// Asks a yes/no question, defaulting to no
    ///
    /// `assume_yes` answers without asking. Without a terminal on stdin the
    /// answer is no.
    pub fn confirm(&self, prompt: &str, assume_yes: bool) -> Result<bool> {
        if assume_yes {
            return Ok(true);
        }
        if !std::io::stdin().is_terminal() {
            self.verbose_ctx("confirm", &format!("No terminal, declining: {}", prompt));
            return Ok(false);
        }

        let answer = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        Ok(answer)
    }
}
