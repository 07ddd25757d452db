use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::process::Command;

use crate::constants::{GIT_IDENTITY_LEN, ORANGE, UNKNOWN_GIT_IDENTITY};

/// Calculate terminal display width, treating emojis as 2 cells wide
///
/// Terminals typically render emojis as 2 cells wide regardless of Unicode
/// Standard Annex #11 width properties, so we use a terminal-specific calculation.
fn terminal_width(s: &str) -> usize {
    use unicode_width::UnicodeWidthChar;
    s.chars()
        .map(|c| {
            if c.is_ascii() {
                1
            } else {
                let w = UnicodeWidthChar::width(c).unwrap_or(0);
                if w > 0 { 2 } else { 0 }
            }
        })
        .sum()
}

/// Print a styled title bar with orange separator matching the title width
pub fn print_title_bar(title: &str) {
    println!("{}", title.bold().bright_white());
    let width = terminal_width(title);
    let separator: String = "─".repeat(width);
    println!("{}", separator.truecolor(ORANGE.0, ORANGE.1, ORANGE.2));
}

/// Display a success message
pub fn success(message: &str) {
    println!("  {} {}", "✓".green(), message);
}

/// Display a warning message
pub fn warning(message: &str) {
    println!("  {} {}", "⚠".bold().yellow(), message);
}

/// Display an info message
pub fn info(message: &str) {
    println!("  • {message}");
}

/// Run a command and return the output
pub fn run_command(program: &str, args: &[&str]) -> Result<std::process::Output> {
    log::debug!("Running command: {} {}", program, args.join(" "));

    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute: {} {}", program, args.join(" ")))?;

    log::debug!("Command exit status: {}", output.status);
    if !output.stderr.is_empty() {
        log::debug!("stderr: {}", String::from_utf8_lossy(&output.stderr));
    }

    Ok(output)
}

/// Abbreviated HEAD commit of the repository containing `dir`
pub fn detect_git_identity(dir: &Path) -> Option<String> {
    let dir = dir.to_str()?;
    let short = format!("--short={GIT_IDENTITY_LEN}");
    let output = run_command("git", &["-C", dir, "rev-parse", &short, "HEAD"]).ok()?;
    if !output.status.success() {
        return None;
    }

    let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!hash.is_empty()).then_some(hash)
}

/// Configured git identity, or the detected one, or `unknown`
pub fn resolve_git_identity(configured: &str, dir: &Path) -> String {
    if !configured.is_empty() {
        return configured.to_string();
    }
    detect_git_identity(dir).unwrap_or_else(|| {
        log::warn!("Could not determine git revision, using '{UNKNOWN_GIT_IDENTITY}'");
        UNKNOWN_GIT_IDENTITY.to_string()
    })
}

/// Format a number with thousands separators
pub fn format_with_separators(num: i64) -> String {
    let s = num.unsigned_abs().to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, c);
    }
    if num < 0 {
        result.insert(0, '-');
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_with_separators() {
        assert_eq!(format_with_separators(0), "0");
        assert_eq!(format_with_separators(100), "100");
        assert_eq!(format_with_separators(1000), "1,000");
        assert_eq!(format_with_separators(1_835_008), "1,835,008");
        assert_eq!(format_with_separators(-164_992), "-164,992");
    }

    #[test]
    fn test_terminal_width() {
        assert_eq!(terminal_width("APJ"), 3);
        assert_eq!(terminal_width("🔏 Signed"), 9);
    }

    #[test]
    fn test_configured_git_identity_wins() {
        assert_eq!(
            resolve_git_identity("648dee21", Path::new("/nonexistent")),
            "648dee21"
        );
    }

    #[test]
    fn test_git_identity_outside_repository() {
        let missing = Path::new("/nonexistent/dir");
        assert!(detect_git_identity(missing).is_none());
        assert_eq!(resolve_git_identity("", missing), UNKNOWN_GIT_IDENTITY);
    }
}
