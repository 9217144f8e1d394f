use colored::Colorize;
use declarative::{ApplyResult, Diagnostic, ExecuteSummary, PlannedAction};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Reconciliation output
// ============================================================================

/// Print a diagnostic with its detail underneath
pub fn diagnostic(diag: &Diagnostic) {
    if diag.is_error() {
        error(&diag.summary);
        eprintln!("    {}", diag.detail.dimmed());
    } else {
        warn(&diag.summary);
        dim(&format!("  {}", diag.detail));
    }
}

/// One line per converged resource
pub fn result_line(address: &str, result: &ApplyResult) {
    match result {
        ApplyResult::NoChange => dim(&format!("{address} up to date")),
        ApplyResult::Created => success(&format!("{address} created")),
        ApplyResult::Modified => success(&format!("{address} updated")),
        ApplyResult::Replaced => success(&format!("{address} replaced")),
        ApplyResult::Removed => success(&format!("{address} removed")),
        ApplyResult::Failed { .. } => error(&format!("{address} failed")),
        ApplyResult::Skipped { reason } => {
            println!("  {} {} {}", "→".cyan(), address, reason.dimmed());
        }
    }
}

/// Symbol for a pending action in `status`
pub fn action_symbol(action: PlannedAction) -> colored::ColoredString {
    match action {
        PlannedAction::None => "✓".green(),
        PlannedAction::Create => "+".green(),
        PlannedAction::Update => "~".yellow(),
        PlannedAction::Replace => "±".yellow(),
        PlannedAction::Delete => "-".red(),
    }
}

pub fn summary(summary: &ExecuteSummary) {
    let line = summary_text(summary);
    println!();
    if summary.is_success() {
        success(&line);
    } else {
        error(&line);
    }
}

fn summary_text(summary: &ExecuteSummary) -> String {
    let mut parts = Vec::new();
    for (count, label) in [
        (summary.created, "created"),
        (summary.modified, "updated"),
        (summary.replaced, "replaced"),
        (summary.removed, "removed"),
        (summary.skipped, "skipped"),
        (summary.failed, "failed"),
    ] {
        if count > 0 {
            parts.push(format!("{count} {label}"));
        }
    }
    if parts.is_empty() {
        "No changes".to_string()
    } else {
        parts.join(", ")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_text_lists_nonzero_counts() {
        let mut summary = ExecuteSummary::default();
        assert_eq!(summary_text(&summary), "No changes");

        summary.add_result(&ApplyResult::Created);
        summary.add_result(&ApplyResult::Created);
        summary.add_result(&ApplyResult::Failed {
            error: "boom".into(),
        });
        summary.add_result(&ApplyResult::NoChange);
        assert_eq!(summary_text(&summary), "2 created, 1 failed");
    }
}
