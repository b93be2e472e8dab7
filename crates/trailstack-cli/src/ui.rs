use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;

use colored::{ColoredString, Colorize};
use trailstack_core::{ReconciliationReport, ResourceId, StackStatus};
use trailstack_provisioner::{CheckOutcome, CheckResult};

pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Errors go to stderr.
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

pub fn status(status: StackStatus) -> ColoredString {
    let text = status.as_str();
    if status.is_failed() {
        text.red().bold()
    } else if status.is_in_progress() {
        text.yellow()
    } else if status == StackStatus::Absent {
        text.dimmed()
    } else {
        text.green()
    }
}

pub fn check(result: &CheckResult) {
    match &result.outcome {
        CheckOutcome::Pass(detail) => success(&format!("{}: {detail}", result.name)),
        CheckOutcome::Warn(detail) => warn(&format!("{}: {detail}", result.name)),
        CheckOutcome::Fail(detail) => error(&format!("{}: {detail}", result.name)),
    }
}

pub fn outputs(title: &str, outputs: &BTreeMap<String, String>) {
    if outputs.is_empty() {
        return;
    }
    section(title);
    for (key, value) in outputs {
        kv(key, value);
    }
}

fn id_list(label: &str, ids: &BTreeSet<ResourceId>, paint: fn(&str) -> ColoredString) {
    if ids.is_empty() {
        return;
    }
    println!("  {} ({})", label.bold(), ids.len());
    for id in ids {
        println!("    {} {}", id.kind.label().dimmed(), paint(&id.key));
    }
}

pub fn report(report: &ReconciliationReport) {
    section("Resources");
    if report.provisional {
        warn("stack is mid-transition; missing and orphaned entries are provisional");
    }

    for id in &report.managed {
        let attrs = report
            .attributes
            .get(id)
            .map(|attrs| {
                attrs
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        println!(
            "  {} {:<22} {} {}",
            "✓".green(),
            id.kind.label(),
            id.key,
            attrs.dimmed()
        );
    }

    id_list("Missing (tracked but not found)", &report.missing, |s| s.red());
    id_list("Orphaned (found but not tracked)", &report.orphaned, |s| s.yellow());
    id_list("Retained (kept after destroy)", &report.retained, |s| s.cyan());

    if !report.unverified.is_empty() {
        println!("  {} ({})", "Unverified".bold(), report.unverified.len());
        for (id, reason) in &report.unverified {
            println!("    {} {}", id.to_string().yellow(), reason.dimmed());
        }
    }
    for (kind, reason) in &report.discovery_errors {
        warn(&format!("could not list {}: {reason}", kind.label()));
    }

    if report.is_clean() {
        success("no drift detected");
    } else if report.has_hazards() {
        warn("drift detected");
    }
}

/// Read one confirmation line, removing only the line terminator.
pub fn read_confirmation(input: &mut impl BufRead) -> std::io::Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    if let Some(stripped) = line.strip_suffix('\n') {
        line = stripped.strip_suffix('\r').unwrap_or(stripped).to_string();
    }
    Ok(line)
}

/// Print `msg` and read one answer line from `input`.
pub fn ask(input: &mut impl BufRead, msg: &str) -> std::io::Result<String> {
    use std::io::Write;

    print!("{} {} ", "?".magenta().bold(), msg);
    std::io::stdout().flush()?;
    read_confirmation(input)
}
