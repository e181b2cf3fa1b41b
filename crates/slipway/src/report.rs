//! Console output for the release run
//!
//! All user-facing rendering lives here so the pipeline stays free of
//! formatting concerns. Everything honors --quiet.

use std::path::Path;
use std::time::Duration;

use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};

use slipway_core::{IncrementKind, RunContext};
use slipway_packaging::Verification;
use slipway_version::VersionPair;

pub fn banner(ctx: &RunContext) {
    if ctx.quiet {
        return;
    }
    println!();
    println!(
        "{}",
        style(format!("{} Release Automation", ctx.config.app_name))
            .cyan()
            .bold()
    );
    println!("Building and publishing a new release");
    println!();
}

pub fn phase(ctx: &RunContext, title: &str) {
    if ctx.quiet {
        return;
    }
    println!();
    println!("{}", style(format!("── {title} ──")).blue().bold());
}

pub fn step_done(ctx: &RunContext, message: &str) {
    if !ctx.quiet {
        println!("{} {message}", style("✓").green());
    }
}

pub fn step_skipped(ctx: &RunContext, message: &str) {
    if !ctx.quiet {
        println!("{} {message}", style("!").yellow());
    }
}

/// Spinner shown while a long external call blocks the phase. Quiet runs
/// get no spinner; callers clear it when the call returns.
pub fn spinner(ctx: &RunContext, message: &str) -> Option<ProgressBar> {
    if ctx.quiet {
        return None;
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(spinner_style);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    Some(bar)
}

pub fn finish_spinner(bar: Option<ProgressBar>) {
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
}

/// One displayed checklist row: what a clean run looks like versus what the
/// collected warnings actually say.
const CHECKLIST_ROWS: &[(&str, &str, &str)] = &[
    (
        "uncommitted changes",
        "Working directory clean",
        "Working directory has uncommitted changes",
    ),
    ("Not on main branch", "On main branch", "Not on main branch"),
    (
        "behind origin/main",
        "Up to date with remote",
        "Local branch is behind remote",
    ),
    (
        "Unreleased",
        "Changelog has unreleased content",
        "Changelog needs update",
    ),
    ("Low disk space", "Sufficient disk space", "Low disk space"),
];

/// Show the pre-release checklist and ask for confirmation. Returns false
/// when the operator aborts. Quiet or --yes runs proceed without prompting.
pub fn confirm_checklist(ctx: &RunContext, warnings: &[String]) -> std::io::Result<bool> {
    if ctx.quiet || ctx.assume_yes {
        return Ok(true);
    }

    println!();
    println!("{}", style("Pre-Release Checklist").blue().bold());
    println!();
    for (marker, ok_text, warn_text) in CHECKLIST_ROWS {
        let hit = warnings.iter().any(|w| w.contains(marker));
        if hit {
            println!("  {} {warn_text}", style("!").yellow());
        } else {
            println!("  {} {ok_text}", style("✓").green());
        }
    }
    for warning in warnings {
        if !CHECKLIST_ROWS.iter().any(|(m, _, _)| warning.contains(m)) {
            println!("  {} {warning}", style("!").yellow());
        }
    }
    println!();

    let prompt = if warnings.is_empty() {
        ("Ready to proceed?", true)
    } else {
        ("There are warnings. Continue anyway?", false)
    };
    let confirmed = Confirm::new()
        .with_prompt(prompt.0)
        .default(prompt.1)
        .interact()
        .map_err(std::io::Error::other)?;
    Ok(confirmed)
}

/// Explain why the keychain password prompt is about to appear.
pub fn keychain_prompt(ctx: &RunContext) {
    if ctx.quiet {
        return;
    }
    println!();
    println!("{}", style("Keychain Access Required").yellow().bold());
    println!("The release needs your keychain for:");
    println!("  • Code signing with the Developer ID certificate");
    println!("  • Notarization credentials");
    println!("  • The Sparkle EdDSA signing key");
    println!();
    println!("Enter your keychain password when prompted...");
}

pub fn version_table(
    ctx: &RunContext,
    current: &VersionPair,
    next: &VersionPair,
    kind: IncrementKind,
) {
    if ctx.quiet {
        return;
    }
    println!();
    println!("{}", style("Version Information").cyan().bold());
    println!(
        "  Marketing version: {} {} {}",
        style(&current.marketing).cyan(),
        style("→").dim(),
        style(&next.marketing).green().bold()
    );
    println!(
        "  Build number:      {} {} {}",
        style(current.build).cyan(),
        style("→").dim(),
        style(next.build).green().bold()
    );
    match kind {
        IncrementKind::Skip => {
            println!("  Action:            {}", style("Skip (using existing)").yellow())
        }
        other => println!("  Increment type:    {other}"),
    }
    println!();
}

pub fn release_notes_preview(ctx: &RunContext, notes: &str, pair: &VersionPair) {
    if ctx.quiet {
        return;
    }
    println!();
    println!(
        "{}",
        style(format!("Release Notes Preview - {}", pair.tag()))
            .blue()
            .bold()
    );
    for line in notes.lines() {
        println!("  {line}");
    }
    println!();
}

pub fn verification_results(ctx: &RunContext, results: &[Verification]) {
    if ctx.quiet {
        return;
    }
    for result in results {
        match result {
            Verification::Passed(msg) => println!("{} {msg}", style("✓").green()),
            Verification::Warning(msg) => println!("{} {msg}", style("!").yellow()),
        }
    }
}

pub fn release_summary(
    ctx: &RunContext,
    pair: &VersionPair,
    dmg_path: &Path,
    release_url: &str,
    elapsed: Duration,
    skipped: &[String],
) {
    if ctx.quiet {
        println!(
            "{} Release {} published: {release_url}",
            style("✓").green(),
            pair.tag()
        );
        return;
    }

    let minutes = elapsed.as_secs() / 60;
    let seconds = elapsed.as_secs() % 60;
    let dmg_size_mb = std::fs::metadata(dmg_path)
        .map(|m| m.len() as f64 / (1024.0 * 1024.0))
        .unwrap_or(0.0);

    println!();
    println!(
        "{}",
        style(format!("Release {} Published Successfully!", pair.tag()))
            .green()
            .bold()
    );
    println!();
    println!("  Version:  {} (Build {})", pair.marketing, pair.build);
    println!("  DMG size: {dmg_size_mb:.1} MB");
    println!("  Location: {}", dmg_path.display());
    println!("  Duration: {minutes}m {seconds}s");
    println!();
    println!("  GitHub release: {}", style(release_url).cyan());
    if !skipped.is_empty() {
        println!();
        println!("  {}", style("Skipped:").yellow().bold());
        for item in skipped {
            println!("    • {item}");
        }
    }
    println!();
}
