use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use clawmeter_core::config::{
    build_accountant, build_rate_limiter, get_settings, resolve_model, Paths,
};
use clawmeter_core::models::resolve_context_window;
use clawmeter_core::{format_usage, ChatGate, GateDecision};

use crate::request::load_request;

/// Send `burst` back-to-back admissions for one session through the gate and
/// show what each one got.
pub fn run_burst(request_path: &Path, session: &str, burst: u32, paths: &Paths) -> Result<()> {
    let settings = get_settings(&paths.settings_file)?;
    let request = load_request(request_path)?;
    let model = resolve_model(request.model.as_deref(), &settings);
    let max_tokens = resolve_context_window(&model, &settings) as i64;

    let gate = ChatGate::new(
        build_rate_limiter(&settings)?,
        build_accountant(&settings, &model)?,
    );

    println!();
    println!(
        "  {} session {}: {} per {}s",
        "Rate Limit".green().bold(),
        session.bright_white(),
        gate.limiter().max_requests(),
        gate.limiter().window_seconds()
    );
    println!();

    let mut admitted = 0;
    for i in 1..=burst {
        match gate.admit(session, &request, max_tokens)? {
            GateDecision::Admitted(report) => {
                admitted += 1;
                let note = if report.needs_summarization() {
                    " (summarize first)".yellow().to_string()
                } else {
                    String::new()
                };
                println!("  {} #{} admitted: {}{}", "✓".green(), i, format_usage(&report), note);
            }
            GateDecision::RateLimited { reason } => {
                println!("  {} #{} {}", "✗".red(), i, reason);
            }
        }
    }

    println!();
    println!(
        "  {} of {} admitted, {} tracked in window.",
        admitted,
        burst,
        gate.limiter().tracked_requests(session)
    );
    println!();
    Ok(())
}
