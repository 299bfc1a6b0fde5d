use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use clawmeter_core::compaction::{build_summarization_prompt, split_for_summary};
use clawmeter_core::config::{build_accountant, get_keep_recent, get_settings, resolve_model, Paths};
use clawmeter_core::context_window::format_token_count;
use clawmeter_core::models::resolve_context_window;
use clawmeter_core::types::Settings;
use clawmeter_core::{format_usage, TokenUsageReport};

use crate::request::load_request;

/// Explicit `--max-tokens`, else the model's context window.
fn resolve_max_tokens(explicit: Option<i64>, model: &str, settings: &Settings) -> i64 {
    explicit.unwrap_or_else(|| resolve_context_window(model, settings) as i64)
}

/// Print the usage report for a request file.
pub fn show_usage(
    request_path: &Path,
    model: Option<&str>,
    max_tokens: Option<i64>,
    json: bool,
    paths: &Paths,
) -> Result<()> {
    let settings = get_settings(&paths.settings_file)?;
    let request = load_request(request_path)?;
    let model = resolve_model(model.or(request.model.as_deref()), &settings);
    let max_tokens = resolve_max_tokens(max_tokens, &model, &settings);

    let accountant = build_accountant(&settings, &model)?;
    let report = accountant.calculate_usage(
        &request.system_prompt,
        &request.memory_blocks,
        &request.tools,
        &request.messages,
        max_tokens,
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&model, &report, accountant.counter().is_exact());
    Ok(())
}

fn print_report(model: &str, report: &TokenUsageReport, exact: bool) {
    println!();
    println!("  {} {}", "Context Usage".green().bold(), model.dimmed());
    println!();
    let rows = [
        ("System prompt", report.system_tokens()),
        ("Memory blocks", report.memory_blocks_tokens()),
        ("Tool schemas", report.tool_schema_tokens()),
        ("Conversation", report.conversation_tokens()),
    ];
    for (label, tokens) in rows {
        println!("  {:<15} {:>10}", label, format_token_count(tokens));
    }
    println!("  {:<15} {:>10}", "Total".bold(), format_token_count(report.total_tokens()));
    println!();
    println!("  {}", format_usage(report).bright_white());
    if !exact {
        println!("  {}", "Counts are estimated (tokenizer unavailable).".yellow());
    }

    if report.tokens_remaining() < 0 {
        println!(
            "  {} Over the context window by {} tokens.",
            "✗".red(),
            -report.tokens_remaining()
        );
    }
    if report.needs_summarization() {
        println!(
            "  {} Summarization needed ({:.1}% used, threshold {:.0}%).",
            "!".yellow(),
            report.percentage_used(),
            report.threshold() * 100.0
        );
        println!("  Preview with: {}", "clawmeter compact <request>".green());
    } else {
        println!("  {} Within budget ({:.1}% used).", "✓".green(), report.percentage_used());
    }
    println!();
}

/// Print the summarization prompt for the older part of a request's history.
pub fn show_compaction(
    request_path: &Path,
    keep_recent: Option<usize>,
    paths: &Paths,
) -> Result<()> {
    let settings = get_settings(&paths.settings_file)?;
    let request = load_request(request_path)?;
    let model = resolve_model(request.model.as_deref(), &settings);
    let keep_recent = keep_recent.unwrap_or_else(|| get_keep_recent(&settings));

    let (older, recent) = split_for_summary(&request.messages, keep_recent);
    if older.is_empty() {
        println!(
            "{}",
            format!(
                "Nothing to summarize: {} message(s), keeping the last {}.",
                request.messages.len(),
                keep_recent
            )
            .green()
        );
        return Ok(());
    }

    let accountant = build_accountant(&settings, &model)?;
    let counter = accountant.counter();
    eprintln!(
        "{} Summarizing {} message(s) ({} tokens), keeping {} ({} tokens).",
        "→".cyan(),
        older.len(),
        counter.count_messages(&older),
        recent.len(),
        counter.count_messages(&recent)
    );
    println!("{}", build_summarization_prompt(&older));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawmeter_core::types::ModelSettings;
    use std::collections::HashMap;

    #[test]
    fn test_explicit_max_tokens_wins() {
        let settings = Settings::default();
        assert_eq!(resolve_max_tokens(Some(1000), "openai/gpt-4o", &settings), 1000);
        assert_eq!(resolve_max_tokens(Some(-5), "openai/gpt-4o", &settings), -5);
    }

    #[test]
    fn test_max_tokens_from_model() {
        let mut overrides = HashMap::new();
        overrides.insert("openai/gpt-4o".to_string(), 50_000);
        let settings = Settings {
            model: Some(ModelSettings {
                default_model: None,
                context_windows: Some(overrides),
            }),
            ..Default::default()
        };
        assert_eq!(resolve_max_tokens(None, "openai/gpt-4o", &settings), 50_000);
        assert_eq!(
            resolve_max_tokens(None, "anthropic/claude-3.5-sonnet", &settings),
            200_000
        );
    }
}
