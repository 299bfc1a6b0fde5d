use anyhow::Result;
use colored::Colorize;

use clawmeter_core::config::{get_settings, resolve_model, Paths};
use clawmeter_core::context_window::format_token_count;
use clawmeter_core::models::{known_families, DEFAULT_CONTEXT_WINDOW, MODEL_ALIASES};

/// List context windows by family, settings overrides, and shortnames.
pub fn list_models(paths: &Paths) -> Result<()> {
    let settings = get_settings(&paths.settings_file)?;

    println!();
    println!("  {}", "Context Windows".green().bold());
    println!();
    for (family, window) in known_families() {
        println!("  {:<14} {:>10}", family, format_token_count(*window));
    }
    println!(
        "  {:<14} {:>10}",
        "(default)".dimmed(),
        format_token_count(DEFAULT_CONTEXT_WINDOW)
    );

    if let Some(overrides) = settings
        .model
        .as_ref()
        .and_then(|m| m.context_windows.as_ref())
        .filter(|o| !o.is_empty())
    {
        println!();
        println!("  {}", "Overrides (settings.json)".green().bold());
        println!();
        let mut entries: Vec<_> = overrides.iter().collect();
        entries.sort();
        for (model, window) in entries {
            println!("  {} {}", model.bright_white(), format_token_count(*window));
        }
    }

    println!();
    println!("  {}", "Shortnames".green().bold());
    println!();
    let mut aliases: Vec<_> = MODEL_ALIASES.iter().collect();
    aliases.sort();
    for (alias, model) in aliases {
        println!("  {:<10} → {}", alias, model.dimmed());
    }

    println!();
    println!("  Default model: {}", resolve_model(None, &settings).bright_white());
    println!();
    Ok(())
}
