use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use clawmeter_core::config::{get_settings, resolve_model, Paths};
use clawmeter_core::TokenCounter;

/// Count tokens in the given words, a file, or stdin (in that order of precedence:
/// file, then words, then stdin when no words were given).
pub fn count(
    words: &[String],
    file: Option<&Path>,
    model: Option<&str>,
    paths: &Paths,
) -> Result<()> {
    let settings = get_settings(&paths.settings_file)?;
    let model = resolve_model(model, &settings);

    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None if !words.is_empty() => words.join(" "),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let counter = TokenCounter::for_model(&model);
    let tokens = counter.count_text(&text);

    if counter.is_exact() {
        println!("{} tokens", tokens.to_string().bright_white().bold());
    } else {
        println!(
            "{} tokens {}",
            tokens.to_string().bright_white().bold(),
            "(estimated)".yellow()
        );
    }
    println!(
        "  {} {} ({})",
        "model:".dimmed(),
        model,
        counter.encoding().name().dimmed()
    );
    Ok(())
}
