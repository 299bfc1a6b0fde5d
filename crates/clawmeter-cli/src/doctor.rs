use anyhow::Result;
use colored::Colorize;

use clawmeter_core::config::{get_settings, resolve_model, validate_settings, Paths};
use clawmeter_core::context_window::format_token_count;
use clawmeter_core::models::resolve_context_window;
use clawmeter_core::tokens::{Encoding, TokenCounter};

/// Run the doctor command: check settings and tokenizers.
pub fn run_doctor(paths: &Paths) -> Result<()> {
    println!();
    println!("  {}", "Clawmeter Doctor".green().bold());
    println!("  {}", "Checking your setup...".dimmed());
    println!();

    let mut issues = 0;

    // 1. Settings file
    let settings = if paths.settings_file.exists() {
        match get_settings(&paths.settings_file) {
            Ok(s) => {
                print_ok(&format!("Settings: {}", paths.settings_file.display()));
                s
            }
            Err(e) => {
                print_fail(&format!("Settings file unreadable: {}", e));
                issues += 1;
                Default::default()
            }
        }
    } else {
        print_warn(&format!(
            "Settings file not found: {} (using defaults)",
            paths.settings_file.display()
        ));
        Default::default()
    };

    // 2. Settings values
    let problems = validate_settings(&settings);
    if problems.is_empty() {
        print_ok("Context and rate limit settings are valid");
    } else {
        for problem in &problems {
            print_fail(&problem.to_string());
        }
        issues += problems.len();
    }

    // 3. Tokenizers
    for encoding in [Encoding::Cl100kBase, Encoding::O200kBase] {
        let model = match encoding {
            Encoding::Cl100kBase => "gpt-4",
            Encoding::O200kBase => "gpt-4o",
        };
        if TokenCounter::for_model(model).is_exact() {
            print_ok(&format!("Tokenizer {} loaded", encoding.name()));
        } else {
            print_fail(&format!(
                "Tokenizer {} unavailable, counts will be estimated",
                encoding.name()
            ));
            issues += 1;
        }
    }

    // 4. Default model
    let model = resolve_model(None, &settings);
    let counter = TokenCounter::for_model(&model);
    print_ok(&format!(
        "Default model: {} ({}, {} context)",
        model,
        counter.encoding().name(),
        format_token_count(resolve_context_window(&model, &settings))
    ));

    // Summary
    println!();
    if issues == 0 {
        println!("  {} {}", "All checks passed!".green().bold(), "You're good to go.".dimmed());
    } else {
        println!(
            "  {} {}",
            format!("{} issue(s) found.", issues).yellow().bold(),
            "Fix the items above and run doctor again.".dimmed()
        );
    }
    println!();

    Ok(())
}

fn print_ok(msg: &str) {
    println!("  {} {}", "✓".green(), msg);
}

fn print_fail(msg: &str) {
    println!("  {} {}", "✗".red(), msg);
}

fn print_warn(msg: &str) {
    println!("  {} {}", "!".yellow(), msg);
}
