use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use lemur_core::config::{Config, WarnLevel};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Write a default configuration file if none exists
    Init,

    /// Show the effective configuration
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(path: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Init => init(path),
        ConfigSubcommand::Show => show(path, json),
        ConfigSubcommand::Validate => validate(path, json),
    }
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        println!("{} already exists, leaving it untouched.", path.display());
        return Ok(());
    }
    Config::default()
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(path: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(path).context("failed to load config")?;

    if json {
        return print_json(&config);
    }

    let mut overrides: Vec<_> = config.probabilities.iter().collect();
    overrides.sort_by(|a, b| a.0.cmp(b.0));

    let rows = vec![
        vec!["schedule".to_string(), config.schedule.clone()],
        vec![
            "default_probability".to_string(),
            config.default_probability.to_string(),
        ],
        vec!["whitelist".to_string(), config.whitelist.join(", ")],
        vec!["blacklist".to_string(), config.blacklist.join(", ")],
        vec!["dry_run".to_string(), config.dry_run.to_string()],
        vec!["state".to_string(), config.state.to_string()],
        vec![
            "max_concurrency".to_string(),
            config.max_concurrency.to_string(),
        ],
        vec![
            "infrastructure".to_string(),
            config.infrastructure.kind().to_string(),
        ],
    ];
    print_table(&["SETTING", "VALUE"], rows);

    if !overrides.is_empty() {
        println!();
        let rows = overrides
            .into_iter()
            .map(|(name, p)| vec![name.clone(), p.to_string()])
            .collect();
        print_table(&["NAME", "PROBABILITY"], rows);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(path: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(path).context("failed to load config")?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    let has_errors = warnings.iter().any(|w| w.level == WarnLevel::Error);
    if has_errors {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}
