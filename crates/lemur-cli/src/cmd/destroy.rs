use crate::output::print_json;
use anyhow::Context;
use lemur_core::config::Config;
use lemur_core::types::TaskStatus;
use std::path::Path;

/// One scheduled-style run, executed in-process.
pub fn run(config_path: &Path, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let mut config = Config::load(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    config.dry_run |= dry_run;

    let destroyer = lemur_server::build_destroyer(&config)?;

    let rt = tokio::runtime::Runtime::new()?;
    let task = rt.block_on(destroyer.destroy())?;

    if json {
        print_json(&task)?;
    } else {
        println!("task {} {} ({})", task.id, task.status, task.trigger);
        if let Some(error) = &task.error {
            println!("  error: {error}");
        }
    }

    if task.status == TaskStatus::Failed {
        anyhow::bail!("destruction run failed");
    }
    Ok(())
}
