//! `pantry-provision`: stage content for one test instance and upload it to
//! the running pantry server, then print the agent command line.
//!
//! ```text
//! pantry-provision --config pantry.yml --instance-root /tmp/sandbox [-l level]
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use pantry_core::{config, LogLevel, LogSettings, ProvisionConfig};
use pantry_sandbox::{HttpUploadClient, Provisioner, UnitReport};

#[derive(Parser, Debug)]
#[command(
    name = "pantry-provision",
    version,
    about = "Stage and upload configuration content for a test instance",
    long_about = None,
)]
struct Cli {
    /// Provisioning config (YAML).
    #[arg(short, long, default_value = "pantry.yml")]
    config: PathBuf,

    /// Local directory transferred to the instance afterwards.
    #[arg(long)]
    instance_root: PathBuf,

    #[arg(short = 'l', long, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    pantry_daemon::logging::init(
        &LogSettings {
            level: cli.log_level,
            file: None,
        },
        false,
    )
    .context("failed to initialise logging")?;

    let provision = ProvisionConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let home = config::home_dir()?;
    let provisioner = Provisioner::new(provision, home, cli.instance_root);

    let report = provisioner
        .create_sandbox(&mut HttpUploadClient::new())
        .with_context(|| format!("failed to provision against {}", provisioner.server_url()))?;

    for unit in &report.server {
        if let UnitReport::Skipped { kind, source } = unit {
            tracing::debug!(kind = %kind, "no {} to stage", source.display());
        }
    }
    tracing::info!(
        uploaded = report.upload.uploaded.len(),
        "sandbox ready in {}",
        provisioner.instance_root().display()
    );
    println!("{}", provisioner.run_command());
    Ok(())
}
