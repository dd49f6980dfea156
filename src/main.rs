use anyhow::Result;
use clap::Parser;
use diskhealth::config::Config;
use diskhealth::{report, snapshot, Cancel, Collector, CommandRunner, Platform};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "diskhealth", about = "Disk temperature, age and SMART health", version = "0.1")]
struct Cli {
    /// Print the snapshot as JSON
    #[arg(long)]
    json: bool,

    /// Run smartctl through `sudo -n`
    #[arg(long)]
    sudo: bool,

    /// Deadline for the whole collection in seconds (0 = none)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// smartctl command line (overrides the config file)
    #[arg(long)]
    smartctl: Option<String>,

    /// Print config file path and current values, then exit
    #[arg(long)]
    config: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let cfg = Config::load();
    if cli.config {
        return run_print_config(&cfg);
    }

    let platform = Platform::detect();
    let command = cli.smartctl.as_deref().unwrap_or(&cfg.smartctl.command);
    let use_sudo = snapshot::needs_sudo(cli.sudo || cfg.general.use_sudo);
    let smartctl = CommandRunner::from_command_line(command)?.with_sudo(use_sudo);
    log::debug!("platform {}, smartctl {:?}, sudo {}", platform.label(), command, use_sudo);

    let timeout = cli.timeout.unwrap_or(cfg.general.timeout_sec);
    let cancel = if timeout == 0 {
        Cancel::new()
    } else {
        Cancel::with_timeout(Duration::from_secs(timeout))
    };

    let collector = Collector::system(platform, smartctl).with_enabled(cfg.general.enabled);
    let snap = collector.collect(&cancel);

    for e in &snap.errors {
        log::warn!("{}", e);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report::to_json(&snap))?);
    } else {
        print!("{}", report::generate(&snap));
    }
    Ok(())
}

fn run_print_config(cfg: &Config) -> Result<()> {
    let path = Config::config_path()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "(unknown)".to_string());
    println!("Config: {}", path);
    println!();
    println!("[general]");
    println!("  enabled     = {}", cfg.general.enabled);
    println!("  use_sudo    = {}", cfg.general.use_sudo);
    println!("  timeout_sec = {}", cfg.general.timeout_sec);
    println!();
    println!("[smartctl]");
    println!("  command = {:?}", cfg.smartctl.command);
    Ok(())
}
