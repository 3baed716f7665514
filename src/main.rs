mod cli;
mod config;
mod download;
mod error;
mod install;
mod settings;
mod types;

#[cfg(test)]
mod test_support;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use config::load_installer_settings;
use console::style;
use error::InstallError;
use install::github::GitHubSource;
use install::install_plugin;
use types::{InstallSummary, MergeOutcome, ReplaceMode};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli)?;

    let settings = match load_installer_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {:#}", style("error:").red().bold(), e);
            std::process::exit(2);
        }
    };
    let source = GitHubSource::new(&settings, !cli.quiet)?;

    let outcome = tokio::select! {
        result = install_plugin(&source, &settings, &cli.target) => result,
        _ = tokio::signal::ctrl_c() => Err(InstallError::Interrupted),
    };

    match outcome {
        Ok(summary) => {
            if !cli.quiet {
                print_summary(&summary);
            }
            Ok(())
        }
        Err(e) => {
            tracing::debug!(stage = ?e.stage(), "Install aborted");
            eprintln!("{} {}", style("error:").red().bold(), e);
            std::process::exit(e.exit_code());
        }
    }
}

fn setup_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.quiet {
        "error"
    } else if cli.verbose == 0 {
        "warn"
    } else if cli.verbose == 1 {
        "info"
    } else {
        "debug"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    Ok(())
}

fn print_summary(summary: &InstallSummary) {
    println!("\n{}", style("--- Plugin installed ---").bold());
    let version = match summary.release.tag() {
        Some(tag) => tag.to_string(),
        None => format!("{} (no tagged release)", summary.release.reference.name()),
    };
    println!("  {:<10} {}", "Version:", version);
    println!("  {:<10} {}", "Source:", summary.release.archive_url);
    println!(
        "  {:<10} {} ({} files{})",
        "Path:",
        summary.plugin_dir.display(),
        summary.files_installed,
        match summary.replace_mode {
            ReplaceMode::Staged => "",
            ReplaceMode::InPlace => ", copied in place",
        }
    );
    if !summary.executables.is_empty() {
        println!("  {:<10} {}", "Scripts:", summary.executables.len());
    }
    println!("  {:<10} {}", "Hook:", summary.command);

    tracing::debug!("Settings written: {}", summary.registration.written);
    let status = match summary.registration.outcome {
        MergeOutcome::Added => style("hook registered").green(),
        MergeOutcome::AlreadyPresent => style("already configured").yellow(),
    };
    println!(
        "  {:<10} {} ({})",
        "Settings:",
        summary.settings_path.display(),
        status
    );
    if let Some(backup) = &summary.registration.backup {
        println!(
            "  {} unreadable settings were moved to {}",
            style("note:").yellow().bold(),
            backup.display()
        );
    }
    println!("{}", style("------------------------").bold());
}
