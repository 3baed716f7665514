use crate::types::ArchiveFormat;
use clap::Parser;
use std::path::PathBuf;

fn get_version() -> &'static str {
    const BASE_VERSION: &str = env!("CARGO_PKG_VERSION");

    // Tagged builds report the tag alone
    if let Some(tag) = option_env!("PLUGIN_BOOTSTRAP_GIT_TAG") {
        return tag;
    }

    let commit = option_env!("PLUGIN_BOOTSTRAP_GIT_COMMIT").unwrap_or("unknown");
    let branch = option_env!("PLUGIN_BOOTSTRAP_GIT_BRANCH").unwrap_or("unknown");

    // Leaked once at startup so clap can hold a &'static str
    let version = format!("v{}-{} ({})", BASE_VERSION, commit, branch);
    Box::leak(version.into_boxed_str())
}

#[derive(Parser, Debug)]
#[command(name = "plugin-bootstrap")]
#[command(about = "Installs a session-start plugin from GitHub and registers its hook")]
#[command(version = get_version())]
#[command(
    after_help = "Examples:\n  plugin-bootstrap\n  plugin-bootstrap ~/projects/api\n  plugin-bootstrap --repo acme/session-tools --branch trunk ."
)]
pub struct Cli {
    /// Project directory to install into
    #[arg(default_value = ".")]
    pub target: PathBuf,

    /// GitHub repository to install from ('owner/name')
    #[arg(long)]
    pub repo: Option<String>,

    /// Directory name under .claude/plugins (defaults to the repository name)
    #[arg(long)]
    pub plugin_name: Option<String>,

    /// Branch used when no tagged release can be resolved
    #[arg(long)]
    pub branch: Option<String>,

    /// Archive format to download
    #[arg(long, value_enum)]
    pub format: Option<ArchiveFormat>,

    /// Increase verbosity (use multiple times for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Reduce output to errors only
    #[arg(short, long)]
    pub quiet: bool,
}
