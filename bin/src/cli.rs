use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "keymode", about = "Inspect and validate modal keymaps")]
pub struct Cli {
    /// Path to a keymode.toml; the embedded defaults are used when omitted
    #[arg(long, global = true, env = "KEYMODE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log file path, or a directory to place the log file in
    #[arg(long, global = true, env = "KEYMODE_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a keymap document and print the bindings it installs
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Keymap address; defaults to the configured keymap
    pub address: Option<String>,

    /// Directory relative addresses are resolved against
    #[arg(long)]
    pub base_dir: Option<PathBuf>,
}
