use clap::Parser;
use keymode::Config;
use keymode_bin::{
    cli::{Cli, Command},
    commands,
};
use keymode_log::LogConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _log_guard = match keymode_log::init(LogConfig {
        log_file_path: cli.log_file.clone(),
    }) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {e}");
            None
        },
    };

    let discovered = std::env::current_dir()
        .ok()
        .and_then(|cwd| Config::discover(&cwd));
    let config = Config::load_with_overrides(cli.config.as_deref(), discovered.as_deref())
        .unwrap_or_else(|e| {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        });

    let result = match cli.command {
        Command::Check(args) => commands::check::run(args, &config).await,
    };

    match result {
        Ok(report) => print!("{report}"),
        Err(e) => {
            tracing::error!("keymap check failed: {e:#}");
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        },
    }
}
