//! `keymode check`: load a keymap document the same way the editor does and report the result.

use crate::cli::CheckArgs;
use anyhow::Result;
use keymode::{Config, FileSource, Keymap, KeymapLoader, KeymapSource};
use std::{fmt, sync::Arc};

/// Bindings installed by a successful load, sorted for display.
#[derive(Debug)]
pub struct Report {
    pub address: String,
    pub mode_switch: Option<u32>,
    pub maps: Vec<(String, Vec<(String, String)>)>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "keymap: {}", self.address)?;
        match self.mode_switch {
            Some(code) => writeln!(f, "mode-switch-key: {code}")?,
            None => writeln!(f, "mode-switch-key: <none>")?,
        }
        for (name, bindings) in &self.maps {
            writeln!(f, "{name} ({} bindings)", bindings.len())?;
            for (key, command) in bindings {
                writeln!(f, "  {key:>6} -> {command}")?;
            }
        }
        Ok(())
    }
}

pub async fn run(args: CheckArgs, config: &Config) -> Result<Report> {
    let source: Arc<dyn KeymapSource> = match args.base_dir {
        Some(dir) => Arc::new(FileSource::with_base_dir(dir)),
        None => Arc::new(FileSource::new()),
    };
    let address = args.address.unwrap_or_else(|| config.keymap.clone());
    check(source, &address).await
}

pub async fn check(source: Arc<dyn KeymapSource>, address: &str) -> Result<Report> {
    let loader = KeymapLoader::new(source, Keymap::shared());
    loader.load(address).await?;

    let keymap = loader.keymap().read();
    let maps = keymap
        .map_names()
        .into_iter()
        .filter_map(|name| {
            let bindings = keymap.sub_map(name)?;
            let mut sorted: Vec<(String, String)> = bindings
                .iter()
                .map(|(key, command)| (key.to_string(), command.clone()))
                .collect();
            sorted.sort_by(|(a, _), (b, _)| compare_keys(a, b));
            Some((name.to_string(), sorted))
        })
        .collect();

    Ok(Report {
        address: address.to_string(),
        mode_switch: keymap.mode_switch_code(),
        maps,
    })
}

// Numeric key codes sort numerically and before named keys.
fn compare_keys(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
