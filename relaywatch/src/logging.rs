//! tracing-subscriber setup. The TUI owns the terminal, so in that mode log
//! lines go to a file in the config dir instead of stderr.

use std::{fs, path::PathBuf, sync::Mutex};

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

pub fn init_logging(target: LogTarget) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    match target {
        LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
    }
    .map_err(|e| anyhow!("init logging: {e}"))
}

pub fn log_file_path() -> PathBuf {
    crate::profiles::config_dir().join("relaywatch.log")
}
