//! Server entry point.
//!
//! # Responsibility
//! - Load configuration and start file logging before anything else runs.
//! - Exit non-zero with a one-line reason when startup fails.

use duet_web::config::Config;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("duet: {err}");
            return ExitCode::FAILURE;
        }
    };

    let log_dir = match absolute(&config.log_dir) {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("duet: cannot resolve log directory: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = duet_core::init_logging(&config.log_level, &log_dir) {
        eprintln!("duet: {err}");
        return ExitCode::FAILURE;
    }
    log::info!(
        "event=startup module=main status=ok version={}",
        duet_core::core_version()
    );
    config.log_defaults();

    match duet_web::serve(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=startup module=main status=error error={err}");
            eprintln!("duet: {err}");
            ExitCode::FAILURE
        }
    }
}

fn absolute(dir: &Path) -> std::io::Result<PathBuf> {
    if dir.is_absolute() {
        Ok(dir.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(dir))
    }
}
