mod settings;

use std::path::PathBuf;
use std::{env, io};

pub use settings::{Agent, Broker, Device, Engine, EngineConfig, Logger, Settings};

/// Resolve `path` against the working directory unless it is absolute.
pub fn normalize_path(path: &str) -> io::Result<PathBuf> {
    let path_buf = PathBuf::from(path);

    Ok(if path_buf.is_absolute() {
        path_buf
    } else {
        env::current_dir()?.join(path_buf)
    })
}
