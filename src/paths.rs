//! Configuration path resolution.
//!
//! The config file is looked up in this order:
//!
//! 1. The `--config` command-line argument, when given.
//! 2. `konamicode.yaml` in the current working directory (development).
//! 3. `<config dir>/konamicode/config.yaml`, where the config dir comes from
//!    `dirs::config_dir()` (`~/.config` on Linux).

use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name used under the user config dir
const APP_DIR: &str = "konamicode";

/// File name looked up in the working directory
pub const LOCAL_CONFIG: &str = "konamicode.yaml";

/// Resolve the configuration file path
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve(explicit, &cwd, dirs::config_dir())
}

fn resolve(explicit: Option<&Path>, cwd: &Path, config_dir: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let local = cwd.join(LOCAL_CONFIG);
    if local.exists() {
        debug!("Using config from working directory: {}", local.display());
        return local;
    }

    config_dir
        .map(|dir| dir.join(APP_DIR).join("config.yaml"))
        .unwrap_or(local)
}
