//! Path resolution for postinst
//!
//! # Environment Variables
//!
//! - `POSTINST_CONFIG` - Override the configuration file
//!
//! # Config Resolution Priority
//!
//! 1. `--config <FILE>`
//! 2. `POSTINST_CONFIG` environment variable
//! 3. `/etc/postinst/config.toml` (if it exists)
//! 4. `~/.config/postinst/config.toml` of the target user (if it exists)
//! 5. The built-in default configuration
//!
//! # Expansion
//!
//! Values in the config are expanded against the *target* user, not the
//! user the process runs as: `~`, `$HOME` and `$USER` refer to the person
//! who invoked `sudo`, and `$GOPATH` to their Go workspace.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::user::TargetUser;

/// Environment variable for config file override
pub const ENV_CONFIG: &str = "POSTINST_CONFIG";

/// System-wide config location
pub const SYSTEM_CONFIG: &str = "/etc/postinst/config.toml";

/// Where the configuration comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    BuiltIn,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::BuiltIn => write!(f, "built-in default"),
        }
    }
}

/// Decide which configuration file to load
pub fn config_source(explicit: Option<&Path>, user: &TargetUser) -> ConfigSource {
    // 1. Command line
    if let Some(path) = explicit {
        log::debug!("Using config from --config: {}", path.display());
        return ConfigSource::File(path.to_path_buf());
    }

    // 2. Environment variable override
    if let Ok(path) = std::env::var(ENV_CONFIG)
        && !path.is_empty()
    {
        let path = expand_path(&path, user);
        log::debug!("Using config from {}: {}", ENV_CONFIG, path.display());
        return ConfigSource::File(path);
    }

    // 3. System-wide file
    let system = PathBuf::from(SYSTEM_CONFIG);
    if system.is_file() {
        log::debug!("Using system config: {}", system.display());
        return ConfigSource::File(system);
    }

    // 4. Target user's file
    let per_user = user_config_path(user);
    if per_user.is_file() {
        log::debug!("Using user config: {}", per_user.display());
        return ConfigSource::File(per_user);
    }

    log::debug!("Using built-in default config");
    ConfigSource::BuiltIn
}

/// Per-user config location
pub fn user_config_path(user: &TargetUser) -> PathBuf {
    user.home.join(".config").join("postinst").join("config.toml")
}

/// Expand `~` and variables in a config value for the target user
///
/// `HOME`, `USER` and `GOPATH` come from the target user; anything else is
/// read from the process environment. Unknown variables are left as-is.
pub fn expand(value: &str, user: &TargetUser) -> String {
    let expanded = shellexpand::full_with_context_no_errors(
        value,
        || Some(user.home.to_string_lossy().into_owned()),
        |var: &str| -> Option<String> {
            match var {
                "HOME" => Some(user.home.to_string_lossy().into_owned()),
                "USER" | "LOGNAME" => Some(user.name.clone()),
                "GOPATH" => Some(user.gopath().to_string_lossy().into_owned()),
                other => std::env::var(other).ok(),
            }
        },
    );
    expanded.into_owned()
}

/// Expand a config value into a path for the target user
pub fn expand_path(value: &str, user: &TargetUser) -> PathBuf {
    PathBuf::from(expand(value, user))
}

/// Display a path relative to the target user's home, using `~`
pub fn display(path: &Path, user: &TargetUser) -> String {
    match path.strip_prefix(&user.home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => path.display().to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
