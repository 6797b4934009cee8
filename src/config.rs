//! Configuration schema
//!
//! A config file is an ordered array of `[[step]]` tables. Each table names
//! its `kind`; the remaining keys depend on the kind. Order in the file is
//! execution order.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

use crate::paths::ConfigSource;

/// The configuration shipped with the binary
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

static ENV_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("env name pattern is valid")
});

static PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    // Debian policy: lowercase alphanumerics, + - . and an optional :arch
    Regex::new(r"^[a-z0-9][a-z0-9+.\-]*(:[a-z0-9]+)?$").expect("package name pattern is valid")
});

// ============================================================================
// Main Config Schema
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, rename = "step")]
    pub steps: Vec<StepConfig>,
}

/// One `[[step]]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepConfig {
    AptUpdate(AptUpdateConfig),
    Apt(AptConfig),
    Directory(DirectoryConfig),
    File(FileConfig),
    Env(EnvConfig),
    Download(DownloadConfig),
    Git(GitConfig),
    Go(GoConfig),
    Exec(ExecConfig),
    Service(ServiceConfig),
}

impl StepConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AptUpdate(_) => "apt_update",
            Self::Apt(_) => "apt",
            Self::Directory(_) => "directory",
            Self::File(_) => "file",
            Self::Env(_) => "env",
            Self::Download(_) => "download",
            Self::Git(_) => "git",
            Self::Go(_) => "go",
            Self::Exec(_) => "exec",
            Self::Service(_) => "service",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AptUpdateConfig {
    /// Refresh the package lists when they are older than this
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,
    /// Stamp file touched after a successful update
    #[serde(default = "default_apt_stamp")]
    pub stamp: String,
}

fn default_max_age_hours() -> u64 {
    24
}

fn default_apt_stamp() -> String {
    "/var/lib/postinst/apt-update.stamp".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AptConfig {
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub path: String,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub path: String,
    pub contents: String,
    #[serde(default)]
    pub mode: Option<String>,
    /// Leave an existing file alone even if its contents differ
    #[serde(default)]
    pub preserve: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvConfig {
    pub name: String,
    /// Written literally; the shell expands it at login
    pub value: String,
    #[serde(default = "default_rc_files")]
    pub rc_files: Vec<String>,
}

fn default_rc_files() -> Vec<String> {
    vec!["~/.zshrc".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    pub url: String,
    pub dest: String,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    pub url: String,
    pub dest: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub depth: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoConfig {
    /// Module path with version, e.g. `github.com/ropnop/kerbrute@latest`
    pub package: String,
    /// Installed binary name; derived from the package path when omitted
    #[serde(default)]
    pub binary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    pub name: String,
    /// Program and arguments; never passed through a shell
    pub argv: Vec<String>,
    /// The step counts as done once this path exists
    pub creates: String,
    /// Run as the target user instead of root
    #[serde(default)]
    pub as_user: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub unit: String,
    /// Restart when any of these changed after the unit started
    #[serde(default)]
    pub watch: Vec<String>,
}

// ============================================================================
// Errors
// ============================================================================

/// Problems found while validating a configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("step {index} ({kind}): `{field}` must not be empty")]
    Empty {
        index: usize,
        kind: &'static str,
        field: &'static str,
    },

    #[error("step {index} ({kind}): `{value}` is not an absolute path, `~/` path or `$VAR` path")]
    RelativePath {
        index: usize,
        kind: &'static str,
        value: String,
    },

    #[error("step {index} (env): `{name}` is not a valid environment variable name")]
    InvalidEnvName { index: usize, name: String },

    #[error("step {index} (apt): `{name}` is not a valid package name")]
    InvalidPackage { index: usize, name: String },

    #[error("step {index} ({kind}): mode `{value}` is not an octal permission like \"0644\"")]
    InvalidMode {
        index: usize,
        kind: &'static str,
        value: String,
    },

    #[error("step {index} ({kind}): `{value}` is not an http(s) or git URL")]
    InvalidUrl {
        index: usize,
        kind: &'static str,
        value: String,
    },
}

// ============================================================================
// Loading & validation
// ============================================================================

impl Config {
    /// Load and validate the configuration from a source
    pub fn load(source: &ConfigSource) -> Result<Self> {
        let config = match source {
            ConfigSource::BuiltIn => Self::parse(DEFAULT_CONFIG)
                .context("Built-in default configuration is invalid")?,
            ConfigSource::File(path) => Self::load_file(path)?,
        };
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {source}"))?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))
    }

    /// Parse a TOML document
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, step) in self.steps.iter().enumerate() {
            let index = i + 1;
            let kind = step.kind();
            match step {
                StepConfig::AptUpdate(c) => check_path(index, kind, &c.stamp)?,
                StepConfig::Apt(c) => {
                    if c.packages.is_empty() {
                        return Err(ConfigError::Empty {
                            index,
                            kind,
                            field: "packages",
                        });
                    }
                    if let Some(bad) = c.packages.iter().find(|p| !PACKAGE_NAME.is_match(p)) {
                        return Err(ConfigError::InvalidPackage {
                            index,
                            name: bad.clone(),
                        });
                    }
                }
                StepConfig::Directory(c) => {
                    check_path(index, kind, &c.path)?;
                    check_mode(index, kind, c.mode.as_deref())?;
                }
                StepConfig::File(c) => {
                    check_path(index, kind, &c.path)?;
                    check_mode(index, kind, c.mode.as_deref())?;
                }
                StepConfig::Env(c) => {
                    if !ENV_NAME.is_match(&c.name) {
                        return Err(ConfigError::InvalidEnvName {
                            index,
                            name: c.name.clone(),
                        });
                    }
                    if c.rc_files.is_empty() {
                        return Err(ConfigError::Empty {
                            index,
                            kind,
                            field: "rc_files",
                        });
                    }
                    for rc in &c.rc_files {
                        check_path(index, kind, rc)?;
                    }
                }
                StepConfig::Download(c) => {
                    check_url(index, kind, &c.url, false)?;
                    check_path(index, kind, &c.dest)?;
                    check_mode(index, kind, c.mode.as_deref())?;
                }
                StepConfig::Git(c) => {
                    check_url(index, kind, &c.url, true)?;
                    check_path(index, kind, &c.dest)?;
                }
                StepConfig::Go(c) => check_not_empty(index, kind, "package", &c.package)?,
                StepConfig::Exec(c) => {
                    check_not_empty(index, kind, "name", &c.name)?;
                    if c.argv.first().is_none_or(String::is_empty) {
                        return Err(ConfigError::Empty {
                            index,
                            kind,
                            field: "argv",
                        });
                    }
                    check_path(index, kind, &c.creates)?;
                }
                StepConfig::Service(c) => {
                    check_not_empty(index, kind, "unit", &c.unit)?;
                    for path in &c.watch {
                        check_path(index, kind, path)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_not_empty(
    index: usize,
    kind: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Empty { index, kind, field });
    }
    Ok(())
}

fn check_path(index: usize, kind: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with('/') || value.starts_with("~/") || value.starts_with('$') {
        return Ok(());
    }
    Err(ConfigError::RelativePath {
        index,
        kind,
        value: value.to_string(),
    })
}

fn check_mode(index: usize, kind: &'static str, mode: Option<&str>) -> Result<(), ConfigError> {
    match mode {
        None => Ok(()),
        Some(value) => parse_mode(value).map(|_| ()).ok_or(ConfigError::InvalidMode {
            index,
            kind,
            value: value.to_string(),
        }),
    }
}

fn check_url(index: usize, kind: &'static str, url: &str, allow_git: bool) -> Result<(), ConfigError> {
    let ok = url.starts_with("https://")
        || url.starts_with("http://")
        || (allow_git && (url.starts_with("git@") || url.starts_with("ssh://")));
    if ok {
        return Ok(());
    }
    Err(ConfigError::InvalidUrl {
        index,
        kind,
        value: url.to_string(),
    })
}

/// Parse an octal permission string such as "0644" or "0o755"
pub fn parse_mode(value: &str) -> Option<u32> {
    let digits = value.strip_prefix("0o").unwrap_or(value);
    if digits.is_empty() || digits.len() > 4 {
        return None;
    }
    u32::from_str_radix(digits, 8).ok().filter(|m| *m <= 0o7777)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::parse(DEFAULT_CONFIG).unwrap();
        config.validate().unwrap();
        assert!(!config.steps.is_empty());
        let update = config.steps.iter().position(|s| s.kind() == "apt_update");
        let install = config.steps.iter().position(|s| s.kind() == "apt");
        assert!(update < install);
    }

    #[test]
    fn test_default_config_sets_gopath_before_go_installs() {
        let config = Config::parse(DEFAULT_CONFIG).unwrap();
        let env = config
            .steps
            .iter()
            .position(|s| matches!(s, StepConfig::Env(e) if e.name == "GOPATH"))
            .unwrap();
        let go = config
            .steps
            .iter()
            .position(|s| s.kind() == "go")
            .unwrap();
        assert!(env < go);
    }

    #[test]
    fn test_parse_ordered_steps() {
        let config = Config::parse(
            r#"
[[step]]
kind = "apt"
packages = ["tmux", "git"]

[[step]]
kind = "env"
name = "GOPATH"
value = "$HOME/go"

[[step]]
kind = "file"
path = "~/.tmux.conf"
contents = "set -g mouse on\n"
mode = "0644"
"#,
        )
        .unwrap();

        let kinds: Vec<_> = config.steps.iter().map(StepConfig::kind).collect();
        assert_eq!(kinds, vec!["apt", "env", "file"]);
        match &config.steps[1] {
            StepConfig::Env(env) => assert_eq!(env.rc_files, vec!["~/.zshrc"]),
            other => panic!("expected env step, got {other:?}"),
        }
        config.validate().unwrap();
    }

    #[test]
    fn test_apt_update_defaults() {
        let config = Config::parse("[[step]]\nkind = \"apt_update\"\n").unwrap();
        match &config.steps[0] {
            StepConfig::AptUpdate(c) => {
                assert_eq!(c.max_age_hours, 24);
                assert_eq!(c.stamp, "/var/lib/postinst/apt-update.stamp");
            }
            other => panic!("expected apt_update, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(Config::parse("[[step]]\nkind = \"snap\"\nname = \"x\"\n").is_err());
    }

    #[test]
    fn test_empty_config() {
        let config = Config::parse("").unwrap();
        assert!(config.steps.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_relative_path() {
        let config = Config::parse(
            "[[step]]\nkind = \"directory\"\npath = \"tools\"\n",
        )
        .unwrap();
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::RelativePath {
                index: 1,
                kind: "directory",
                value: "tools".into()
            }
        );
    }

    #[test]
    fn test_validate_env_name() {
        let config = Config::parse(
            "[[step]]\nkind = \"env\"\nname = \"GO PATH\"\nvalue = \"x\"\n",
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEnvName { index: 1, .. })
        ));
    }

    #[test]
    fn test_validate_package_names() {
        let ok = Config::parse("[[step]]\nkind = \"apt\"\npackages = [\"libc6:i386\", \"g++\"]\n")
            .unwrap();
        ok.validate().unwrap();

        let bad = Config::parse("[[step]]\nkind = \"apt\"\npackages = [\"tmux; rm -rf /\"]\n")
            .unwrap();
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::InvalidPackage { .. })
        ));

        let empty = Config::parse("[[step]]\nkind = \"apt\"\npackages = []\n").unwrap();
        assert!(matches!(
            empty.validate(),
            Err(ConfigError::Empty {
                field: "packages",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_exec_requires_argv() {
        let config = Config::parse(
            "[[step]]\nkind = \"exec\"\nname = \"x\"\nargv = []\ncreates = \"/opt/x\"\n",
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Empty { field: "argv", .. })
        ));
    }

    #[test]
    fn test_validate_urls() {
        let config = Config::parse(
            "[[step]]\nkind = \"download\"\nurl = \"ftp://x\"\ndest = \"/tmp/x\"\n",
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl { .. })
        ));

        let git = Config::parse(
            "[[step]]\nkind = \"git\"\nurl = \"git@github.com:a/b.git\"\ndest = \"/opt/b\"\n",
        )
        .unwrap();
        git.validate().unwrap();
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("0644"), Some(0o644));
        assert_eq!(parse_mode("755"), Some(0o755));
        assert_eq!(parse_mode("0o600"), Some(0o600));
        assert_eq!(parse_mode("4755"), Some(0o4755));
        assert_eq!(parse_mode("0999"), None);
        assert_eq!(parse_mode("rw-r--r--"), None);
        assert_eq!(parse_mode(""), None);
        assert_eq!(parse_mode("77777"), None);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(&ConfigSource::File("/nonexistent/postinst.toml".into()))
            .unwrap_err();
        assert!(format!("{err:#}").contains("Could not read config file"));
    }

    #[test]
    fn test_load_reports_validation_source() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[[step]]\nkind = \"directory\"\npath = \"rel\"\n").unwrap();

        let err = Config::load(&ConfigSource::File(path.clone())).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains(&path.display().to_string()), "{msg}");
        assert!(msg.contains("not an absolute path"), "{msg}");
    }
}
