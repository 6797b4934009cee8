//! Target user resolution
//!
//! postinst normally runs under `sudo`, but per-user files (shell rc files,
//! `~/.tmux.conf`, `~/go`) belong to whoever invoked it. The target user is
//! resolved from the privilege-escalation context, in this order:
//!
//! 1. `SUDO_USER`
//! 2. `DOAS_USER`
//! 3. `PKEXEC_UID`
//! 4. The effective uid of this process
//!
//! Names and uids are looked up in `/etc/passwd`. If the lookup fails the
//! process's own home directory is used.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// The user whose home directory per-user steps write into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUser {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
}

/// One line of /etc/passwd
#[derive(Debug, Clone, PartialEq, Eq)]
struct PasswdEntry {
    name: String,
    uid: u32,
    gid: u32,
    home: PathBuf,
}

impl TargetUser {
    /// Resolve the target user for this process
    pub fn resolve() -> Result<Self> {
        let passwd = fs::read_to_string("/etc/passwd").unwrap_or_else(|e| {
            log::debug!("Could not read /etc/passwd: {e}");
            String::new()
        });

        if let Some(user) = resolve_with(|k| std::env::var(k).ok(), &passwd, effective_uid()) {
            log::debug!("Target user: {} ({})", user.name, user.home.display());
            return Ok(user);
        }

        // Last resort: trust the environment
        let home = dirs::home_dir().context("Could not determine home directory")?;
        let name = std::env::var("USER").unwrap_or_else(|_| effective_uid().to_string());
        log::debug!("Target user from environment: {name} ({})", home.display());
        Ok(Self {
            name,
            uid: effective_uid(),
            gid: effective_gid(),
            home,
        })
    }

    /// Go workspace for this user
    pub fn gopath(&self) -> PathBuf {
        self.home.join("go")
    }

    /// Whether a path lives inside this user's home directory
    pub fn owns(&self, path: &Path) -> bool {
        path.starts_with(&self.home)
    }

    /// Whether files we create for this user must be chowned to them
    pub fn needs_chown(&self) -> bool {
        is_root() && self.uid != 0
    }
}

/// Resolve the target user from an environment lookup and passwd contents
fn resolve_with<F>(env: F, passwd: &str, euid: u32) -> Option<TargetUser>
where
    F: Fn(&str) -> Option<String>,
{
    let entries = parse_passwd(passwd);
    let by_name = |name: &str| entries.iter().find(|e| e.name == name);
    let by_uid = |uid: u32| entries.iter().find(|e| e.uid == uid);

    let entry = env("SUDO_USER")
        .filter(|n| !n.is_empty())
        .and_then(|n| by_name(&n))
        .or_else(|| {
            env("DOAS_USER")
                .filter(|n| !n.is_empty())
                .and_then(|n| by_name(&n))
        })
        .or_else(|| {
            env("PKEXEC_UID")
                .and_then(|u| u.parse().ok())
                .and_then(by_uid)
        })
        .or_else(|| by_uid(euid))?;

    Some(TargetUser {
        name: entry.name.clone(),
        uid: entry.uid,
        gid: entry.gid,
        home: entry.home.clone(),
    })
}

/// Parse /etc/passwd, skipping malformed lines
fn parse_passwd(contents: &str) -> Vec<PasswdEntry> {
    contents
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 7 {
                return None;
            }
            Some(PasswdEntry {
                name: fields[0].to_string(),
                uid: fields[2].parse().ok()?,
                gid: fields[3].parse().ok()?,
                home: PathBuf::from(fields[5]),
            })
        })
        .collect()
}

/// Effective uid of this process
pub fn effective_uid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() }
}

fn effective_gid() -> u32 {
    // SAFETY: getegid has no preconditions and cannot fail
    unsafe { libc::getegid() }
}

/// Whether this process runs as root
pub fn is_root() -> bool {
    effective_uid() == 0
}
