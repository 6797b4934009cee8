//! Step implementations for postinst
//!
//! Every action postinst can take is modeled as a `planned::Step` with:
//! - A read-only check (is the system already in the desired state?)
//! - An apply function (make it so)
//! - A privilege level (derived from where the step writes)

use anyhow::{Context, Result};
use planned::Privilege;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::user::TargetUser;

pub mod apt;
pub mod directory;
pub mod download;
pub mod env;
pub mod exec;
pub mod file;
pub mod git;
pub mod go;
pub mod service;

pub use apt::{AptPackage, AptUpdate};
pub use directory::Directory;
pub use download::Download;
pub use env::EnvExport;
pub use exec::Exec;
pub use file::ConfigFile;
pub use git::GitClone;
pub use go::GoInstall;
pub use service::ServiceRestart;

/// Who ends up owning what a step writes
///
/// Paths inside the target user's home belong to that user; everything
/// else stays root's.
#[derive(Debug, Clone)]
pub struct Ownership {
    user: Option<TargetUser>,
}

impl Ownership {
    pub fn for_path(path: &Path, user: &TargetUser) -> Self {
        Self {
            user: user.owns(path).then(|| user.clone()),
        }
    }

    /// Root keeps whatever gets written
    pub const fn system() -> Self {
        Self { user: None }
    }

    pub fn privilege(&self) -> Privilege {
        if self.user.is_some() {
            Privilege::User
        } else {
            Privilege::System
        }
    }

    pub fn user(&self) -> Option<&TargetUser> {
        self.user.as_ref()
    }

    /// Hand a freshly written path over to the target user
    pub fn apply(&self, path: &Path) -> Result<()> {
        if let Some(user) = &self.user
            && user.needs_chown()
        {
            chown(path, user)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn chown(path: &Path, user: &TargetUser) -> Result<()> {
    std::os::unix::fs::chown(path, Some(user.uid), Some(user.gid))
        .with_context(|| format!("Failed to chown {} to {}", path.display(), user.name))
}

#[cfg(not(unix))]
fn chown(_path: &Path, _user: &TargetUser) -> Result<()> {
    Ok(())
}

/// Create a directory and any missing parents
///
/// Only the components this call creates are handed to the owner.
pub fn create_dirs(path: &Path, owner: &Ownership) -> Result<()> {
    let mut missing: Vec<PathBuf> = Vec::new();
    let mut current = Some(path);
    while let Some(p) = current {
        if p.exists() {
            break;
        }
        missing.push(p.to_path_buf());
        current = p.parent();
    }

    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))?;

    for dir in missing.iter().rev() {
        owner.apply(dir)?;
    }
    Ok(())
}

/// Write a file through a temporary sibling and rename it into place
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .with_context(|| format!("Not a file path: {}", path.display()))?;
    let tmp = path.with_file_name(format!(".{}.postinst-tmp", file_name.to_string_lossy()));

    let mut file = fs::File::create(&tmp)
        .with_context(|| format!("Failed to create {}", tmp.display()))?;
    // A rewrite keeps the permissions of the file it replaces
    let written = match fs::metadata(path) {
        Ok(existing) => file.set_permissions(existing.permissions()),
        Err(_) => Ok(()),
    }
    .and_then(|()| file.write_all(contents))
    .and_then(|()| file.sync_all());
    drop(file);
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Failed to write {}", tmp.display()));
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Failed to move {} into place", path.display()));
    }
    Ok(())
}

/// Set permission bits on a path
#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("Failed to chmod {:o} {}", mode, path.display()))
}

#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Permission bits of a path, if it exists
#[cfg(unix)]
pub fn current_mode(path: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path).ok().map(|m| m.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
pub fn current_mode(_path: &Path) -> Option<u32> {
    None
}

/// Last modification time of a path, if it exists
pub fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
