use anyhow::{Context, Result, bail};
use planned::{ApplyContext, Privilege, Step};
use std::path::PathBuf;

use super::{Ownership, create_dirs, set_mode, write_atomic};

/// Maximum accepted response body (64 MiB)
const MAX_DOWNLOAD_SIZE: u64 = 64 * 1024 * 1024;

/// A file fetched over HTTP(S)
///
/// Satisfied once the destination exists; postinst never re-downloads.
#[derive(Debug, Clone)]
pub struct Download {
    pub url: String,
    pub dest: PathBuf,
    pub label: String,
    pub mode: Option<u32>,
    pub owner: Ownership,
}

/// Fetch a URL into memory
fn fetch(url: &str) -> Result<Vec<u8>> {
    let agent = ureq::Agent::new_with_defaults();

    let mut response = agent
        .get(url)
        .header("User-Agent", concat!("postinst/", env!("CARGO_PKG_VERSION")))
        .call()
        .with_context(|| format!("Failed to download {url}"))?;

    let bytes = response
        .body_mut()
        .with_config()
        .limit(MAX_DOWNLOAD_SIZE)
        .read_to_vec()
        .context("Failed to read response body")?;

    if bytes.is_empty() {
        bail!("{url} returned an empty body");
    }
    Ok(bytes)
}

impl Step for Download {
    fn name(&self) -> String {
        format!("download:{}", self.label)
    }

    fn kind(&self) -> &'static str {
        "download"
    }

    fn description(&self) -> String {
        format!("Download {}", self.label)
    }

    fn preview(&self) -> String {
        format!("GET {} -> {}", self.url, self.dest.display())
    }

    fn privilege(&self) -> Privilege {
        self.owner.privilege()
    }

    fn check(&self) -> Result<bool> {
        Ok(self.dest.is_file())
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<()> {
        let bytes = fetch(&self.url)?;
        log::debug!("Fetched {} bytes from {}", bytes.len(), self.url);

        if let Some(parent) = self.dest.parent() {
            create_dirs(parent, &self.owner)?;
        }
        write_atomic(&self.dest, &bytes)?;
        if let Some(mode) = self.mode {
            set_mode(&self.dest, mode)?;
        }
        self.owner.apply(&self.dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn download(dest: PathBuf) -> Download {
        Download {
            url: "https://download.sublimetext.com/sublimehq-pub.gpg".to_string(),
            label: dest.display().to_string(),
            dest,
            mode: Some(0o644),
            owner: Ownership::system(),
        }
    }

    #[test]
    fn test_existing_destination_is_satisfied() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dest = tmp.path().join("sublimehq-archive.asc");
        let step = download(dest.clone());

        assert!(!step.check().unwrap());
        fs::write(&dest, "-----BEGIN PGP PUBLIC KEY BLOCK-----\n").unwrap();
        assert!(step.check().unwrap());
    }

    #[test]
    fn test_preview_names_url_and_destination() {
        let step = download(PathBuf::from("/etc/apt/trusted.gpg.d/sublimehq-archive.asc"));
        assert_eq!(
            step.preview(),
            "GET https://download.sublimetext.com/sublimehq-pub.gpg -> /etc/apt/trusted.gpg.d/sublimehq-archive.asc"
        );
        assert_eq!(step.privilege(), Privilege::System);
    }

    #[test]
    fn test_unreachable_url_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut step = download(tmp.path().join("out"));
        step.url = "http://127.0.0.1:9/nothing".to_string();

        assert!(step.apply(&mut ApplyContext::new(false)).is_err());
        assert!(!step.dest.exists());
    }
}
