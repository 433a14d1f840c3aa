//! Build-version stamping.

use std::time::{SystemTime, UNIX_EPOCH};

use semver::Version;

use crate::error::{Error, Result};

/// Whole minutes since the Unix epoch, rounded to the nearest minute.
pub fn minutes_since_epoch() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    ((millis + 30_000) / 60_000) as u64
}

/// `<major.minor.patch>-<minutes>.<commit>` for a manifest version.
///
/// Any prerelease or build metadata on `base` is discarded first, so stamping
/// an already stamped version replaces the stamp.
pub fn derive_version_at(base: &str, minutes: u64, commit: &str) -> Result<String> {
    let parsed = Version::parse(base.trim()).map_err(|e| Error::Version {
        version: base.to_string(),
        message: e.to_string(),
    })?;
    if commit.is_empty() {
        return Err(Error::Version {
            version: base.to_string(),
            message: "no commit hash available to stamp the version".to_string(),
        });
    }
    Ok(format!(
        "{}.{}.{}-{}.{}",
        parsed.major, parsed.minor, parsed.patch, minutes, commit
    ))
}

pub fn derive_version(base: &str, commit: &str) -> Result<String> {
    derive_version_at(base, minutes_since_epoch(), commit)
}
