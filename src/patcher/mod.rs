//! The archive patch pipeline.
//!
//! [`ApkPatcher`] drives the whole run for one archive: backup, bytecode
//! entry selection, signature pre-filter, in-memory patching with checksum
//! repair, aligned rebuild, and raw-bytes verification. The discipline is
//! all-or-nothing at the archive level:
//!
//! - a `.bak` copy is created once, before the first mutation, and never
//!   overwritten;
//! - nothing on disk changes until every targeted container has been patched
//!   in memory;
//! - per-entry failures are logged and that entry's original bytes ride
//!   along unchanged — one bad container does not abort the archive pass;
//! - any archive-level failure (rebuild, write, verify) restores the backup,
//!   leaving the file byte-identical to its pre-patch state.
//!
//! "Nothing matched" is a warning, not an error: the same profile is run
//! against every partition of a ROM, and most archives simply do not contain
//! the target pattern.

pub mod profile;

pub use profile::{PatchOp, PatchProfile, ProfileRegistry};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::{
    archive::{
        dex_sort_key, is_dex_name, read_entries, rebuild, verify_file, RebuildStats, Violation,
        ALIGNMENT,
    },
    dex::patch::DexPatcher,
    error::ArchiveError,
    Result,
};

/// Outcome of one archive patch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchSummary {
    /// Bytecode containers that were modified and re-injected
    pub entries_patched: usize,
    /// Total instruction sites changed across all containers
    pub sites_changed: usize,
}

impl PatchSummary {
    /// Whether the run changed anything at all.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.entries_patched == 0
    }
}

/// Drives the patch pipeline for APK and JAR archives.
#[derive(Debug, Clone)]
pub struct ApkPatcher {
    alignment: u64,
}

impl Default for ApkPatcher {
    fn default() -> Self {
        ApkPatcher {
            alignment: ALIGNMENT,
        }
    }
}

impl ApkPatcher {
    /// A patcher using the runtime-mandated 4-byte alignment.
    #[must_use]
    pub fn new() -> ApkPatcher {
        ApkPatcher::default()
    }

    /// A patcher with a custom alignment unit.
    #[must_use]
    pub fn with_alignment(alignment: u64) -> ApkPatcher {
        ApkPatcher { alignment }
    }

    /// Run `profile` against every bytecode container in the archive at
    /// `path`.
    ///
    /// Returns a no-op summary (and leaves the archive untouched) when no
    /// container matches the profile's signatures or no operation changed a
    /// site — absence of the target pattern is normal, not a failure.
    ///
    /// # Errors
    /// Archive-level failures only: unreadable archive, rebuild or write
    /// failure, or post-rebuild verification failure. In the latter cases the
    /// backup has already been restored.
    pub fn patch(&self, path: &Path, profile: &PatchProfile) -> Result<PatchSummary> {
        let entries = read_entries(path).map_err(crate::Error::Archive)?;
        info!(
            "{}: {} entries, profile '{}'",
            path.display(),
            entries.len(),
            profile.name
        );

        let mut dex_names: Vec<&str> = entries
            .iter()
            .map(|e| e.name.as_str())
            .filter(|name| is_dex_name(name))
            .collect();
        dex_names.sort_by_key(|name| dex_sort_key(name));

        // Patch containers in memory first; the archive is not touched yet
        let mut replacements: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        let mut sites_changed = 0;

        for name in dex_names {
            let entry = entries
                .iter()
                .find(|e| e.name == name)
                .ok_or_else(|| ArchiveError::Zip(zip::result::ZipError::FileNotFound))?;

            if !profile.matches(&entry.data) {
                info!("{name}: no signature match, skipping");
                continue;
            }

            match Self::patch_container(entry.data.clone(), profile) {
                Ok(Some((patched, changed))) => {
                    info!("{name}: {changed} site(s) patched");
                    replacements.insert(name.to_string(), patched);
                    sites_changed += changed;
                }
                Ok(None) => {
                    info!("{name}: no patch sites found");
                }
                Err(err) => {
                    // Contain the failure: this entry keeps its original
                    // bytes, the rest of the archive is still processed
                    error!("{name}: patch failed, entry left untouched: {err}");
                }
            }
        }

        if replacements.is_empty() {
            warn!(
                "profile '{}': nothing matched in {} — archive left untouched",
                profile.name,
                path.display()
            );
            return Ok(PatchSummary {
                entries_patched: 0,
                sites_changed: 0,
            });
        }

        self.backup(path)?;

        let entries_patched = replacements.len();
        let mut rebuilt_entries = entries;
        for entry in &mut rebuilt_entries {
            if let Some(patched) = replacements.remove(&entry.name) {
                entry.data = patched;
            }
        }

        if let Err(err) = self.rewrite_archive(path, &rebuilt_entries) {
            error!("{}: rebuild failed, restoring backup: {err}", path.display());
            self.restore(path)?;
            return Err(err);
        }

        let violations = verify_file(path, self.alignment).map_err(crate::Error::Archive)?;
        if !violations.is_empty() {
            for violation in &violations {
                error!("verify: {violation}");
            }
            error!("{}: verification failed, restoring backup", path.display());
            self.restore(path)?;
            return Err(ArchiveError::VerifyFailed {
                violations: violations.len(),
            }
            .into());
        }

        info!(
            "{}: {} container(s) patched, {} site(s), archive verified",
            path.display(),
            entries_patched,
            sites_changed
        );
        Ok(PatchSummary {
            entries_patched,
            sites_changed,
        })
    }

    /// Rebuild the archive at `path` for compression and alignment only,
    /// with no bytecode changes.
    ///
    /// # Errors
    /// As [`ApkPatcher::patch`]'s archive-level failures; the backup is
    /// restored before returning an error.
    pub fn fix(&self, path: &Path) -> Result<RebuildStats> {
        let entries = read_entries(path).map_err(crate::Error::Archive)?;
        self.backup(path)?;

        let stats = match self.rewrite_archive(path, &entries) {
            Ok(stats) => stats,
            Err(err) => {
                error!("{}: rebuild failed, restoring backup: {err}", path.display());
                self.restore(path)?;
                return Err(err);
            }
        };

        let violations = verify_file(path, self.alignment).map_err(crate::Error::Archive)?;
        if !violations.is_empty() {
            error!("{}: verification failed, restoring backup", path.display());
            self.restore(path)?;
            return Err(ArchiveError::VerifyFailed {
                violations: violations.len(),
            }
            .into());
        }

        info!(
            "{}: aligned {} entr(ies), {} already aligned",
            path.display(),
            stats.aligned.len(),
            stats.kept.len()
        );
        Ok(stats)
    }

    /// Audit the archive at `path` without modifying it.
    ///
    /// # Errors
    /// [`ArchiveError`] if the archive cannot be parsed.
    pub fn verify(&self, path: &Path) -> Result<Vec<Violation>> {
        verify_file(path, self.alignment).map_err(crate::Error::Archive)
    }

    /// Patch one container in memory. `Ok(None)` means zero sites changed.
    fn patch_container(
        data: Vec<u8>,
        profile: &PatchProfile,
    ) -> Result<Option<(Vec<u8>, usize)>> {
        let mut patcher = DexPatcher::new(data)?;
        let changed = profile.apply(&mut patcher)?;
        if changed == 0 {
            return Ok(None);
        }
        let patched = patcher.finish()?;
        Ok(Some((patched, changed)))
    }

    /// Serialize `entries` and atomically replace the file at `path`.
    fn rewrite_archive(
        &self,
        path: &Path,
        entries: &[crate::archive::ArchiveEntry],
    ) -> Result<RebuildStats> {
        let (bytes, stats) = rebuild(entries, self.alignment).map_err(crate::Error::Archive)?;

        let tmp = sibling_path(path, ".rebuild_tmp");
        std::fs::write(&tmp, &bytes)?;
        if let Err(err) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(stats)
    }

    /// Create the `.bak` sibling once; an existing backup is never
    /// overwritten, so repeated runs always keep the original bytes.
    fn backup(&self, path: &Path) -> Result<PathBuf> {
        let bak = sibling_path(path, ".bak");
        if !bak.exists() {
            std::fs::copy(path, &bak)?;
            info!("backup created: {}", bak.display());
        }
        Ok(bak)
    }

    /// Restore the archive from its `.bak` sibling.
    fn restore(&self, path: &Path) -> Result<()> {
        let bak = sibling_path(path, ".bak");
        if bak.exists() {
            std::fs::copy(&bak, path)?;
            warn!("restored from backup: {}", path.display());
        }
        Ok(())
    }
}

/// `path` with `suffix` appended to its file name.
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(Default::default, |n| n.to_os_string());
    name.push(suffix);
    path.with_file_name(name)
}
