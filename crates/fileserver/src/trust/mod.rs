//! Trust store construction from a directory of PEM files.
//!
//! # Scan rules
//!
//! 1. Only the direct entries of the trust directory are considered; entries
//!    are processed in file-name order and sub-directories are skipped.
//! 2. Each file is read whole and every `CERTIFICATE` block in it is offered
//!    to the store.
//! 3. A file that cannot be read, or that contributes no certificate, is
//!    logged at `warn` and skipped. Only failure to enumerate the directory
//!    itself is fatal.
//!
//! An empty result is not an error here: the transport built on an empty
//! store rejects every client. Whether that should stop startup is decided by
//! the caller (see `require_trust_anchors`).

pub mod store;

pub use store::{TrustAnchorSummary, TrustStore, TrustStoreBuilder};

use std::fs;
use std::path::{Path, PathBuf};

use common::StartupError;
use tracing::{info, warn};

/// What a single trust-directory file contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaFileStatus {
    /// At least one certificate was added.
    Loaded { certificates: usize },
    /// The file was readable but held no usable certificate.
    NoCertificates,
    /// The file could not be read.
    Unreadable { reason: String },
}

/// Per-file outcome of a trust directory scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaFileReport {
    pub path: PathBuf,
    pub status: CaFileStatus,
}

/// Diagnostics collected while scanning a trust directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustScanReport {
    pub files: Vec<CaFileReport>,
}

impl TrustScanReport {
    /// Files that contributed at least one certificate.
    pub fn loaded(&self) -> impl Iterator<Item = &CaFileReport> {
        self.files
            .iter()
            .filter(|f| matches!(f.status, CaFileStatus::Loaded { .. }))
    }

    /// Files that were warned about and skipped.
    pub fn skipped(&self) -> impl Iterator<Item = &CaFileReport> {
        self.files
            .iter()
            .filter(|f| !matches!(f.status, CaFileStatus::Loaded { .. }))
    }
}

/// Scan `dir` and build a [`TrustStore`] from the PEM files it contains.
///
/// # Errors
///
/// Returns [`StartupError::TrustDirUnreadable`] if the directory cannot be
/// enumerated. Problems with individual files never fail the scan.
pub fn load_dir(dir: &Path) -> Result<(TrustStore, TrustScanReport), StartupError> {
    let unreadable = |source| StartupError::TrustDirUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = fs::read_dir(dir)
        .map_err(unreadable)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(unreadable)?;
    entries.sort_by_key(|e| e.file_name());

    let mut builder = TrustStoreBuilder::new();
    let mut report = TrustScanReport::default();

    for entry in entries {
        let path = entry.path();
        match entry.file_type() {
            Ok(ft) if ft.is_dir() => continue,
            Ok(_) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to stat CA certificate file; skipping");
                report.files.push(CaFileReport {
                    path,
                    status: CaFileStatus::Unreadable {
                        reason: e.to_string(),
                    },
                });
                continue;
            }
        }

        let status = match fs::read(&path) {
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read CA certificate file; skipping");
                CaFileStatus::Unreadable {
                    reason: e.to_string(),
                }
            }
            Ok(pem) => match builder.add_pem(&path, &pem) {
                0 => {
                    warn!(path = %path.display(), "no certificates found; skipping");
                    CaFileStatus::NoCertificates
                }
                certificates => {
                    info!(path = %path.display(), certificates, "added CA certificate");
                    CaFileStatus::Loaded { certificates }
                }
            },
        };
        report.files.push(CaFileReport { path, status });
    }

    Ok((builder.build(), report))
}

/// Apply the empty-store policy.
///
/// An empty store is always logged at `warn`. It is only fatal when
/// `require_anchors` is set; otherwise the server starts and every handshake
/// fails client verification.
pub fn check_anchor_policy(
    store: &TrustStore,
    dir: &Path,
    require_anchors: bool,
) -> Result<(), StartupError> {
    if !store.is_empty() {
        return Ok(());
    }
    if require_anchors {
        return Err(StartupError::NoTrustAnchors {
            path: dir.to_path_buf(),
        });
    }
    warn!(
        trust_dir = %dir.display(),
        "trust store is empty; every client certificate will be rejected"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};

    fn ca_pem(cn: &str) -> String {
        let mut params = CertificateParams::default();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, cn);
        params.distinguished_name = dn;
        let key = KeyPair::generate().unwrap();
        params.self_signed(&key).unwrap().pem()
    }

    fn status_of<'a>(report: &'a TrustScanReport, name: &str) -> &'a CaFileStatus {
        &report
            .files
            .iter()
            .find(|f| f.path.file_name().unwrap() == name)
            .unwrap_or_else(|| panic!("{name} missing from report"))
            .status
    }

    #[test]
    fn valid_files_load_and_invalid_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a-root.pem"), ca_pem("Root A")).unwrap();
        fs::write(dir.path().join("b-junk.txt"), "not a certificate").unwrap();
        fs::write(dir.path().join("c-empty.pem"), "").unwrap();
        fs::write(dir.path().join("d-root.crt"), ca_pem("Root D")).unwrap();
        fs::write(
            dir.path().join("e-key.pem"),
            KeyPair::generate().unwrap().serialize_pem(),
        )
        .unwrap();

        let (store, report) = load_dir(dir.path()).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(report.files.len(), 5);
        assert_eq!(report.loaded().count(), 2);
        assert_eq!(report.skipped().count(), 3);
        assert_eq!(
            status_of(&report, "a-root.pem"),
            &CaFileStatus::Loaded { certificates: 1 }
        );
        assert_eq!(status_of(&report, "b-junk.txt"), &CaFileStatus::NoCertificates);
        assert_eq!(status_of(&report, "c-empty.pem"), &CaFileStatus::NoCertificates);
        assert_eq!(status_of(&report, "e-key.pem"), &CaFileStatus::NoCertificates);
    }

    #[test]
    fn entries_are_scanned_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("zz.pem"), ca_pem("Root Z")).unwrap();
        fs::write(dir.path().join("aa.pem"), ca_pem("Root A")).unwrap();
        fs::write(dir.path().join("mm.pem"), ca_pem("Root M")).unwrap();

        let (store, report) = load_dir(dir.path()).unwrap();
        let names: Vec<_> = report
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["aa.pem", "mm.pem", "zz.pem"]);
        assert!(store.anchors()[0].subject.contains("Root A"));
        assert!(store.anchors()[2].subject.contains("Root Z"));
    }

    #[test]
    fn sub_directories_are_skipped_silently() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("inner.pem"), ca_pem("Inner")).unwrap();

        let (store, report) = load_dir(dir.path()).unwrap();
        assert!(store.is_empty());
        assert!(report.files.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_reported_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing.pem"), dir.path().join("dangling.pem"))
            .unwrap();
        fs::write(dir.path().join("root.pem"), ca_pem("Root")).unwrap();

        let (store, report) = load_dir(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(matches!(
            status_of(&report, "dangling.pem"),
            CaFileStatus::Unreadable { .. }
        ));
    }

    #[test]
    fn empty_directory_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let (store, report) = load_dir(dir.path()).unwrap();
        assert!(store.is_empty());
        assert!(report.files.is_empty());
    }

    #[test]
    fn empty_store_is_fatal_only_when_anchors_are_required() {
        let dir = tempfile::tempdir().unwrap();
        let empty = TrustStore::empty();
        assert!(check_anchor_policy(&empty, dir.path(), false).is_ok());
        assert!(matches!(
            check_anchor_policy(&empty, dir.path(), true),
            Err(StartupError::NoTrustAnchors { .. })
        ));

        fs::write(dir.path().join("root.pem"), ca_pem("Root")).unwrap();
        let (store, _) = load_dir(dir.path()).unwrap();
        assert!(check_anchor_policy(&store, dir.path(), true).is_ok());
    }

    #[test]
    fn missing_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_dir(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, StartupError::TrustDirUnreadable { .. }));
    }
}
