use std::path::Path;
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::models::{ArtifactRoot, DirectoryEntry, ResolvedTarget};
use crate::request::join_under_root;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("directory is empty")]
    EmptyDirectory,
}

/// Resolve the most recently modified entry of `dir_path` under `root`.
///
/// Files and subdirectories are both candidates. Ties go to the entry that
/// sorts first by name.
pub fn resolve_latest(root: &ArtifactRoot, dir_path: &str) -> Result<ResolvedTarget, ResolveError> {
    let dir = join_under_root(root.path(), dir_path);
    let entries = list_entries(&dir)?;

    let best = pick_latest(&entries).ok_or(ResolveError::EmptyDirectory)?;
    let entry = &entries[best];

    debug!(
        "Resolved latest in {} to {} (modified {})",
        dir.display(),
        entry.name,
        chrono::DateTime::<chrono::Utc>::from(entry.modified_at).to_rfc3339()
    );

    Ok(ResolvedTarget(entry.name.clone()))
}

/// Snapshot the immediate children of `dir`, ordered by name.
///
/// Names that are not valid UTF-8 cannot be addressed by a URL path, so they
/// are skipped with a warning.
pub fn list_entries(dir: &Path) -> std::io::Result<Vec<DirectoryEntry>> {
    let mut entries = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!("Skipping non UTF-8 entry {:?} in {}", raw, dir.display());
                continue;
            }
        };
        // Symlinks are judged by their own timestamp, not the target's.
        let modified_at = entry.metadata()?.modified()?;
        entries.push(DirectoryEntry { name, modified_at });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Index of the first entry holding the greatest modification time.
///
/// Starts from index 0 against an epoch baseline and only moves on a strictly
/// later timestamp, so equal times never displace an earlier entry.
pub fn pick_latest(entries: &[DirectoryEntry]) -> Option<usize> {
    if entries.is_empty() {
        return None;
    }

    let mut best = 0;
    let mut best_time = SystemTime::UNIX_EPOCH;

    for (i, entry) in entries.iter().enumerate() {
        if entry.modified_at > best_time {
            best = i;
            best_time = entry.modified_at;
        }
    }

    Some(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn entry(name: &str, secs: u64) -> DirectoryEntry {
        DirectoryEntry {
            name: name.to_string(),
            modified_at: at(secs),
        }
    }

    fn touch(dir: &Path, name: &str, secs: u64) {
        let path = dir.join(name);
        std::fs::write(&path, name).unwrap();
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(at(secs)).unwrap();
    }

    #[test]
    fn test_pick_latest_first_maximum_wins() {
        let entries = vec![entry("a", 5), entry("b", 9), entry("c", 9), entry("d", 3)];
        assert_eq!(pick_latest(&entries), Some(1));
    }

    #[test]
    fn test_pick_latest_empty() {
        assert_eq!(pick_latest(&[]), None);
    }

    #[test]
    fn test_pick_latest_epoch_timestamps_keep_first() {
        let entries = vec![entry("a", 0), entry("b", 0)];
        assert_eq!(pick_latest(&entries), Some(0));

        let entries = vec![entry("a", 0), entry("b", 1)];
        assert_eq!(pick_latest(&entries), Some(1));
    }

    #[test]
    fn test_resolve_latest_picks_newest_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let builds = temp_dir.path().join("builds");
        std::fs::create_dir(&builds).unwrap();
        touch(&builds, "a.tar.gz", 1_000);
        touch(&builds, "b.tar.gz", 2_000);

        let root = ArtifactRoot::new(temp_dir.path());
        let target = resolve_latest(&root, "/builds").unwrap();
        assert_eq!(target.name(), "b.tar.gz");
    }

    #[test]
    fn test_resolve_latest_ties_go_to_first_by_name() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        touch(temp_dir.path(), "d", 3_000);
        touch(temp_dir.path(), "c", 9_000);
        touch(temp_dir.path(), "b", 9_000);
        touch(temp_dir.path(), "a", 5_000);

        let root = ArtifactRoot::new(temp_dir.path());
        let target = resolve_latest(&root, "").unwrap();
        assert_eq!(target.name(), "b");
    }

    #[test]
    fn test_resolve_latest_considers_directories() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        touch(temp_dir.path(), "old.tar.gz", 1_000);
        std::fs::create_dir(temp_dir.path().join("nightly")).unwrap();

        // A freshly created directory is newer than the backdated file.
        let root = ArtifactRoot::new(temp_dir.path());
        let target = resolve_latest(&root, "/").unwrap();
        assert_eq!(target.name(), "nightly");
    }

    #[test]
    fn test_resolve_latest_empty_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("builds")).unwrap();

        let root = ArtifactRoot::new(temp_dir.path());
        let err = resolve_latest(&root, "/builds").unwrap_err();
        assert!(matches!(err, ResolveError::EmptyDirectory));
    }

    #[test]
    fn test_resolve_latest_missing_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();

        let root = ArtifactRoot::new(temp_dir.path());
        let err = resolve_latest(&root, "/nope").unwrap_err();
        match err {
            ResolveError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected Io error, got {:?}", other),
        }
    }

    // Other platforms refuse to create non UTF-8 names in the first place.
    #[cfg(target_os = "linux")]
    #[test]
    fn test_list_entries_skips_non_utf8_names() {
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = tempfile::TempDir::new().unwrap();
        touch(temp_dir.path(), "ok.tar.gz", 1);
        let raw = std::ffi::OsStr::from_bytes(b"bad\xff.tar.gz");
        let file = std::fs::File::create(temp_dir.path().join(raw)).unwrap();
        file.set_modified(at(9)).unwrap();

        let names: Vec<String> = list_entries(temp_dir.path())
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["ok.tar.gz"]);

        // The newer but unaddressable entry never wins.
        let root = ArtifactRoot::new(temp_dir.path());
        assert_eq!(resolve_latest(&root, "").unwrap().name(), "ok.tar.gz");
    }

    #[test]
    fn test_list_entries_sorted_by_name() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        touch(temp_dir.path(), "zeta", 1);
        touch(temp_dir.path(), "alpha", 2);
        touch(temp_dir.path(), "mid", 3);

        let names: Vec<String> = list_entries(temp_dir.path())
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
