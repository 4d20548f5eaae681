//! Local file discovery for backup passes.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::filter::ExclusionRules;
use crate::logger::BackupLogger;

/// Collect every regular file under `targets`, minus excluded names.
///
/// Directories are walked recursively in file-name order; a target that is
/// a regular file is taken as is. Only regular files are returned. Inaccessible targets and unreadable entries are
/// reported through `logger` and skipped.
pub fn discover_files(
    targets: &[PathBuf],
    rules: &ExclusionRules,
    logger: &dyn BackupLogger,
) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for target in targets {
        let metadata = match std::fs::metadata(target) {
            Ok(m) => m,
            Err(e) => {
                logger.warning(format_args!(
                    "Cannot access path {}: {}",
                    target.display(),
                    e
                ));
                continue;
            }
        };

        if metadata.is_dir() {
            walk_directory(target, rules, logger, &mut files);
        } else if !metadata.is_file() {
            logger.warning(format_args!(
                "Skipping {}: not a regular file",
                target.display()
            ));
        } else if !rules.is_excluded(target) {
            files.push(target.clone());
        }
    }

    files
}

fn walk_directory(
    root: &Path,
    rules: &ExclusionRules,
    logger: &dyn BackupLogger,
    files: &mut Vec<PathBuf>,
) {
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                logger.warning(format_args!("Cannot scan {}: {}", root.display(), e));
                continue;
            }
        };

        // Regular files only; symlinks are not followed
        if !entry.file_type().is_file() {
            continue;
        }
        if rules.is_excluded(entry.path()) {
            continue;
        }
        files.push(entry.into_path());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::testing::CapturingLogger;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_walks_directories_recursively_in_order() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("b.txt"));
        touch(&temp.path().join("a.txt"));
        touch(&temp.path().join("sub/c.txt"));
        fs::create_dir_all(temp.path().join("empty")).unwrap();
        let logger = CapturingLogger::default();

        let files = discover_files(
            &[temp.path().to_path_buf()],
            &ExclusionRules::default(),
            &logger,
        );

        assert_eq!(
            files,
            vec![
                temp.path().join("a.txt"),
                temp.path().join("b.txt"),
                temp.path().join("sub/c.txt"),
            ]
        );
    }

    #[test]
    fn test_single_file_target() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("single.db");
        touch(&file);
        let logger = CapturingLogger::default();

        let files = discover_files(&[file.clone()], &ExclusionRules::default(), &logger);

        assert_eq!(files, vec![file]);
    }

    #[test]
    fn test_excluded_names_are_dropped() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("a.txt"));
        touch(&temp.path().join("b.tmp"));
        let excluded_file = temp.path().join("c.tmp");
        touch(&excluded_file);
        let logger = CapturingLogger::default();

        let files = discover_files(
            &[temp.path().to_path_buf(), excluded_file],
            &ExclusionRules::new(&["*.tmp"]),
            &logger,
        );

        assert_eq!(files, vec![temp.path().join("a.txt")]);
    }

    #[cfg(unix)]
    fn make_fifo(path: &Path) {
        let status = std::process::Command::new("mkfifo")
            .arg(path)
            .status()
            .unwrap();
        assert!(status.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_special_files_are_skipped() {
        use std::os::unix::fs::symlink;
        use std::os::unix::net::UnixListener;

        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("data/a.txt"));
        touch(&temp.path().join("elsewhere/b.txt"));
        make_fifo(&temp.path().join("data/pipe"));
        let _socket = UnixListener::bind(temp.path().join("data/sock")).unwrap();
        symlink(temp.path().join("elsewhere"), temp.path().join("data/linked")).unwrap();
        let logger = CapturingLogger::default();

        let files = discover_files(
            &[temp.path().join("data")],
            &ExclusionRules::default(),
            &logger,
        );

        assert_eq!(files, vec![temp.path().join("data/a.txt")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_special_file_target_is_skipped_with_warning() {
        let temp = TempDir::new().unwrap();
        let fifo = temp.path().join("pipe");
        make_fifo(&fifo);
        let logger = CapturingLogger::default();

        let files = discover_files(&[fifo], &ExclusionRules::default(), &logger);

        assert!(files.is_empty());
        let warnings = logger.messages("warning");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("not a regular file"));
    }

    #[test]
    fn test_missing_target_does_not_block_others() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("present/a.txt"));
        let logger = CapturingLogger::default();

        let files = discover_files(
            &[
                temp.path().join("missing"),
                temp.path().join("present"),
            ],
            &ExclusionRules::default(),
            &logger,
        );

        assert_eq!(files, vec![temp.path().join("present/a.txt")]);
        let warnings = logger.messages("warning");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("missing"));
    }
}
