//! Recursive discovery of HDL files under the project's source directories.

use std::path::{Path, PathBuf};

use crate::language::HdlLanguage;
use crate::warning::{ParseWarning, ParseWarningKind};

/// Walks every directory in `dirs` and collects HDL source files.
///
/// The result is sorted by path and deduplicated, so a file reachable from
/// two overlapping roots is indexed once. Directories that are missing or
/// unreadable are reported as warnings rather than aborting the walk.
pub fn discover_source_files(
    dirs: &[PathBuf],
) -> (Vec<(PathBuf, HdlLanguage)>, Vec<ParseWarning>) {
    let mut files = Vec::new();
    let mut warnings = Vec::new();
    for dir in dirs {
        if !dir.is_dir() {
            warnings.push(ParseWarning::new(dir, None, ParseWarningKind::MissingDirectory));
            continue;
        }
        walk_dir(dir, &mut files, &mut warnings);
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    files.dedup_by(|a, b| a.0 == b.0);
    (files, warnings)
}

fn walk_dir(
    dir: &Path,
    files: &mut Vec<(PathBuf, HdlLanguage)>,
    warnings: &mut Vec<ParseWarning>,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warnings.push(ParseWarning::new(
                dir,
                None,
                ParseWarningKind::Unreadable(e.to_string()),
            ));
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk_dir(&path, files, warnings);
        } else if let Some(lang) = HdlLanguage::detect(&path) {
            files.push((path, lang));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_hdl_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.vhd"), "").unwrap();
        std::fs::write(dir.path().join("a.v"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let (files, warnings) = discover_source_files(&[dir.path().to_path_buf()]);
        assert!(warnings.is_empty());
        let names: Vec<_> = files
            .iter()
            .map(|(p, _)| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.v", "b.vhd"]);
    }

    #[test]
    fn recurses_into_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("alu/core")).unwrap();
        std::fs::write(dir.path().join("alu/core/add.sv"), "").unwrap();

        let (files, _) = discover_source_files(&[dir.path().to_path_buf()]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].1, HdlLanguage::SystemVerilog);
    }

    #[test]
    fn overlapping_roots_deduplicate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("rtl")).unwrap();
        std::fs::write(dir.path().join("rtl/top.vhd"), "").unwrap();

        let root = dir.path().to_path_buf();
        let (files, _) = discover_source_files(&[root.clone(), root.join("rtl")]);
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn missing_directory_warns() {
        let dir = tempfile::tempdir().unwrap();
        let (files, warnings) = discover_source_files(&[dir.path().join("nope")]);
        assert!(files.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0].kind, ParseWarningKind::MissingDirectory));
    }
}
