//! Building the unit index from source directories.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ccflow_common::ContentHash;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::discover::discover_source_files;
use crate::language::HdlLanguage;
use crate::lexer::tokenize;
use crate::scan::{scan, FileScan, ScannedBody};
use crate::unit::{DesignUnit, UnitRole};
use crate::warning::{ParseWarning, ParseWarningKind};

/// One indexed HDL file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path of the file.
    pub path: PathBuf,
    /// Language inferred from the extension.
    pub language: HdlLanguage,
    /// Content hash at indexing time.
    pub hash: ContentHash,
    /// Units declared in this file, in declaration order.
    pub units: Vec<String>,
}

/// The set of design units found in a project, plus the files they came from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIndex {
    /// Units keyed by name.
    pub units: BTreeMap<String, DesignUnit>,
    /// Every HDL file seen, keyed by path, including files without units.
    pub files: BTreeMap<PathBuf, SourceFile>,
}

/// Result of comparing two index snapshots file by file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Files that were not in the previous snapshot.
    pub new_files: Vec<PathBuf>,
    /// Files whose content hash changed.
    pub modified_files: Vec<PathBuf>,
    /// Files that disappeared.
    pub deleted_files: Vec<PathBuf>,
}

impl ChangeSet {
    /// Returns `true` if nothing was added, modified, or deleted.
    pub fn is_empty(&self) -> bool {
        self.new_files.is_empty() && self.modified_files.is_empty() && self.deleted_files.is_empty()
    }

    /// Every changed path, sorted.
    pub fn all(&self) -> Vec<&Path> {
        let mut all: Vec<&Path> = self
            .new_files
            .iter()
            .chain(&self.modified_files)
            .chain(&self.deleted_files)
            .map(PathBuf::as_path)
            .collect();
        all.sort();
        all
    }
}

impl SourceIndex {
    /// Looks up a unit by exact name.
    pub fn get(&self, name: &str) -> Option<&DesignUnit> {
        self.units.get(name)
    }

    /// Resolves an instantiation reference; see [`resolve_reference`].
    pub fn resolve(&self, reference: &str) -> Option<&DesignUnit> {
        resolve_reference(&self.units, reference)
    }

    /// Compares this snapshot against an earlier one.
    pub fn detect_changes(&self, previous: &SourceIndex) -> ChangeSet {
        let mut changes = ChangeSet::default();
        for (path, file) in &self.files {
            match previous.files.get(path) {
                Some(old) if old.hash == file.hash => {}
                Some(_) => changes.modified_files.push(path.clone()),
                None => changes.new_files.push(path.clone()),
            }
        }
        changes.deleted_files = previous
            .files
            .keys()
            .filter(|p| !self.files.contains_key(*p))
            .cloned()
            .collect();
        changes
    }

    /// Content hash of a file, if indexed.
    pub fn file_hash(&self, path: &Path) -> Option<ContentHash> {
        self.files.get(path).map(|f| f.hash)
    }
}

/// Resolves an instantiation reference against a unit set.
///
/// Exact matches win. Otherwise a case-insensitive match against a VHDL
/// unit is accepted, which covers Verilog instantiating a VHDL entity.
pub fn resolve_reference<'a>(
    units: &'a BTreeMap<String, DesignUnit>,
    reference: &str,
) -> Option<&'a DesignUnit> {
    if let Some(unit) = units.get(reference) {
        return Some(unit);
    }
    units
        .get(&reference.to_ascii_lowercase())
        .filter(|u| u.language.folds_case())
}

/// Index output: the new snapshot and every non-fatal problem encountered.
#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    /// The unit set.
    pub index: SourceIndex,
    /// Problems that did not stop indexing.
    pub warnings: Vec<ParseWarning>,
}

struct ScannedFile {
    path: PathBuf,
    language: HdlLanguage,
    hash: ContentHash,
    scan: FileScan,
}

fn scan_file(path: &Path, language: HdlLanguage) -> Result<ScannedFile, ParseWarning> {
    let bytes = std::fs::read(path)
        .map_err(|e| ParseWarning::new(path, None, ParseWarningKind::Unreadable(e.to_string())))?;
    let text = String::from_utf8_lossy(&bytes);
    let tokens = tokenize(&text, language);
    Ok(ScannedFile {
        path: path.to_path_buf(),
        language,
        hash: ContentHash::from_bytes(&bytes),
        scan: scan(&tokens, language),
    })
}

/// Scans every HDL file under `dirs` and builds a fresh [`SourceIndex`].
///
/// Files are read and scanned in parallel; results are merged in sorted path
/// order so the earliest file wins when two declare the same unit. Indexing
/// never fails as a whole: unreadable or unrecognisable files become
/// warnings and are otherwise skipped.
pub fn index(dirs: &[PathBuf]) -> IndexReport {
    let (files, mut warnings) = discover_source_files(dirs);

    let scanned: Vec<Result<ScannedFile, ParseWarning>> = files
        .par_iter()
        .map(|(path, language)| scan_file(path, *language))
        .collect();

    let mut index = SourceIndex::default();
    let mut bodies: Vec<(PathBuf, ScannedBody)> = Vec::new();

    for result in scanned {
        let file = match result {
            Ok(file) => file,
            Err(warning) => {
                warnings.push(warning);
                continue;
            }
        };

        for (line, what) in &file.scan.problems {
            warnings.push(ParseWarning::new(
                &file.path,
                Some(*line),
                ParseWarningKind::Malformed(what.clone()),
            ));
        }
        if file.scan.is_empty() && file.scan.problems.is_empty() {
            warnings.push(ParseWarning::new(&file.path, None, ParseWarningKind::NoDeclarations));
        }

        let mut declared = Vec::new();
        for unit in file.scan.units {
            if let Some(existing) = index.units.get(&unit.name) {
                warnings.push(ParseWarning::new(
                    &file.path,
                    Some(unit.line),
                    ParseWarningKind::DuplicateUnit {
                        name: unit.name.clone(),
                        first: existing.path.clone(),
                    },
                ));
                continue;
            }
            declared.push(unit.name.clone());
            index.units.insert(
                unit.name.clone(),
                DesignUnit {
                    role: UnitRole::classify(&unit.name, &file.path),
                    name: unit.name,
                    path: file.path.clone(),
                    line: unit.line,
                    language: file.language,
                    implementations: Vec::new(),
                    references: unit.references,
                    body_files: Default::default(),
                },
            );
        }
        bodies.extend(file.scan.bodies.into_iter().map(|b| (file.path.clone(), b)));

        index.files.insert(
            file.path.clone(),
            SourceFile {
                path: file.path,
                language: file.language,
                hash: file.hash,
                units: declared,
            },
        );
    }

    for (path, body) in bodies {
        match index.units.get_mut(&body.entity) {
            Some(unit) => {
                if !unit.implementations.contains(&body.name) {
                    unit.implementations.push(body.name);
                }
                unit.references.extend(body.references);
                unit.body_files.insert(path);
            }
            None => warnings.push(ParseWarning::new(
                &path,
                Some(body.line),
                ParseWarningKind::OrphanArchitecture {
                    architecture: body.name,
                    entity: body.entity,
                },
            )),
        }
    }

    log::debug!(
        "indexed {} file(s), {} unit(s), {} warning(s)",
        index.files.len(),
        index.units.len(),
        warnings.len()
    );

    IndexReport { index, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, text: &str) -> PathBuf {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn indexes_mixed_project() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let tb = dir.path().join("testbench");
        write(&src, "alu.vhd", "entity alu is end;\narchitecture rtl of alu is begin end;");
        write(
            &src,
            "top.vhd",
            "entity top is end;\narchitecture rtl of top is begin u : entity work.alu port map (a => b); end;",
        );
        write(&tb, "top_tb.v", "module top_tb; top dut (); endmodule");

        let report = index(&[src, tb]);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        let idx = report.index;
        assert_eq!(idx.units.len(), 3);
        assert_eq!(idx.files.len(), 3);

        let top = idx.get("top").unwrap();
        assert_eq!(top.implementations, vec!["rtl".to_string()]);
        assert!(top.references.contains("alu"));
        assert!(!top.is_testbench());

        let tb_unit = idx.get("top_tb").unwrap();
        assert!(tb_unit.is_testbench());
        assert_eq!(tb_unit.language, HdlLanguage::Verilog);
    }

    #[test]
    fn architecture_in_separate_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a_ent.vhd", "entity a is end;");
        let body = write(
            dir.path(),
            "a_rtl.vhd",
            "architecture rtl of a is begin u : b port map (x); end;",
        );

        let report = index(&[dir.path().to_path_buf()]);
        let a = report.index.get("a").unwrap();
        assert!(a.references.contains("b"));
        assert!(a.body_files.contains(&body));
        assert_eq!(a.files().len(), 2);
    }

    #[test]
    fn unrecognised_file_warns_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "empty.vhd", "-- only a comment\n");
        write(dir.path(), "ok.v", "module ok; endmodule");

        let report = index(&[dir.path().to_path_buf()]);
        assert_eq!(report.index.units.len(), 1);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, ParseWarningKind::NoDeclarations);
        assert!(report.index.files.contains_key(&dir.path().join("empty.vhd")));
    }

    #[test]
    fn duplicate_unit_keeps_first_path() {
        let dir = tempfile::tempdir().unwrap();
        let first = write(dir.path(), "a.v", "module dup; endmodule");
        write(dir.path(), "b.v", "module dup; endmodule");

        let report = index(&[dir.path().to_path_buf()]);
        assert_eq!(report.index.get("dup").unwrap().path, first);
        assert!(matches!(
            report.warnings[0].kind,
            ParseWarningKind::DuplicateUnit { .. }
        ));
    }

    #[test]
    fn orphan_architecture_warns() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "x.vhd", "architecture rtl of ghost is begin end;");
        let report = index(&[dir.path().to_path_buf()]);
        assert!(report.index.units.is_empty());
        assert!(matches!(
            report.warnings[0].kind,
            ParseWarningKind::OrphanArchitecture { .. }
        ));
    }

    #[test]
    fn reindex_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.vhd", "entity a is end;");
        let dirs = [dir.path().to_path_buf()];
        assert_eq!(index(&dirs).index, index(&dirs).index);
    }

    #[test]
    fn reindex_replaces_units() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.vhd", "entity a is end;");
        let dirs = [dir.path().to_path_buf()];
        let before = index(&dirs).index;
        std::fs::write(&path, "entity renamed is end;").unwrap();
        let after = index(&dirs).index;
        assert!(after.get("a").is_none());
        assert!(after.get("renamed").is_some());

        let changes = after.detect_changes(&before);
        assert_eq!(changes.modified_files, vec![path]);
        assert!(changes.new_files.is_empty());
    }

    #[test]
    fn detect_new_and_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let old = write(dir.path(), "old.v", "module old_m; endmodule");
        let dirs = [dir.path().to_path_buf()];
        let before = index(&dirs).index;
        std::fs::remove_file(&old).unwrap();
        let new = write(dir.path(), "new.v", "module new_m; endmodule");
        let after = index(&dirs).index;

        let changes = after.detect_changes(&before);
        assert_eq!(changes.new_files, vec![new]);
        assert_eq!(changes.deleted_files, vec![old]);
        assert_eq!(changes.all().len(), 2);
        assert!(after.detect_changes(&after).is_empty());
    }

    #[test]
    fn resolve_is_case_insensitive_for_vhdl_only() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.vhd", "entity fifo is end;");
        write(dir.path(), "b.v", "module Ram; endmodule");
        let idx = index(&[dir.path().to_path_buf()]).index;
        assert!(idx.resolve("FIFO").is_some());
        assert!(idx.resolve("Ram").is_some());
        assert!(idx.resolve("ram").is_none());
    }
}
