//! GHDL analysis ordering shared by synthesis and the simulations.

use super::{Invocation, StageContext, StagePlan};
use crate::layout::relative_to;
use ccflow_config::ProjectConfig;
use ccflow_process::ProcessOutcome;
use ccflow_source::HdlLanguage;
use ccflow_toolchain::Tool;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A VHDL file to analyze and the earlier files it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AnalysisFile {
    /// Path relative to the project root.
    pub path: PathBuf,
    /// Positions of earlier entries in the same list.
    pub depends_on: Vec<usize>,
}

/// `--std` and `--ieee` flags for every GHDL command.
pub(crate) fn ghdl_flags(config: &ProjectConfig) -> [String; 2] {
    [
        format!("--std={}", config.synthesis.vhdl_standard.ghdl_std()),
        format!("--ieee={}", config.synthesis.ieee_library.ghdl_ieee()),
    ]
}

/// `--workdir=` flag for a library directory.
pub(crate) fn workdir_flag(workdir: &Path) -> String {
    format!("--workdir={}", workdir.display())
}

/// Orders the VHDL files of `units` (given in build order) for analysis.
///
/// Files holding only packages come first, by path, since any unit may use
/// them. Unit files follow in the build-order position of the last unit
/// they declare, a declaration before a separately stored body.
pub(crate) fn analysis_order(ctx: &StageContext<'_>, units: &[String]) -> Vec<AnalysisFile> {
    let mut keys: BTreeMap<&Path, (usize, u8)> = BTreeMap::new();
    let mut owners: BTreeMap<&Path, Vec<&str>> = BTreeMap::new();
    let mut unit_files: BTreeMap<&str, Vec<&Path>> = BTreeMap::new();
    for (pos, name) in units.iter().enumerate() {
        let Some(unit) = ctx.index.get(name) else {
            continue;
        };
        if unit.language != HdlLanguage::Vhdl {
            continue;
        }
        for (i, file) in unit.files().into_iter().enumerate() {
            let key = (pos, u8::from(i > 0));
            let slot = keys.entry(file).or_insert(key);
            *slot = (*slot).max(key);
            owners.entry(file).or_default().push(name.as_str());
            unit_files.entry(name.as_str()).or_default().push(file);
        }
    }

    let bodies: BTreeSet<&Path> = ctx
        .index
        .units
        .values()
        .flat_map(|u| u.body_files.iter().map(PathBuf::as_path))
        .collect();
    let packages: Vec<&Path> = ctx
        .index
        .files
        .values()
        .filter(|f| {
            f.language == HdlLanguage::Vhdl
                && f.units.is_empty()
                && !bodies.contains(f.path.as_path())
        })
        .map(|f| f.path.as_path())
        .collect();

    let mut ordered: Vec<(&Path, (usize, u8))> = keys.into_iter().collect();
    ordered.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

    let mut files: Vec<AnalysisFile> = Vec::new();
    let mut position: BTreeMap<&Path, usize> = BTreeMap::new();
    for (i, path) in packages.iter().enumerate() {
        position.insert(*path, i);
        files.push(AnalysisFile {
            path: relative_to(ctx.root, path),
            depends_on: (0..i).collect(),
        });
    }
    for (path, _) in ordered {
        let here = files.len();
        let mut deps: BTreeSet<usize> = (0..packages.len()).collect();
        for owner in owners.get(path).into_iter().flatten() {
            let needed = ctx
                .graph
                .dependencies(owner)
                .into_iter()
                .chain(std::iter::once(owner.to_string()));
            for dep in needed {
                for file in unit_files.get(dep.as_str()).into_iter().flatten() {
                    if let Some(&at) = position.get(file) {
                        if at < here {
                            deps.insert(at);
                        }
                    }
                }
            }
        }
        position.insert(path, here);
        files.push(AnalysisFile {
            path: relative_to(ctx.root, path),
            depends_on: deps.into_iter().collect(),
        });
    }
    files
}

/// Appends one `ghdl -a` per file and returns the invocation indices.
pub(crate) fn push_analysis(
    plan: &mut StagePlan,
    config: &ProjectConfig,
    files: &[AnalysisFile],
    workdir: &Path,
    timeout: Option<Duration>,
) -> Vec<usize> {
    let mut ids = Vec::with_capacity(files.len());
    for file in files {
        let deps: Vec<usize> = file.depends_on.iter().map(|d| ids[*d]).collect();
        let invocation = Invocation::new(format!("analyze {}", file.path.display()), Tool::Ghdl)
            .arg("-a")
            .args(ghdl_flags(config))
            .arg(workdir_flag(workdir))
            .arg(file.path.display().to_string())
            .after(deps)
            .timeout(timeout);
        ids.push(plan.push(invocation));
    }
    ids
}

/// GHDL reports failed assertions and analysis errors on its output even
/// when some versions still exit zero.
pub(crate) fn classify_ghdl(outcome: &ProcessOutcome) -> Result<(), String> {
    if let Some(code) = outcome.exit_code.filter(|c| *c != 0) {
        return Err(format!("exited with code {code}"));
    }
    if outcome.exit_code.is_none() {
        return Err("terminated by a signal".to_string());
    }
    let reported = outcome.lines.iter().find(|l| {
        let lower = l.text.to_ascii_lowercase();
        lower.contains("assertion error") || lower.contains(":error:")
    });
    match reported {
        Some(line) => Err(format!("reported: {}", line.text.trim())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::test_support::{ctx, graph, index};
    use ccflow_common::ContentHash;
    use ccflow_process::{OutputLine, Stream};
    use ccflow_source::SourceFile;

    fn paths(files: &[AnalysisFile]) -> Vec<String> {
        files.iter().map(|f| f.path.display().to_string()).collect()
    }

    #[test]
    fn dependencies_are_analyzed_first() {
        let index = index(&[("a", &["b", "c"]), ("b", &["c"]), ("c", &[])]);
        let graph = graph(&index);
        let config = ProjectConfig::new("p");
        let ctx = ctx(&config, &index, &graph);
        let files = analysis_order(&ctx, &graph.closure("a"));
        assert_eq!(paths(&files), vec!["src/c.vhd", "src/b.vhd", "src/a.vhd"]);
        assert_eq!(files[0].depends_on, Vec::<usize>::new());
        assert_eq!(files[1].depends_on, vec![0]);
        assert_eq!(files[2].depends_on, vec![0, 1]);
    }

    #[test]
    fn package_files_come_first() {
        let mut index = index(&[("top", &[])]);
        let pkg = PathBuf::from("/proj/src/types_pkg.vhd");
        index.files.insert(
            pkg.clone(),
            SourceFile {
                path: pkg,
                language: HdlLanguage::Vhdl,
                hash: ContentHash::from_bytes(b"pkg"),
                units: Vec::new(),
            },
        );
        let graph = graph(&index);
        let config = ProjectConfig::new("p");
        let ctx = ctx(&config, &index, &graph);
        let files = analysis_order(&ctx, &graph.closure("top"));
        assert_eq!(paths(&files), vec!["src/types_pkg.vhd", "src/top.vhd"]);
        assert_eq!(files[1].depends_on, vec![0]);
    }

    #[test]
    fn analysis_invocations_follow_file_dependencies() {
        let index = index(&[("a", &["b"]), ("b", &[])]);
        let graph = graph(&index);
        let config = ProjectConfig::new("p");
        let ctx = ctx(&config, &index, &graph);
        let files = analysis_order(&ctx, &graph.closure("a"));
        let mut plan = StagePlan::new(ccflow_state::Stage::Synthesis, "a");
        let ids = push_analysis(&mut plan, &config, &files, Path::new("synth/work"), None);
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(
            plan.invocations[1].args,
            vec!["-a", "--std=08", "--ieee=synopsys", "--workdir=synth/work", "src/a.vhd"]
        );
        assert_eq!(plan.invocations[1].depends_on, vec![0]);
    }

    #[test]
    fn assertion_errors_fail_even_with_zero_exit() {
        let outcome = ProcessOutcome {
            exit_code: Some(0),
            lines: vec![OutputLine {
                stream: Stream::Stderr,
                text: "tb.vhd:40:9:@120ns:(assertion error): count mismatch".into(),
            }],
            elapsed: Duration::ZERO,
        };
        assert!(classify_ghdl(&outcome).unwrap_err().contains("count mismatch"));
        let clean = ProcessOutcome {
            exit_code: Some(0),
            lines: Vec::new(),
            elapsed: Duration::ZERO,
        };
        assert!(classify_ghdl(&clean).is_ok());
    }
}
