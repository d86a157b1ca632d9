//! Conformance test helpers for ccflow.
//!
//! Builds throwaway GateMate projects on disk and installs stand-in
//! executables for the external toolchain, so the tests under `tests/` can
//! drive real stage runs through the orchestrator without GHDL, Yosys, p_r
//! or openFPGALoader installed.

#![warn(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use ccflow_hierarchy::HierarchyGraph;
use ccflow_pipeline::{PipelineError, Project};
use ccflow_process::Stream;
use ccflow_source::IndexReport;
use ccflow_toolchain::Tool;
use tempfile::TempDir;

/// Name of every fixture project.
pub const PROJECT_NAME: &str = "blinky";

/// A counter leaf unit.
pub const COUNTER_VHD: &str = r#"library ieee;
use ieee.std_logic_1164.all;
use ieee.numeric_std.all;

entity counter is
  port (clk : in std_logic; q : out std_logic_vector(7 downto 0));
end entity;

architecture rtl of counter is
  signal n : unsigned(7 downto 0) := (others => '0');
begin
  process (clk) begin
    if rising_edge(clk) then n <= n + 1; end if;
  end process;
  q <= std_logic_vector(n);
end architecture;
"#;

/// The synthesis top, instantiating [`COUNTER_VHD`].
pub const BLINKY_VHD: &str = r#"library ieee;
use ieee.std_logic_1164.all;

entity blinky is
  port (clk : in std_logic; led : out std_logic);
end entity;

architecture rtl of blinky is
  signal q : std_logic_vector(7 downto 0);
begin
  u_cnt : entity work.counter port map (clk => clk, q => q);
  led <= q(7);
end architecture;
"#;

/// A testbench around [`BLINKY_VHD`].
pub const BLINKY_TB_VHD: &str = r#"library ieee;
use ieee.std_logic_1164.all;

entity blinky_tb is
end entity;

architecture sim of blinky_tb is
  signal clk : std_logic := '0';
  signal led : std_logic;
begin
  clk <= not clk after 5 ns;
  dut : entity work.blinky port map (clk => clk, led => led);
end architecture;
"#;

/// Pin assignments for [`BLINKY_VHD`].
pub const BLINKY_CCF: &str = "Net \"clk\" Loc = \"IO_SB_A8\" | SCHMITT_TRIGGER=true;\n\
                              Net \"led\" Loc = \"IO_EB_B1\";\n";

/// A stand-in tool that writes every output file named on its command line
/// and exits successfully.
///
/// Outputs are recognised by the flag before them (`-o`, `-vlog`,
/// `write_json`, `--timing-report`, `--sdf`) or by `--vcd=`. Each output
/// holds its own path, so repeated runs produce identical content.
pub const FAKE_TOOL: &str = r#"#!/bin/sh
prev=
for word in $*; do
  word="${word%;}"
  case "$prev" in
    -o|-vlog|write_json|--timing-report|--sdf)
      mkdir -p "$(dirname "$word")"
      echo "$word" > "$word"
      ;;
  esac
  case "$word" in
    --vcd=*)
      out="${word#--vcd=}"
      mkdir -p "$(dirname "$out")"
      echo "$out" > "$out"
      ;;
  esac
  prev="$word"
done
echo "$(basename "$0") $1"
"#;

/// A stand-in tool that reports an error and exits with status 1.
pub const FAILING_TOOL: &str = r#"#!/bin/sh
echo "ERROR: fake failure in $(basename "$0")"
exit 1
"#;

/// A stand-in GHDL whose simulation run (`-r`) blocks until killed.
pub const HANGING_SIMULATOR: &str = r#"#!/bin/sh
case "$1" in
  -r) exec sleep 60 ;;
esac
echo "ghdl $1"
"#;

/// A project on disk plus the directory holding its stand-in tools.
pub struct Fixture {
    /// The project directory.
    pub dir: TempDir,
    /// The directory searched for tools instead of `PATH`.
    pub tools: TempDir,
    /// The opened project.
    pub project: Project,
}

impl Fixture {
    /// The blinky project with every tool present and succeeding.
    pub fn blinky() -> Self {
        Self::with_sources(&blinky_sources())
    }

    /// A project holding `sources` with every tool present and succeeding.
    pub fn with_sources(sources: &[(&str, &str)]) -> Self {
        let dir = scaffold(sources);
        let tools = fake_toolchain();
        let project = Project::create(dir.path(), PROJECT_NAME)
            .unwrap_or_else(|e| panic!("cannot create fixture project: {e}"))
            .with_search_path(tools.path().as_os_str());
        Fixture {
            dir,
            tools,
            project,
        }
    }

    /// The project root as the project sees it.
    pub fn root(&self) -> &Path {
        self.project.root()
    }

    /// Replaces the stand-in for `tool`.
    pub fn install(&self, tool: Tool, script: &str) {
        install_tool(self.tools.path(), tool, script);
        self.project.registry().invalidate(tool);
    }

    /// Overwrites a file under the project root.
    pub fn write(&self, rel: &str, text: &str) {
        write_file(self.root(), rel, text);
    }

    /// Reopens the project from disk, as a new process would.
    pub fn reopen(&self) -> Result<Project, PipelineError> {
        Project::open(self.dir.path())
            .map(|project| project.with_search_path(self.tools.path().as_os_str()))
    }
}

/// The files of the blinky project.
pub fn blinky_sources() -> Vec<(&'static str, &'static str)> {
    vec![
        ("src/counter.vhd", COUNTER_VHD),
        ("src/blinky.vhd", BLINKY_VHD),
        ("testbench/blinky_tb.vhd", BLINKY_TB_VHD),
        ("constraints/blinky.ccf", BLINKY_CCF),
    ]
}

/// Creates a temporary directory holding `files`.
pub fn scaffold(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("cannot create temp dir: {e}"));
    for (rel, text) in files {
        write_file(dir.path(), rel, text);
    }
    dir
}

/// A directory with a succeeding stand-in for every tool.
pub fn fake_toolchain() -> TempDir {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("cannot create temp dir: {e}"));
    for tool in Tool::ALL {
        install_tool(dir.path(), tool, FAKE_TOOL);
    }
    dir
}

/// Writes `script` as the executable for `tool` in `dir`.
pub fn install_tool(dir: &Path, tool: Tool, script: &str) -> PathBuf {
    let path = dir.join(tool.name());
    fs::write(&path, script).unwrap_or_else(|e| panic!("cannot write {}: {e}", path.display()));
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .unwrap_or_else(|e| panic!("cannot chmod {}: {e}", path.display()));
    }
    path
}

/// Writes `text` to `<root>/<rel>`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .unwrap_or_else(|e| panic!("cannot create {}: {e}", parent.display()));
    }
    fs::write(&path, text).unwrap_or_else(|e| panic!("cannot write {}: {e}", path.display()));
}

/// Indexes `files` in a fresh directory and builds their hierarchy.
pub fn hierarchy_of(
    files: &[(&str, &str)],
) -> (TempDir, IndexReport, Result<HierarchyGraph, ccflow_hierarchy::CycleError>) {
    let dir = scaffold(files);
    let report = ccflow_source::index(&[dir.path().to_path_buf()]);
    let graph = HierarchyGraph::build(&report.index.units);
    (dir, report, graph)
}

/// An observer that drops tool output.
pub fn quiet(_stream: Stream, _line: &str) {}
