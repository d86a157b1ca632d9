//! `ccflow init`: project scaffolding.
//!
//! Creates the standard layout and `ccflow.toml`, and unless `--bare` is
//! given, a blinking-LED design with a testbench and a constraint file for
//! the Olimex GateMate evaluation board.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ccflow_pipeline::layout::CONSTRAINTS_DIR;
use ccflow_pipeline::Project;

use crate::{project, GlobalArgs, InitArgs};

/// Runs the `ccflow init` command.
pub fn run(args: &InitArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let dir = match &args.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    fs::create_dir_all(&dir)?;
    let name = match &args.name {
        Some(name) => name.clone(),
        None => default_name(&dir),
    };

    if !global.quiet {
        eprintln!("  Creating GateMate project `{name}`");
    }
    if !args.bare {
        for path in write_templates(&dir, &name)? {
            if !global.quiet {
                eprintln!("     Created {}", path.display());
            }
        }
    }

    let project = Project::create(&dir, &name)?;
    project::remember(project.root());
    if !global.quiet {
        let status = project.status();
        eprintln!(
            "     Indexed {} files, {} units",
            status.files, status.units
        );
    }
    Ok(0)
}

fn default_name(dir: &Path) -> String {
    dir.canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .unwrap_or("gatemate_project")
        .to_string()
}

/// Writes the template files that do not exist yet and returns their paths.
fn write_templates(root: &Path, name: &str) -> io::Result<Vec<PathBuf>> {
    let files = [
        (PathBuf::from("src").join(format!("{name}.vhd")), top_template(name)),
        (
            PathBuf::from("testbench").join(format!("{name}_tb.vhd")),
            testbench_template(name),
        ),
        (
            PathBuf::from(CONSTRAINTS_DIR).join(format!("{name}.ccf")),
            CONSTRAINT_TEMPLATE.to_string(),
        ),
    ];
    let mut written = Vec::new();
    for (rel, text) in files {
        let path = root.join(&rel);
        if path.exists() {
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, text)?;
        written.push(rel);
    }
    Ok(written)
}

fn top_template(name: &str) -> String {
    format!(
        r#"library ieee;
use ieee.std_logic_1164.all;
use ieee.numeric_std.all;

entity {name} is
  port (
    clk : in  std_logic;
    rst : in  std_logic;
    led : out std_logic
  );
end entity;

architecture rtl of {name} is
  signal count : unsigned(23 downto 0) := (others => '0');
begin
  process (clk)
  begin
    if rising_edge(clk) then
      if rst = '0' then
        count <= (others => '0');
      else
        count <= count + 1;
      end if;
    end if;
  end process;

  led <= count(count'high);
end architecture;
"#
    )
}

fn testbench_template(name: &str) -> String {
    format!(
        r#"library ieee;
use ieee.std_logic_1164.all;

entity {name}_tb is
end entity;

architecture sim of {name}_tb is
  signal clk : std_logic := '0';
  signal rst : std_logic := '0';
  signal led : std_logic;
begin
  clk <= not clk after 5 ns;
  rst <= '1' after 20 ns;

  dut: entity work.{name}
    port map (clk => clk, rst => rst, led => led);
end architecture;
"#
    )
}

const CONSTRAINT_TEMPLATE: &str = r#"## Olimex GateMate EVB
## <direction> "<pin-name>" Loc = "<pin-location>" | <options>;

Net   "clk"  Loc = "IO_SB_A8" | SCHMITT_TRIGGER=true;
Net   "rst"  Loc = "IO_EB_B0";
Net   "led"  Loc = "IO_EB_B1";
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use ccflow_pipeline::executor::implementation::has_active_constraints;

    #[test]
    fn templates_are_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_templates(dir.path(), "blinky").unwrap();
        assert_eq!(
            written,
            vec![
                PathBuf::from("src/blinky.vhd"),
                PathBuf::from("testbench/blinky_tb.vhd"),
                PathBuf::from("constraints/blinky.ccf"),
            ]
        );
        assert!(write_templates(dir.path(), "blinky").unwrap().is_empty());
    }

    #[test]
    fn constraint_template_has_active_lines() {
        let dir = tempfile::tempdir().unwrap();
        write_templates(dir.path(), "blinky").unwrap();
        assert!(has_active_constraints(
            &dir.path().join("constraints/blinky.ccf")
        ));
    }

    #[test]
    fn templates_form_a_project() {
        let dir = tempfile::tempdir().unwrap();
        write_templates(dir.path(), "blinky").unwrap();
        let project = Project::create(dir.path(), "blinky").unwrap();
        let status = project.status();
        assert_eq!(status.units, 2);
        assert_eq!(status.synthesis_top.unwrap(), "blinky");
        assert_eq!(status.simulation_top.unwrap(), "blinky_tb");
    }

    #[test]
    fn name_defaults_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("uart_echo");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(default_name(&nested), "uart_echo");
    }
}
