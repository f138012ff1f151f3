#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

/// A fully resolved external invocation. `env` is layered over the inherited process
/// environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CommandSpec {
    pub(crate) program: PathBuf,
    pub(crate) args: Vec<String>,
    pub(crate) cwd: Option<PathBuf>,
    pub(crate) env: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CommandOutcome {
    pub(crate) success: bool,
    /// Captured stdout followed by stderr.
    pub(crate) output: String,
    pub(crate) error: Option<String>,
}

pub(crate) trait CommandRunner {
    fn run(&self, spec: &CommandSpec) -> CommandOutcome;
}

/// Blocking `std::process` runner. No timeout: a hung command hangs the caller.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> CommandOutcome {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).envs(&spec.env);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        tracing::debug!(program = %spec.program.display(), args = ?spec.args, "replay command");

        let out = match cmd.output() {
            Ok(out) => out,
            Err(err) => {
                return CommandOutcome {
                    success: false,
                    output: String::new(),
                    error: Some(err.to_string()),
                };
            }
        };

        let mut output = String::from_utf8_lossy(&out.stdout).to_string();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        let error = if out.status.success() {
            None
        } else {
            Some(match out.status.code() {
                Some(code) => format!("exit status {code}"),
                None => "terminated by signal".to_string(),
            })
        };
        CommandOutcome {
            success: out.status.success(),
            output,
            error,
        }
    }
}
