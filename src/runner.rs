//! Subprocess invocation behind a single capability trait.
//!
//! Everything that shells out (claude CLI, docker gateway) goes through
//! `ProcessRunner`, so tests can substitute a recording fake.

use std::process::Command;

use tracing::debug;

use crate::errors::{Error, Result};

/// Captured result of one subprocess run.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

pub trait ProcessRunner {
    /// Run `program` with `args`, with `env` added to its environment, and
    /// wait for completion. No timeout is enforced here.
    fn run(&self, program: &str, args: &[String], env: &[(String, String)]) -> Result<RunOutput>;
}

/// `ProcessRunner` backed by `std::process::Command`.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String], env: &[(String, String)]) -> Result<RunOutput> {
        debug!(program, ?args, "running subprocess");
        let output = Command::new(program)
            .args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .map_err(|source| Error::Spawn {
                program: program.to_string(),
                source,
            })?;

        Ok(RunOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::cell::RefCell;

    /// Recording fake: responses are matched by argv prefix, every call is
    /// captured for assertion.
    #[derive(Debug, Default)]
    pub struct FakeRunner {
        pub calls: RefCell<Vec<(String, Vec<String>, Vec<(String, String)>)>>,
        responses: Vec<(String, RunOutput)>,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Respond with `output` to any call whose `program args...` line
        /// starts with `prefix`. Unmatched calls succeed with empty output.
        pub fn respond(mut self, prefix: &str, output: RunOutput) -> Self {
            self.responses.push((prefix.to_string(), output));
            self
        }

        pub fn ok_with_stdout(stdout: &str) -> RunOutput {
            RunOutput {
                stdout: stdout.to_string(),
                success: true,
                ..RunOutput::default()
            }
        }

        pub fn fail_with_stderr(stderr: &str) -> RunOutput {
            RunOutput {
                stderr: stderr.to_string(),
                success: false,
                code: Some(1),
                ..RunOutput::default()
            }
        }

        pub fn argv_lines(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .map(|(p, args, _)| {
                    let mut line = p.clone();
                    for a in args {
                        line.push(' ');
                        line.push_str(a);
                    }
                    line
                })
                .collect()
        }
    }

    impl ProcessRunner for FakeRunner {
        fn run(
            &self,
            program: &str,
            args: &[String],
            env: &[(String, String)],
        ) -> Result<RunOutput> {
            self.calls
                .borrow_mut()
                .push((program.to_string(), args.to_vec(), env.to_vec()));

            let mut line = program.to_string();
            for a in args {
                line.push(' ');
                line.push_str(a);
            }
            for (prefix, output) in &self.responses {
                if line.starts_with(prefix.as_str()) {
                    return Ok(output.clone());
                }
            }
            Ok(RunOutput {
                success: true,
                ..RunOutput::default()
            })
        }
    }
}
