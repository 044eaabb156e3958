//! Running external programs (rsync, ssh) synchronously.

use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddFunctionName;
use bon::Builder;
use function_name::named;
use getset::{CopyGetters, Getters};
use itertools::Itertools;
use std::process::{Command, Stdio};

/// Exit status and captured output of a finished process.
#[derive(Clone, Debug, Default, PartialEq, Eq, Builder, Getters, CopyGetters)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal
    #[getset(get_copy = "pub")]
    exit_code: Option<i32>,
    #[builder(default, into)]
    #[getset(get = "pub")]
    stdout: String,
    #[builder(default, into)]
    #[getset(get = "pub")]
    stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Capability to run an external command.
///
/// A non-zero exit status is not an error at this level, callers decide what it means.
/// Only a process that cannot be started yields [`Error::Execution`].
pub trait ProcessInvoker {
    fn run(&self, command: &str, args: &[String]) -> Result<CommandOutput>;
}

impl<T: ProcessInvoker + ?Sized> ProcessInvoker for &T {
    fn run(&self, command: &str, args: &[String]) -> Result<CommandOutput> {
        (**self).run(command, args)
    }
}

/// Spawns real processes; arguments go straight to the program, never through a shell.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemInvoker;

impl ProcessInvoker for SystemInvoker {
    #[named]
    fn run(&self, command: &str, args: &[String]) -> Result<CommandOutput> {
        let command_line = display_command(command, args);
        tracing::debug!("CMD : {}", command_line);

        let output = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::execution(command_line, e))
            .add_fn_name(function_path!())?;

        let output = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!("EXIT: {:?}", output.exit_code);
        tracing::debug!("OUT : {}", output.stdout.trim_end());
        tracing::debug!("ERR : {}", output.stderr.trim_end());

        Ok(output)
    }
}

/// Quotes `value` for a POSIX shell unless it consists only of safe characters.
///
/// ssh hands its command arguments to the remote login shell as one string, so every
/// path sent that way goes through here.
pub fn shell_quote(value: &str) -> String {
    let is_safe = |c: char| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c);
    if !value.is_empty() && value.chars().all(is_safe) {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Human readable command line, for logs and error messages only.
pub fn display_command(command: &str, args: &[String]) -> String {
    std::iter::once(shell_quote(command))
        .chain(args.iter().map(|a| shell_quote(a)))
        .join(" ")
}
