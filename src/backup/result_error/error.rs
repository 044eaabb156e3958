use crate::backup::naming::BackupId;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use derive_more::Display;
use thiserror::Error;
use thiserror_ext::Construct;

#[derive(Error, Debug, Construct)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error(transparent)]
    Ini(#[from] ini::ParseError),
    #[error("Invalid setting {key} = {value:?}: {reason}")]
    InvalidSetting {
        key: String,
        value: String,
        reason: String,
    },
    #[error("Invalid configuration:\n{}", indent::indent_all_with("  ", .0.to_string()))]
    Configuration(#[from] validator::ValidationErrors),
    #[error("Cannot launch {command}: {source}")]
    Execution {
        command: String,
        source: std::io::Error,
    },
    #[error("Cannot prepare destination {destination:?}: {reason}")]
    Destination { destination: String, reason: String },
    #[error("Backup {identifier} already exists on the remote host")]
    BackupExists { identifier: BackupId },
    #[error(
        "Transfer of backup {identifier} failed ({}):\n{}",
        describe_exit(.exit_code),
        indent::indent_all_with("  ", .stderr)
    )]
    BackupTransfer {
        identifier: BackupId,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error(
        "Listing backups in {destination:?} failed ({}):\n{}",
        describe_exit(.exit_code),
        indent::indent_all_with("  ", .stderr)
    )]
    BackupList {
        destination: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error(
        "Removing old backups failed for [{}], removed [{}]",
        itertools::join(.failed, ", "),
        itertools::join(.removed, ", ")
    )]
    BackupPrune {
        removed: Vec<BackupId>,
        failed: Vec<PruneFailure>,
    },
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("{} failed:\n{}", fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithFnName { fn_name: String, error: Box<Error> },
}

/// A backup directory that could not be removed, with the reason reported by the transport.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display("{identifier} ({reason})")]
pub struct PruneFailure {
    pub identifier: BackupId,
    pub reason: String,
}

/// Failure class of an [`Error`], independent of any context wrapping.
///
/// Each class maps to its own process exit code so a scheduler can tell them apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Settings,
    Configuration,
    Transfer,
    List,
    Prune,
    Execution,
    Destination,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Settings => 1,
            ErrorKind::Configuration => 2,
            ErrorKind::Transfer => 3,
            ErrorKind::List => 4,
            ErrorKind::Prune => 5,
            ErrorKind::Execution => 6,
            ErrorKind::Destination => 7,
        }
    }
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl<S: Into<String>> AddMsg<S> for Error {
    fn add_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl<S: Into<String>> AddFunctionName<S> for Error {
    fn add_fn_name(self, fn_name: S) -> Self {
        Self::WithFnName {
            fn_name: fn_name.into(),
            error: Box::new(self),
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_)
            | Error::SerdeYml(_)
            | Error::Ini(_)
            | Error::InvalidSetting { .. } => ErrorKind::Settings,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Execution { .. } => ErrorKind::Execution,
            Error::Destination { .. } => ErrorKind::Destination,
            Error::BackupExists { .. } | Error::BackupTransfer { .. } => ErrorKind::Transfer,
            Error::BackupList { .. } => ErrorKind::List,
            Error::BackupPrune { .. } => ErrorKind::Prune,
            Error::WithMsg { error, .. } | Error::WithFnName { error, .. } => error.kind(),
        }
    }

    /// Strips context wrappers and returns the error that caused the failure.
    pub fn root(&self) -> &Error {
        match self {
            Error::WithMsg { error, .. } | Error::WithFnName { error, .. } => error.root(),
            e => e,
        }
    }
}
