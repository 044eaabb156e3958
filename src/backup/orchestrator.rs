//! One backup run: validate, transfer, list, prune.
//!
//! Every stage blocks on its external command before the next one starts and each
//! command is attempted once. A new backup is always created before anything is
//! pruned, so a failed transfer never costs an older backup.
//!
//! Runs against the same destination are not coordinated with each other; two
//! overlapping runs may both prune.

use crate::backup::backup_config::BackupConfig;
use crate::backup::function_path;
use crate::backup::invoker::{shell_quote, CommandOutput, ProcessInvoker};
use crate::backup::naming::BackupId;
use crate::backup::result_error::error::{Error, PruneFailure};
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddFunctionName;
use crate::backup::retention::RetentionPlan;
use crate::backup::validate::validate_not_blank;
use chrono::{DateTime, Utc};
use function_name::named;
use getset::{CopyGetters, Getters};
use itertools::Itertools;
use tracing::{debug, info, warn};
use validator::{Validate, ValidationErrors};

/// Outcome of a successful run.
#[derive(Clone, Debug, PartialEq, Eq, Getters, CopyGetters)]
pub struct BackupReport {
    #[getset(get = "pub")]
    created: BackupId,
    /// Pruned backups, oldest first. In a dry run these are the backups that would
    /// have been pruned.
    #[getset(get = "pub")]
    removed: Vec<BackupId>,
    #[getset(get = "pub")]
    kept: Vec<BackupId>,
    #[getset(get_copy = "pub")]
    dry_run: bool,
}

pub struct BackupOrchestrator<I> {
    config: BackupConfig,
    invoker: I,
}

impl<I: ProcessInvoker> BackupOrchestrator<I> {
    pub fn new(config: BackupConfig, invoker: I) -> Self {
        Self { config, invoker }
    }

    pub fn run(&self) -> Result<BackupReport> {
        self.run_at(Utc::now())
    }

    /// Runs the whole pipeline for a backup started at `started_at`.
    #[named]
    pub fn run_at(&self, started_at: DateTime<Utc>) -> Result<BackupReport> {
        self.config
            .validate()
            .map_err(Error::from)
            .add_fn_name(function_path!())?;

        let created = BackupId::new(self.config.name_prefix(), started_at);
        if self.config.dry_run() {
            warn!("Performing a dry run, nothing will be created or removed");
        }
        info!(
            "Creating backup {} of {:?} at {}",
            created,
            self.config.source_path(),
            self.config.remote_target(&created)
        );

        if self.config.create_dest() {
            self.prepare_destination()?;
        }

        let link_target = if self.config.link_dest() {
            let existing = self.list_backups()?;
            if existing.contains(&created) {
                return Err(Error::backup_exists(created));
            }
            existing.last().cloned()
        } else {
            None
        };

        self.transfer(&created, link_target.as_ref())?;

        let mut backups = self.list_backups()?;
        if self.config.dry_run() && !backups.contains(&created) {
            backups.push(created.clone());
        }

        let plan = RetentionPlan::new(backups, self.config.retention_count());
        let removed = if plan.is_noop() {
            info!(
                "At most {} backup(s) exist, no removal necessary",
                self.config.retention_count()
            );
            Vec::new()
        } else {
            self.prune(plan.delete())?
        };

        Ok(BackupReport {
            created,
            removed,
            kept: plan.keep().clone(),
            dry_run: self.config.dry_run(),
        })
    }

    /// Whether the remote host accepts a trivial command.
    ///
    /// Only the login settings are validated, the rest of the configuration may be
    /// incomplete.
    #[named]
    pub fn check_host(&self) -> Result<bool> {
        let mut errors = ValidationErrors::new();
        for (field, value) in [
            ("remote_host", self.config.remote_host()),
            ("remote_user", self.config.remote_user()),
            ("transport_bin_path", self.config.transport_bin_path()),
        ] {
            if let Err(e) = validate_not_blank(value) {
                errors.add(field, e);
            }
        }
        if !errors.is_empty() {
            return Err(Error::from(errors).add_fn_name(function_path!()));
        }

        let reachable = self.run_remote(["exit".to_string(), "0".to_string()])?.success();
        if reachable {
            info!("Host {} is reachable", self.config.remote_login());
        } else {
            warn!("Host {} is not reachable", self.config.remote_login());
        }
        Ok(reachable)
    }

    /// Makes sure the destination exists (unless dry run) and is writable.
    pub fn prepare_destination(&self) -> Result<()> {
        let dest = self.config.destination_path();
        let exists = self
            .run_remote(["test".into(), "-d".into(), shell_quote(dest)])?
            .success();

        if !exists {
            if self.config.dry_run() {
                info!("Destination directory {dest} does not exist (dry run)");
                return Ok(());
            }
            info!("Destination directory {dest} does not exist, attempting to create");
            let output = self.run_remote(["mkdir".into(), "-p".into(), shell_quote(dest)])?;
            if !output.success() {
                return Err(Error::destination(
                    dest,
                    format!("cannot create directory: {}", output.stderr().trim()),
                ));
            }
            info!("Destination directory created");
        }

        let writable = self
            .run_remote(["test".into(), "-w".into(), shell_quote(dest)])?
            .success();
        if !writable {
            return Err(Error::destination(dest, "directory is not writable"));
        }

        Ok(())
    }

    /// Copies the source directory into a new backup directory on the remote host.
    #[named]
    pub fn transfer(&self, id: &BackupId, link_target: Option<&BackupId>) -> Result<()> {
        let mut args = self.config.transfer_flag_args().collect_vec();
        if self.config.dry_run() {
            args.push("-n".to_string());
        }
        if let Some(exclude) = self.config.exclude_file_path() {
            args.push(format!("--exclude-from={}", exclude.to_string_lossy()));
        }
        match link_target {
            Some(link) => {
                info!("Most recent backup (link-dest): {link}");
                args.push(format!("--link-dest={}", self.config.remote_path(link)));
            }
            None if self.config.link_dest() => {
                info!("No backups were found, creating initial backup")
            }
            None => {}
        }
        args.push("-e".to_string());
        args.push(self.config.transport_shell());
        args.push(self.config.source_path().to_string_lossy().into_owned());
        args.push(self.config.remote_target(id));

        let output = self
            .invoker
            .run(self.config.transfer_bin_path(), &args)
            .add_fn_name(function_path!())?;
        if !output.success() {
            return Err(Error::backup_transfer(
                id.clone(),
                output.exit_code(),
                output.stderr().trim(),
            ));
        }

        if self.config.dry_run() {
            info!("Backup {id} transfer simulated (dry run)");
        } else {
            info!("Backup {id} created successfully");
        }
        Ok(())
    }

    /// Recognized backups currently on the remote host, oldest first.
    ///
    /// Entries that are not backup identifiers for the configured prefix are skipped.
    #[named]
    pub fn list_backups(&self) -> Result<Vec<BackupId>> {
        let dest = self.config.destination_path();
        let output = self
            .run_remote(["ls".into(), shell_quote(dest)])
            .add_fn_name(function_path!())?;
        if !output.success() {
            return Err(Error::backup_list(
                dest,
                output.exit_code(),
                output.stderr().trim(),
            ));
        }

        let prefix = self.config.name_prefix();
        let (backups, foreign): (Vec<_>, Vec<_>) = output
            .stdout()
            .lines()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .partition_map(|name| match BackupId::parse(prefix, name) {
                Some(id) => itertools::Either::Left(id),
                None => itertools::Either::Right(name),
            });
        if !foreign.is_empty() {
            debug!("Ignoring unmanaged entries in {dest}: {}", foreign.join(", "));
        }

        let backups = backups.into_iter().sorted().collect_vec();
        debug!("Found {} backup(s) in {dest}", backups.len());
        Ok(backups)
    }

    /// Removes `to_remove`, attempting every deletion even after a failure.
    pub fn prune(&self, to_remove: &[BackupId]) -> Result<Vec<BackupId>> {
        if to_remove.is_empty() {
            return Ok(Vec::new());
        }
        if self.config.dry_run() {
            warn!(
                "Would have removed backup(s): {} (dry run)",
                to_remove.iter().join(" ")
            );
            return Ok(to_remove.to_vec());
        }

        info!("Removing backup(s): {}", to_remove.iter().join(" "));
        let (removed, failed): (Vec<_>, Vec<_>) =
            to_remove
                .iter()
                .partition_map(|id| match self.remove_backup(id) {
                    Ok(()) => itertools::Either::Left(id.clone()),
                    Err(reason) => {
                        warn!("Unable to remove backup {id}: {reason}");
                        itertools::Either::Right(PruneFailure {
                            identifier: id.clone(),
                            reason,
                        })
                    }
                });

        if !failed.is_empty() {
            return Err(Error::backup_prune(removed, failed));
        }
        info!("Successfully removed {} backup(s)", removed.len());
        Ok(removed)
    }

    fn remove_backup(&self, id: &BackupId) -> std::result::Result<(), String> {
        let path = self.config.remote_path(id);
        match self.run_remote(["rm".into(), "-rf".into(), shell_quote(&path)]) {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => Err(match output.stderr().trim() {
                "" => format!("exit code {:?}", output.exit_code()),
                stderr => stderr.to_string(),
            }),
            Err(e) => Err(e.to_string()),
        }
    }

    fn run_remote<A: IntoIterator<Item = String>>(&self, remote_args: A) -> Result<CommandOutput> {
        let mut args = self.config.transport_args();
        args.extend(remote_args);
        self.invoker.run(self.config.transport_bin_path(), &args)
    }
}
