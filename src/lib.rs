//! # remote_backup
//!
//! Rotating remote backups over rsync and ssh.
//!
//! Each run copies a local directory into a new timestamped directory on a remote host,
//! then removes the oldest backups so that only the configured number is kept.
//!
//! ## Features
//!
//! - **Timestamped Backups**: one directory per run, named `<prefix><UTC time>`
//! - **Retention Management**: keeps the N most recent backups, pruning only after a
//!   successful transfer
//! - **Incremental Copies**: optional `--link-dest` against the newest backup
//! - **Dry Runs**: simulate the transfer and report what would be pruned
//! - **Distinct Exit Codes**: one per failure class, for schedulers
//!
//! ## Quick Start
//!
//! ```no_run
//! use remote_backup::backup::backup_config::BackupConfig;
//! use remote_backup::backup::invoker::SystemInvoker;
//! use remote_backup::backup::orchestrator::BackupOrchestrator;
//!
//! let config = BackupConfig::builder()
//!     .source_path("/home/me")
//!     .destination_path("/srv/backups")
//!     .remote_host("nas.local")
//!     .remote_user("backup")
//!     .retention_count(7)
//!     .build();
//!
//! let report = BackupOrchestrator::new(config, SystemInvoker).run()?;
//! println!("created {}", report.created());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
