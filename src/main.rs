use clap::{ArgAction, Parser};
use remote_backup::backup::invoker::SystemInvoker;
use remote_backup::backup::orchestrator::BackupOrchestrator;
use remote_backup::backup::result_error::result::Result;
use remote_backup::backup::settings::{default_config_files, load_settings, Settings};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Exit code of `--check-host` when the host cannot be reached
const HOST_UNREACHABLE: u8 = 8;

/// Creates a remote backup with rsync over ssh and removes old ones
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Do not actually create or remove backups
    #[arg(short = 'n', long)]
    dry_run: bool,
    /// Configuration file read after /etc/backup.conf and ~/.backup.conf
    #[arg(short, long = "config-file", value_name = "FILE")]
    config_file: Option<PathBuf>,
    /// Number of backups to keep
    #[arg(short = 'b', long, value_name = "N")]
    num_backups: Option<u32>,
    /// Source directory (local)
    #[arg(short = 's', long = "source-dir", value_name = "DIR")]
    src: Option<PathBuf>,
    /// Destination directory (remote)
    #[arg(short = 'd', long = "dest-dir", value_name = "DIR")]
    dest: Option<String>,
    /// Destination host
    #[arg(short = 'm', long = "remote-machine", value_name = "MACHINE")]
    host: Option<String>,
    /// Username on destination machine
    #[arg(short = 'u', long)]
    user: Option<String>,
    /// SSH key to use
    #[arg(short = 'k', long = "key")]
    ssh_key: Option<PathBuf>,
    /// File to use as rsync's exclude file
    #[arg(short = 'e', long = "exclude-file", value_name = "FILE")]
    exclude: Option<PathBuf>,
    /// String to use as prefix for backup names
    #[arg(short = 'p', long)]
    prefix: Option<String>,
    /// Hard link unchanged files against the most recent backup
    #[arg(long)]
    link_dest: bool,
    /// Create the destination directory when missing
    #[arg(long)]
    create_dest: bool,
    /// Only test that the remote host is reachable
    #[arg(long)]
    check_host: bool,
}

impl Args {
    fn overrides(&self) -> Settings {
        Settings {
            prefix: self.prefix.clone(),
            num_backups: self.num_backups,
            src: self.src.clone(),
            exclude: self.exclude.clone(),
            dest: self.dest.clone(),
            user: self.user.clone(),
            host: self.host.clone(),
            ssh_key: self.ssh_key.clone(),
            dry_run: self.dry_run.then_some(true),
            link_dest: self.link_dest.then_some(true),
            create_dest: self.create_dest.then_some(true),
            ..Default::default()
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<ExitCode> {
    let (file_settings, files_read) =
        load_settings(&default_config_files(), args.config_file.as_ref())?;
    info!("Configuration file(s) read: {:?}", files_read);

    let settings = file_settings.merge(args.overrides());
    debug!("Settings: {:?}", settings);

    let orchestrator = BackupOrchestrator::new(settings.into_config(), SystemInvoker);
    if args.check_host {
        return Ok(if orchestrator.check_host()? {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(HOST_UNREACHABLE)
        });
    }

    let report = orchestrator.run()?;
    info!(
        "Backup {} done, removed {} old backup(s), {} kept",
        report.created(),
        report.removed().len(),
        report.kept().len()
    );
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.kind().exit_code())
        }
    }
}
