use crate::backup::invoker::shell_quote;
use crate::backup::naming::BackupId;
use crate::backup::validate::{
    validate_name_prefix, validate_not_blank, validate_readable_dir, validate_readable_file,
    validate_utf8_path,
};
use bon::Builder;
use getset::{CopyGetters, Getters};
use std::path::PathBuf;
use validator::Validate;

pub static DEFAULT_TRANSFER_BIN: &str = "rsync";
pub static DEFAULT_TRANSFER_FLAGS: &str = "-az";
pub static DEFAULT_TRANSPORT_BIN: &str = "ssh";
pub static DEFAULT_RETENTION_COUNT: u32 = 1;

/// Everything one backup run needs, fixed for the lifetime of the run.
///
/// Build it with [`BackupConfig::builder`] and check it with [`Validate::validate`],
/// which reports every violated constraint instead of stopping at the first one.
#[derive(Clone, Debug, PartialEq, Eq, Validate, Builder, Getters, CopyGetters)]
pub struct BackupConfig {
    /// Local directory to back up
    #[validate(custom(function = validate_readable_dir))]
    #[builder(into)]
    #[getset(get = "pub")]
    source_path: PathBuf,
    /// rsync `--exclude-from` file
    #[validate(custom(function = validate_readable_file))]
    #[builder(into)]
    #[getset(get = "pub")]
    exclude_file_path: Option<PathBuf>,
    /// Directory on the remote host holding one sub directory per backup
    #[validate(custom(function = validate_not_blank))]
    #[builder(into)]
    #[getset(get = "pub")]
    destination_path: String,
    #[validate(custom(function = validate_not_blank))]
    #[builder(into)]
    #[getset(get = "pub")]
    remote_host: String,
    #[validate(custom(function = validate_not_blank))]
    #[builder(into)]
    #[getset(get = "pub")]
    remote_user: String,
    /// Passphrase-less identity for ssh, `None` uses ssh's default
    #[validate(custom(function = validate_utf8_path))]
    #[builder(into)]
    #[getset(get = "pub")]
    remote_key_path: Option<PathBuf>,
    #[validate(custom(function = validate_not_blank))]
    #[builder(default = DEFAULT_TRANSFER_BIN.to_string(), into)]
    #[getset(get = "pub")]
    transfer_bin_path: String,
    /// Whitespace separated flag groups, e.g. `-az --delete`
    #[builder(default = DEFAULT_TRANSFER_FLAGS.to_string(), into)]
    #[getset(get = "pub")]
    transfer_flags: String,
    #[validate(custom(function = validate_not_blank))]
    #[builder(default = DEFAULT_TRANSPORT_BIN.to_string(), into)]
    #[getset(get = "pub")]
    transport_bin_path: String,
    #[validate(range(min = 1, message = "at least one backup must be kept"))]
    #[builder(default = DEFAULT_RETENTION_COUNT)]
    #[getset(get_copy = "pub")]
    retention_count: u32,
    #[validate(custom(function = validate_name_prefix))]
    #[builder(default, into)]
    #[getset(get = "pub")]
    name_prefix: String,
    /// Ask rsync for a dry run and never delete anything
    #[builder(default)]
    #[getset(get_copy = "pub")]
    dry_run: bool,
    /// Hard link unchanged files against the newest existing backup
    #[builder(default)]
    #[getset(get_copy = "pub")]
    link_dest: bool,
    /// Create the destination directory if it does not exist yet
    #[builder(default)]
    #[getset(get_copy = "pub")]
    create_dest: bool,
}

impl BackupConfig {
    /// `user@host`, as understood by both ssh and rsync
    pub fn remote_login(&self) -> String {
        format!("{}@{}", self.remote_user, self.remote_host)
    }

    /// Path of a backup directory on the remote host.
    pub fn remote_path(&self, id: &BackupId) -> String {
        format!(
            "{}/{}",
            self.destination_path.trim_end_matches('/'),
            id.name()
        )
    }

    /// rsync destination argument for a new backup.
    pub fn remote_target(&self, id: &BackupId) -> String {
        format!("{}:{}", self.remote_login(), self.remote_path(id))
    }

    pub fn transfer_flag_args(&self) -> impl Iterator<Item = String> + '_ {
        self.transfer_flags.split_whitespace().map(str::to_string)
    }

    /// Leading ssh arguments shared by every remote command.
    pub fn transport_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(3);
        if let Some(key) = &self.remote_key_path {
            args.push("-i".to_string());
            args.push(key.to_string_lossy().into_owned());
        }
        args.push(self.remote_login());
        args
    }

    /// Value for rsync's `-e` option; rsync splits it on whitespace itself.
    pub fn transport_shell(&self) -> String {
        match &self.remote_key_path {
            Some(key) => format!(
                "{} -i {}",
                shell_quote(&self.transport_bin_path),
                shell_quote(&key.to_string_lossy())
            ),
            None => shell_quote(&self.transport_bin_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn valid_config(src: &TempDir) -> BackupConfig {
        BackupConfig::builder()
            .source_path(src.path())
            .destination_path("/srv/backups/")
            .remote_host("nas.local")
            .remote_user("backup")
            .build()
    }

    #[test]
    fn test_defaults() {
        let src = TempDir::new().unwrap();
        let config = valid_config(&src);

        assert_eq!(config.transfer_bin_path(), "rsync");
        assert_eq!(config.transfer_flags(), "-az");
        assert_eq!(config.transport_bin_path(), "ssh");
        assert_eq!(config.retention_count(), 1);
        assert_eq!(config.name_prefix(), "");
        assert!(config.exclude_file_path().is_none());
        assert!(config.remote_key_path().is_none());
        assert!(!config.dry_run());
        assert!(!config.link_dest());
        assert!(!config.create_dest());
    }

    #[test]
    fn test_validate_success() {
        let src = TempDir::new().unwrap();
        let exclude = src.path().join("excludes.txt");
        std::fs::write(&exclude, "*.cache\n").unwrap();

        let config = BackupConfig::builder()
            .source_path(src.path())
            .exclude_file_path(exclude)
            .destination_path("/srv/backups")
            .remote_host("nas.local")
            .remote_user("backup")
            .remote_key_path("/does/not/matter")
            .retention_count(7)
            .name_prefix("laptop-")
            .build();

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_source() {
        let src = TempDir::new().unwrap();
        let config = BackupConfig::builder()
            .source_path(src.path().join("missing"))
            .destination_path("/srv/backups")
            .remote_host("nas.local")
            .remote_user("backup")
            .build();

        let errors = config.validate().unwrap_err();
        let fields = errors.field_errors();
        assert_eq!(fields.len(), 1);
        assert!(fields.contains_key("source_path"));
    }

    #[test]
    fn test_validate_accepts_prefix_with_punctuation() {
        let src = TempDir::new().unwrap();
        for prefix in ["srv:", "host.", "daily "] {
            let config = BackupConfig::builder()
                .source_path(src.path())
                .destination_path("/srv/backups")
                .remote_host("nas.local")
                .remote_user("backup")
                .name_prefix(prefix)
                .build();
            assert!(config.validate().is_ok(), "{prefix:?} should be accepted");
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_validate_non_utf8_key_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let src = TempDir::new().unwrap();
        let config = BackupConfig::builder()
            .source_path(src.path())
            .destination_path("/srv/backups")
            .remote_host("nas.local")
            .remote_user("backup")
            .remote_key_path(PathBuf::from(OsStr::from_bytes(b"/keys/id-\xff")))
            .build();

        let errors = config.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("remote_key_path"));
    }

    #[test]
    fn test_validate_reports_every_violation() {
        let src = TempDir::new().unwrap();
        let config = BackupConfig::builder()
            .source_path(src.path())
            .exclude_file_path(src.path().join("no-such-file"))
            .destination_path("")
            .remote_host(" ")
            .remote_user("")
            .retention_count(0)
            .name_prefix("a/b")
            .build();

        let errors = config.validate().unwrap_err();
        let fields = errors.field_errors();
        for field in [
            "exclude_file_path",
            "destination_path",
            "remote_host",
            "remote_user",
            "retention_count",
            "name_prefix",
        ] {
            assert!(fields.contains_key(field), "{field} should be reported");
        }
        assert!(!fields.contains_key("source_path"));
    }

    #[test]
    fn test_remote_target() {
        let src = TempDir::new().unwrap();
        let config = valid_config(&src);
        let id = BackupId::new("", Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap());

        assert_eq!(config.remote_login(), "backup@nas.local");
        assert_eq!(config.remote_path(&id), "/srv/backups/2024-01-04T00-00-00");
        assert_eq!(
            config.remote_target(&id),
            "backup@nas.local:/srv/backups/2024-01-04T00-00-00"
        );
    }

    #[test]
    fn test_transport_arguments() {
        let src = TempDir::new().unwrap();
        let without_key = valid_config(&src);
        assert_eq!(without_key.transport_args(), vec!["backup@nas.local"]);
        assert_eq!(without_key.transport_shell(), "ssh");

        let with_key = BackupConfig::builder()
            .source_path(src.path())
            .destination_path("/srv/backups")
            .remote_host("nas.local")
            .remote_user("backup")
            .remote_key_path("/home/me/.ssh/backup key")
            .transport_bin_path("/usr/bin/ssh")
            .transfer_flags("-a  -z --delete")
            .build();
        assert_eq!(
            with_key.transport_args(),
            vec!["-i", "/home/me/.ssh/backup key", "backup@nas.local"]
        );
        assert_eq!(
            with_key.transport_shell(),
            "/usr/bin/ssh -i '/home/me/.ssh/backup key'"
        );
        assert_eq!(
            with_key.transfer_flag_args().collect::<Vec<_>>(),
            vec!["-a", "-z", "--delete"]
        );
    }
}
