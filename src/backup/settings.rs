//! Layered settings: configuration files first, command line last.
//!
//! A configuration file groups `key = value` pairs under section headers. Section names
//! carry no meaning, their pairs are merged in file order:
//!
//! ```ini
//! [remote]
//! host = nas.local
//! user = backup
//! dest = /srv/backups
//!
//! [local]
//! src = /home/me
//! num_backups = 7
//! ```
//!
//! Files ending in `.yaml` or `.yml` hold the same sections as YAML mappings instead.

use crate::backup::backup_config::BackupConfig;
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use directories::BaseDirs;
use function_name::named;
use ini::Ini;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

pub static SYSTEM_CONFIG_FILE: &str = "/etc/backup.conf";
pub static USER_CONFIG_FILE_NAME: &str = ".backup.conf";

/// Syntax of a configuration file, picked from its extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    Ini,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(OsStr::to_str) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Ini,
        }
    }
}

/// Raw, unvalidated settings from one source. `None` means "not set here".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub prefix: Option<String>,
    pub num_backups: Option<u32>,
    pub rsync_bin: Option<String>,
    pub rsync_flags: Option<String>,
    pub ssh_bin: Option<String>,
    pub src: Option<PathBuf>,
    pub exclude: Option<PathBuf>,
    pub dest: Option<String>,
    pub user: Option<String>,
    pub host: Option<String>,
    pub ssh_key: Option<PathBuf>,
    pub dry_run: Option<bool>,
    pub link_dest: Option<bool>,
    pub create_dest: Option<bool>,
}

impl Settings {
    /// Values set in `other` win.
    pub fn merge(self, other: Settings) -> Settings {
        Settings {
            prefix: other.prefix.or(self.prefix),
            num_backups: other.num_backups.or(self.num_backups),
            rsync_bin: other.rsync_bin.or(self.rsync_bin),
            rsync_flags: other.rsync_flags.or(self.rsync_flags),
            ssh_bin: other.ssh_bin.or(self.ssh_bin),
            src: other.src.or(self.src),
            exclude: other.exclude.or(self.exclude),
            dest: other.dest.or(self.dest),
            user: other.user.or(self.user),
            host: other.host.or(self.host),
            ssh_key: other.ssh_key.or(self.ssh_key),
            dry_run: other.dry_run.or(self.dry_run),
            link_dest: other.link_dest.or(self.link_dest),
            create_dest: other.create_dest.or(self.create_dest),
        }
    }

    /// Parses one INI configuration file, flattening its sections in order.
    ///
    /// Keys are case insensitive and pairs before the first header count as a section
    /// of their own.
    #[named]
    pub fn from_ini_str(content: &str) -> Result<Settings> {
        let ini = Ini::load_from_str_noescape(content)
            .map_err(Error::from)
            .add_fn_name(function_path!())?;

        ini.iter()
            .try_fold(Settings::default(), |merged, (section, properties)| {
                let values = properties
                    .iter()
                    .try_fold(Settings::default(), |values, (key, value)| {
                        values.with_value(key, value)
                    })
                    .add_msg(format!("Invalid section {:?}", section.unwrap_or_default()))?;
                Ok(merged.merge(values))
            })
    }

    /// Sets the field named by an INI key from its textual value.
    fn with_value(mut self, key: &str, value: &str) -> Result<Settings> {
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "prefix" => self.prefix = Some(value.to_string()),
            "num_backups" => {
                self.num_backups = Some(value.parse().map_err(|e: std::num::ParseIntError| {
                    Error::invalid_setting(key, value, e.to_string())
                })?)
            }
            "rsync_bin" => self.rsync_bin = Some(value.to_string()),
            "rsync_flags" => self.rsync_flags = Some(value.to_string()),
            "ssh_bin" => self.ssh_bin = Some(value.to_string()),
            "src" => self.src = Some(PathBuf::from(value)),
            "exclude" => self.exclude = Some(PathBuf::from(value)),
            "dest" => self.dest = Some(value.to_string()),
            "user" => self.user = Some(value.to_string()),
            "host" => self.host = Some(value.to_string()),
            "ssh_key" => self.ssh_key = Some(PathBuf::from(value)),
            "dry_run" => self.dry_run = Some(parse_flag(key, value)?),
            "link_dest" => self.link_dest = Some(parse_flag(key, value)?),
            "create_dest" => self.create_dest = Some(parse_flag(key, value)?),
            _ => return Err(Error::invalid_setting(key, value, "unknown key")),
        }
        Ok(self)
    }

    /// Parses one YAML configuration file, flattening its sections in order.
    #[named]
    pub fn from_yaml_str(content: &str) -> Result<Settings> {
        if content.trim().is_empty() {
            return Ok(Settings::default());
        }

        let sections: serde_yml::Mapping = serde_yml::from_str(content)
            .map_err(Error::from)
            .add_fn_name(function_path!())?;

        sections
            .into_iter()
            .try_fold(Settings::default(), |merged, (section, values)| {
                let values = if values.is_null() {
                    Settings::default()
                } else {
                    serde_yml::from_value::<Settings>(values)
                        .map_err(Error::from)
                        .add_msg(format!("Invalid section {:?}", section))?
                };
                Ok(merged.merge(values))
            })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Settings> {
        let path = path.as_ref();
        std::fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|content| match ConfigFormat::from_path(path) {
                ConfigFormat::Ini => Settings::from_ini_str(&content),
                ConfigFormat::Yaml => Settings::from_yaml_str(&content),
            })
            .add_msg(format!("Read config file failed: {:?}", path))
    }

    /// Builds the run configuration; missing required values are left empty for
    /// validation to report.
    pub fn into_config(self) -> BackupConfig {
        BackupConfig::builder()
            .source_path(self.src.unwrap_or_default())
            .maybe_exclude_file_path(self.exclude)
            .destination_path(self.dest.unwrap_or_default())
            .remote_host(self.host.unwrap_or_default())
            .remote_user(self.user.unwrap_or_default())
            .maybe_remote_key_path(self.ssh_key)
            .maybe_transfer_bin_path(self.rsync_bin)
            .maybe_transfer_flags(self.rsync_flags)
            .maybe_transport_bin_path(self.ssh_bin)
            .maybe_retention_count(self.num_backups)
            .maybe_name_prefix(self.prefix)
            .maybe_dry_run(self.dry_run)
            .maybe_link_dest(self.link_dest)
            .maybe_create_dest(self.create_dest)
            .build()
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(Error::invalid_setting(key, value, "expected yes/no, true/false, on/off or 1/0")),
    }
}

/// Default locations, lowest priority first.
pub fn default_config_files() -> Vec<PathBuf> {
    let mut files = vec![PathBuf::from(SYSTEM_CONFIG_FILE)];
    if let Some(base_dirs) = BaseDirs::new() {
        files.push(base_dirs.home_dir().join(USER_CONFIG_FILE_NAME));
    }
    files
}

/// Reads `candidates` that exist, then `explicit`, which must exist.
///
/// Returns the merged settings and the files that were actually read.
pub fn load_settings<P: AsRef<Path>>(
    candidates: &[PathBuf],
    explicit: Option<P>,
) -> Result<(Settings, Vec<PathBuf>)> {
    let mut files = candidates
        .iter()
        .filter(|p| p.is_file())
        .cloned()
        .collect::<Vec<_>>();
    if let Some(explicit) = explicit {
        files.push(explicit.as_ref().to_path_buf());
    }

    let mut merged = Settings::default();
    for file in &files {
        tracing::debug!("Reading config file {:?}", file);
        merged = merged.merge(Settings::from_file(file)?);
    }

    Ok((merged, files))
}
