//! On-disk task state: identity, resume marker and per-status logs.
//!
//! A task is identified by the parameters that change what a run produces
//! (root, processor command, traversal order), so re-running the same command
//! finds the previous marker. Everything lives under `<home>/<task-id>/`.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FseeError;
use crate::event::Event;

const TASK_FILE: &str = "task.json";
const IGNORED_LOG: &str = "ignored.log";
const IGNORED_BACKUP: &str = "ignored.bak";

/// The parameters a task id is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskKey {
    pub path: PathBuf,
    pub processor: String,
    pub directory_first: bool,
}

impl TaskKey {
    pub fn id(&self) -> Result<Uuid> {
        let canonical = serde_json::to_vec(self)?;
        Ok(Uuid::new_v5(&Uuid::NAMESPACE_OID, &canonical))
    }
}

/// Contents of `task.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMeta {
    #[serde(flatten)]
    pub key: TaskKey,
    #[serde(default)]
    pub marker: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Default home: `$FSEE_HOME`, otherwise `$HOME/.fs-traverse`.
pub fn default_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os("FSEE_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    let home = std::env::var_os("HOME").context("neither FSEE_HOME nor HOME is set")?;
    Ok(PathBuf::from(home).join(".fs-traverse"))
}

#[derive(Debug)]
pub struct TaskStore {
    dir: PathBuf,
    meta: TaskMeta,
}

impl TaskStore {
    /// Opens the task for `key` under `home`, creating it on first use.
    pub fn open(home: &Path, key: TaskKey) -> Result<Self> {
        let dir = home.join(key.id()?.to_string());
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create task directory {}", dir.display()))?;

        let file = dir.join(TASK_FILE);
        let meta = if file.exists() {
            let contents = fs::read_to_string(&file)?;
            serde_json::from_str::<TaskMeta>(&contents).map_err(|e| {
                FseeError::Task(format!("corrupt task file {}: {e}", file.display()))
            })?
        } else {
            let now = Utc::now();
            TaskMeta {
                key,
                marker: None,
                created_at: now,
                updated_at: now,
            }
        };

        let store = Self { dir, meta };
        store.save()?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn marker(&self) -> Option<&str> {
        self.meta.marker.as_deref()
    }

    pub fn set_marker(&mut self, marker: &str) -> Result<()> {
        self.meta.marker = Some(marker.to_string());
        self.meta.updated_at = Utc::now();
        self.save()
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.meta)?;
        // Write-then-rename so a crash never leaves a truncated task file.
        let tmp = self.dir.join(format!("{TASK_FILE}.tmp"));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.dir.join(TASK_FILE))?;
        Ok(())
    }

    /// Collects names ignored by earlier runs for a fill run.
    ///
    /// Names from `ignored.log` and `ignored.bak` are merged, sorted and
    /// de-duplicated, written back to `ignored.bak`, and `ignored.log` is
    /// removed so the fill run starts a fresh one.
    pub fn take_ignored(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for file in [IGNORED_LOG, IGNORED_BACKUP] {
            let path = self.dir.join(file);
            if path.exists() {
                let contents = fs::read_to_string(&path)?;
                names.extend(
                    contents
                        .lines()
                        .filter(|line| !line.is_empty())
                        .map(str::to_owned),
                );
            }
        }
        names.sort();
        names.dedup();

        fs::write(self.dir.join(IGNORED_BACKUP), names.join("\n"))?;
        let log = self.dir.join(IGNORED_LOG);
        if log.exists() {
            fs::remove_file(log)?;
        }
        Ok(names)
    }

    /// Drops the fill backup once a fill run has ended.
    pub fn clear_ignored_backup(&self) -> Result<()> {
        let path = self.dir.join(IGNORED_BACKUP);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn logs(&self) -> Result<TaskLogs> {
        TaskLogs::open(&self.dir)
    }
}

/// Append-only log files, one line per notification.
#[derive(Debug)]
pub struct TaskLogs {
    success: File,
    error: File,
    ignored: File,
    skipped: File,
    no_utf8_name: File,
}

impl TaskLogs {
    fn open(dir: &Path) -> Result<Self> {
        let open = |name: &str| -> Result<File> {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(name))
                .with_context(|| format!("failed to open log {name}"))
        };
        Ok(Self {
            success: open("success.log")?,
            error: open("error.log")?,
            ignored: open(IGNORED_LOG)?,
            skipped: open("skipped.log")?,
            no_utf8_name: open("no-utf8-name.log")?,
        })
    }

    /// Appends `event` to the log it belongs to. Retried failures and
    /// unreadable directories go to `error.log` next to final errors.
    pub fn record(&mut self, event: &Event) -> Result<()> {
        match event {
            Event::Done { name } => self.done(name),
            Event::Ignored { name } => self.ignored(name),
            Event::Skipped { name } => self.skipped(name),
            Event::Warning { name, error } | Event::Error { name, error } => {
                self.error(name, &error.to_string())
            }
            Event::NoUtf8Name { dirname, raw } => self.no_utf8_name(dirname, raw),
            Event::MoveOn { .. } | Event::End(_) => Ok(()),
        }
    }

    pub fn done(&mut self, name: &str) -> Result<()> {
        writeln!(self.success, "{name}")?;
        Ok(())
    }

    pub fn ignored(&mut self, name: &str) -> Result<()> {
        writeln!(self.ignored, "{name}")?;
        Ok(())
    }

    pub fn skipped(&mut self, name: &str) -> Result<()> {
        writeln!(self.skipped, "{name}")?;
        Ok(())
    }

    pub fn error(&mut self, name: &str, message: &str) -> Result<()> {
        writeln!(self.error, "{name}\t{message}")?;
        Ok(())
    }

    /// Logged as `<dirname>:<hex of the raw name>`.
    pub fn no_utf8_name(&mut self, dirname: &str, raw: &[u8]) -> Result<()> {
        let hex: String = raw.iter().map(|b| format!("{b:02x}")).collect();
        writeln!(self.no_utf8_name, "{dirname}:{hex}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ItemError, ProcessError};

    fn key(path: &str) -> TaskKey {
        TaskKey {
            path: PathBuf::from(path),
            processor: "gzip -k".into(),
            directory_first: false,
        }
    }

    #[test]
    fn task_id_is_stable_and_distinct() {
        assert_eq!(key("/data").id().unwrap(), key("/data").id().unwrap());
        assert_ne!(key("/data").id().unwrap(), key("/other").id().unwrap());

        let reordered = TaskKey {
            directory_first: true,
            ..key("/data")
        };
        assert_ne!(key("/data").id().unwrap(), reordered.id().unwrap());
    }

    #[test]
    fn marker_survives_reopen() {
        let home = tempfile::tempdir().unwrap();
        let mut store = TaskStore::open(home.path(), key("/data")).unwrap();
        assert!(store.marker().is_none());
        store.set_marker("c/d").unwrap();

        let store = TaskStore::open(home.path(), key("/data")).unwrap();
        assert_eq!(store.marker(), Some("c/d"));
        assert!(store.dir().join("task.json").exists());
    }

    #[test]
    fn corrupt_task_file_is_reported() {
        let home = tempfile::tempdir().unwrap();
        let store = TaskStore::open(home.path(), key("/data")).unwrap();
        fs::write(store.dir().join("task.json"), "{not json").unwrap();

        let err = TaskStore::open(home.path(), key("/data")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FseeError>(),
            Some(FseeError::Task(_))
        ));
    }

    #[test]
    fn logs_append_lines() {
        let home = tempfile::tempdir().unwrap();
        let store = TaskStore::open(home.path(), key("/data")).unwrap();
        {
            let mut logs = store.logs().unwrap();
            logs.done("a").unwrap();
            logs.done("b").unwrap();
            logs.no_utf8_name("c", &[0x66, 0xff]).unwrap();
        }
        let success = fs::read_to_string(store.dir().join("success.log")).unwrap();
        assert_eq!(success, "a\nb\n");
        let bad = fs::read_to_string(store.dir().join("no-utf8-name.log")).unwrap();
        assert_eq!(bad, "c:66ff\n");
    }

    #[test]
    fn warnings_and_errors_reach_error_log() {
        let home = tempfile::tempdir().unwrap();
        let store = TaskStore::open(home.path(), key("/data")).unwrap();
        {
            let mut logs = store.logs().unwrap();
            logs.record(&Event::Warning {
                name: "a".into(),
                error: ItemError::Process {
                    attempt: 1,
                    source: ProcessError::failed("busy"),
                },
            })
            .unwrap();
            logs.record(&Event::Warning {
                name: "c".into(),
                error: ItemError::Unreadable {
                    path: PathBuf::from("/data/c"),
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                },
            })
            .unwrap();
            logs.record(&Event::Error {
                name: "a".into(),
                error: ItemError::Process {
                    attempt: 2,
                    source: ProcessError::failed("gone"),
                },
            })
            .unwrap();
            logs.record(&Event::MoveOn { marker: "a".into() }).unwrap();
        }
        let errors = fs::read_to_string(store.dir().join("error.log")).unwrap();
        let lines: Vec<&str> = errors.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "a\tattempt 1: busy");
        assert!(lines[1].starts_with("c\tcannot read /data/c"));
        assert_eq!(lines[2], "a\tattempt 2: gone");
    }

    #[test]
    fn take_ignored_merges_and_backs_up() {
        let home = tempfile::tempdir().unwrap();
        let store = TaskStore::open(home.path(), key("/data")).unwrap();
        fs::write(store.dir().join("ignored.log"), "b\na\n\nb\n").unwrap();
        fs::write(store.dir().join("ignored.bak"), "c\na").unwrap();

        let names = store.take_ignored().unwrap();
        assert_eq!(names, ["a", "b", "c"]);
        assert!(!store.dir().join("ignored.log").exists());
        let backup = fs::read_to_string(store.dir().join("ignored.bak")).unwrap();
        assert_eq!(backup, "a\nb\nc");

        store.clear_ignored_backup().unwrap();
        assert!(!store.dir().join("ignored.bak").exists());
    }
}
