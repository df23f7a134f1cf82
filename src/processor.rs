//! The per-item processing seam.
//!
//! The engine calls [`ItemProcessor::process`] once per attempt; a call may be
//! repeated up to `retry + 1` times for the same item, so implementations must
//! tolerate being re-run.

use std::ffi::OsString;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{ConfigError, ProcessError};
use crate::node::Item;

#[allow(async_fn_in_trait)]
pub trait ItemProcessor {
    async fn process(&self, item: &Item) -> Result<(), ProcessError>;
}

impl<F, Fut> ItemProcessor for F
where
    F: Fn(Item) -> Fut,
    Fut: Future<Output = Result<(), ProcessError>>,
{
    async fn process(&self, item: &Item) -> Result<(), ProcessError> {
        self(item.clone()).await
    }
}

/// Runs an external program for every item.
///
/// The item's absolute path is appended as the last argument, and both the
/// relative name and the path are exported as `FSEE_NAME` / `FSEE_PATH`.
/// A non-zero exit status is a failure.
#[derive(Debug, Clone)]
pub struct CommandProcessor {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandProcessor {
    pub fn new(program: impl Into<OsString>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    /// Resolves the program the way a shell would: a path is checked as
    /// given, a bare name is looked up on `PATH`.
    pub fn locate(&self) -> Result<PathBuf, ConfigError> {
        which::which(&self.program).map_err(|_| ConfigError::ProcessorNotFound {
            program: self.program.to_string_lossy().into_owned(),
        })
    }

    /// Human-readable command line, used as part of the task identity.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ItemProcessor for CommandProcessor {
    async fn process(&self, item: &Item) -> Result<(), ProcessError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&item.path)
            .env("FSEE_NAME", &item.name)
            .env("FSEE_PATH", &item.path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if output.status.success() {
            return Ok(());
        }
        Err(ProcessError::Exit {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str) -> Item {
        Item {
            name: name.to_string(),
            path: PathBuf::from("/tmp").join(name),
        }
    }

    #[tokio::test]
    async fn closures_are_processors() {
        let processor = |item: Item| async move {
            if item.name == "bad" {
                Err(ProcessError::failed("rejected"))
            } else {
                Ok(())
            }
        };
        assert!(processor.process(&item("good")).await.is_ok());
        assert!(processor.process(&item("bad")).await.is_err());
    }

    #[test]
    fn display_joins_program_and_args() {
        let processor = CommandProcessor::new("gzip", vec!["-k".into(), "-9".into()]);
        assert_eq!(processor.display(), "gzip -k -9");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_success_and_failure() {
        let ok = CommandProcessor::new("sh", vec!["-c".into(), "test -n \"$FSEE_NAME\"".into()]);
        assert!(ok.process(&item("a")).await.is_ok());

        let failing = CommandProcessor::new(
            "sh",
            vec!["-c".into(), "echo \"no $FSEE_NAME\" >&2; exit 4".into()],
        );
        match failing.process(&item("a")).await {
            Err(ProcessError::Exit { code, stderr }) => {
                assert_eq!(code, Some(4));
                assert_eq!(stderr, "no a");
            }
            other => panic!("expected exit failure, got {other:?}"),
        }
    }

    #[test]
    fn locate_rejects_unknown_programs() {
        let missing = CommandProcessor::new("fsee-definitely-not-a-program", Vec::new());
        assert_eq!(
            missing.locate(),
            Err(ConfigError::ProcessorNotFound {
                program: "fsee-definitely-not-a-program".into()
            })
        );

        let dir = tempfile::tempdir().unwrap();
        let by_path = CommandProcessor::new(dir.path().join("nope"), Vec::new());
        assert!(by_path.locate().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn locate_finds_programs_on_path() {
        let sh = CommandProcessor::new("sh", Vec::new());
        assert!(sh.locate().unwrap().is_absolute());
    }

    #[tokio::test]
    async fn missing_program_is_io_error() {
        let processor = CommandProcessor::new("fsee-definitely-not-a-program", Vec::new());
        assert!(matches!(
            processor.process(&item("a")).await,
            Err(ProcessError::Io(_))
        ));
    }
}
