/// Long-running operations: driver backup and install, service control.
///
/// Each action runs its external tool on a dedicated thread and reports
/// exactly one [`ActionOutcome`] through a channel. Callers poll the
/// [`ActionHandle`] at [`ACTION_POLL_INTERVAL`] and may cancel, which kills
/// the child process.
use crate::error::{Error, Result};
use crate::platform::command::{spawn, supervise, CommandOutput};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// How often callers are expected to check a running action.
pub const ACTION_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// `ERROR_SUCCESS_REBOOT_REQUIRED`.
pub const REBOOT_EXIT_CODE: i32 = 3010;

/// Result of a finished action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
    pub requires_reboot: bool,
}

impl ActionOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            requires_reboot: false,
        }
    }
}

/// The supported actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    /// Export every third-party driver package into `destination`.
    BackupDrivers { destination: PathBuf },
    /// Stage and install one `.inf`.
    InstallDriver { inf: PathBuf },
    /// Stage and install every `.inf` below `folder`.
    InstallDriverFolder { folder: PathBuf },
    StartService { name: String },
    StopService { name: String },
    RestartService { name: String },
}

impl ActionKind {
    pub fn describe(&self) -> String {
        match self {
            Self::BackupDrivers { destination } => {
                format!("Driver backup to {}", destination.display())
            }
            Self::InstallDriver { inf } => format!("Driver install from {}", inf.display()),
            Self::InstallDriverFolder { folder } => {
                format!("Driver install from folder {}", folder.display())
            }
            Self::StartService { name } => format!("Start service {name}"),
            Self::StopService { name } => format!("Stop service {name}"),
            Self::RestartService { name } => format!("Restart service {name}"),
        }
    }

    /// Check arguments before anything is spawned.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::BackupDrivers { destination } => {
                if destination.as_os_str().is_empty() {
                    return Err(Error::ActionFailed("no backup destination given".into()));
                }
                if destination.is_file() {
                    return Err(Error::ActionFailed(format!(
                        "{} is a file, not a folder",
                        destination.display()
                    )));
                }
            }
            Self::InstallDriver { inf } => {
                let is_inf = inf
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("inf"));
                if !is_inf {
                    return Err(Error::ActionFailed(format!(
                        "{} is not an .inf file",
                        inf.display()
                    )));
                }
                if !inf.is_file() {
                    return Err(Error::ActionFailed(format!("{} not found", inf.display())));
                }
            }
            Self::InstallDriverFolder { folder } => {
                if !folder.is_dir() {
                    return Err(Error::ActionFailed(format!(
                        "{} is not a folder",
                        folder.display()
                    )));
                }
            }
            Self::StartService { name } | Self::StopService { name } | Self::RestartService { name } => {
                if name.trim().is_empty() {
                    return Err(Error::ActionFailed("no service name given".into()));
                }
            }
        }
        Ok(())
    }

    /// Program and arguments that carry out the action.
    #[cfg(windows)]
    fn command(&self) -> Result<(String, Vec<String>)> {
        use crate::platform::command::{ps_quote, PNPUTIL_EXE, POWERSHELL_EXE};

        let pnputil = |args: Vec<String>| Ok((PNPUTIL_EXE.to_string(), args));
        let powershell = |script: String| {
            Ok((
                POWERSHELL_EXE.to_string(),
                vec![
                    "-NoProfile".to_string(),
                    "-NonInteractive".to_string(),
                    "-Command".to_string(),
                    script,
                ],
            ))
        };
        match self {
            Self::BackupDrivers { destination } => pnputil(vec![
                "/export-driver".into(),
                "*".into(),
                destination.display().to_string(),
            ]),
            Self::InstallDriver { inf } => pnputil(vec![
                "/add-driver".into(),
                inf.display().to_string(),
                "/install".into(),
            ]),
            Self::InstallDriverFolder { folder } => pnputil(vec![
                "/add-driver".into(),
                folder.join("*.inf").display().to_string(),
                "/subdirs".into(),
                "/install".into(),
            ]),
            Self::StartService { name } => powershell(format!(
                "Start-Service -Name {} -ErrorAction Stop",
                ps_quote(name)
            )),
            Self::StopService { name } => powershell(format!(
                "Stop-Service -Name {} -Force -ErrorAction Stop",
                ps_quote(name)
            )),
            Self::RestartService { name } => powershell(format!(
                "Restart-Service -Name {} -Force -ErrorAction Stop",
                ps_quote(name)
            )),
        }
    }

    #[cfg(not(windows))]
    fn command(&self) -> Result<(String, Vec<String>)> {
        Err(Error::Unsupported("driver and service actions"))
    }
}

/// Handle to a running action.
pub struct ActionHandle {
    description: String,
    outcome_rx: Receiver<ActionOutcome>,
    cancel_flag: Arc<AtomicBool>,
    _thread: Option<thread::JoinHandle<()>>,
}

impl ActionHandle {
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Wait up to `timeout` for the outcome.
    ///
    /// Returns `None` while the action is still running. If the worker
    /// thread vanished without reporting, a failed outcome is returned.
    pub fn poll(&self, timeout: Duration) -> Option<ActionOutcome> {
        match self.outcome_rx.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(ActionOutcome::failed(format!(
                "{} ended without a result",
                self.description
            ))),
        }
    }

    /// Kill the child process; the outcome reports the cancellation.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    /// Block until the outcome arrives, calling `on_tick` after every
    /// poll interval.
    pub fn wait<F: FnMut()>(&self, mut on_tick: F) -> ActionOutcome {
        loop {
            if let Some(outcome) = self.poll(ACTION_POLL_INTERVAL) {
                return outcome;
            }
            on_tick();
        }
    }
}

/// Validate and start `kind` on a background thread.
pub fn start_action(kind: ActionKind) -> Result<ActionHandle> {
    kind.validate()?;
    if let ActionKind::BackupDrivers { destination } = &kind {
        std::fs::create_dir_all(destination)?;
    }
    let (program, args) = kind.command()?;
    start_command(kind.describe(), program, args)
}

/// Run an arbitrary program as an action.
pub fn start_command(
    description: String,
    program: String,
    args: Vec<String>,
) -> Result<ActionHandle> {
    let (tx, outcome_rx) = crossbeam_channel::bounded(1);
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let cancel = cancel_flag.clone();
    let label = description.clone();

    let thread = thread::Builder::new()
        .name("hostsleuth-action".into())
        .spawn(move || {
            info!("{label}: starting");
            let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
            let result = spawn(&program, &arg_refs)
                .and_then(|child| supervise(child, &label, None, Some(&cancel)));
            let outcome = match result {
                Ok(output) => interpret_output(&label, &output),
                Err(Error::Cancelled(_)) => ActionOutcome::failed(format!("{label} cancelled")),
                Err(e) => ActionOutcome::failed(format!("{label} failed: {e}")),
            };
            if outcome.success {
                info!("{}", outcome.message);
            } else {
                warn!("{}", outcome.message);
            }
            let _ = tx.send(outcome);
        })?;

    Ok(ActionHandle {
        description,
        outcome_rx,
        cancel_flag,
        _thread: Some(thread),
    })
}

/// Classify a finished process. Exit code 3010 and any mention of
/// "reboot" in the output mean a restart is needed.
pub fn interpret_output(label: &str, output: &CommandOutput) -> ActionOutcome {
    let text = output.combined();
    let requires_reboot =
        output.exit_code == Some(REBOOT_EXIT_CODE) || text.to_lowercase().contains("reboot");
    let success = matches!(output.exit_code, Some(0) | Some(REBOOT_EXIT_CODE));

    let mut message = if success {
        format!("{label} completed")
    } else {
        let code = output
            .exit_code
            .map_or_else(|| "terminated".to_string(), |c| format!("exit code {c}"));
        match last_line(&text) {
            Some(line) => format!("{label} failed ({code}): {line}"),
            None => format!("{label} failed ({code})"),
        }
    };
    if success && requires_reboot {
        message.push_str("; a reboot is required");
    }
    ActionOutcome {
        success,
        message,
        requires_reboot,
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}

/// Whether `path` looks like a driver package folder (contains an `.inf`).
pub fn folder_has_inf(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|entries| {
            entries.filter_map(|e| e.ok()).any(|e| {
                e.path()
                    .extension()
                    .and_then(|x| x.to_str())
                    .is_some_and(|x| x.eq_ignore_ascii_case("inf"))
            })
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(code: Option<i32>, stdout: &str) -> CommandOutput {
        CommandOutput {
            exit_code: code,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    #[test]
    fn exit_3010_requires_reboot() {
        let o = interpret_output("Driver install", &output(Some(3010), "Added driver packages: 1"));
        assert!(o.success);
        assert!(o.requires_reboot);
        assert_eq!(o.message, "Driver install completed; a reboot is required");
    }

    #[test]
    fn reboot_text_is_detected() {
        let o = interpret_output(
            "Driver install",
            &output(Some(0), "System reboot is needed to complete install operations!"),
        );
        assert!(o.success && o.requires_reboot);
    }

    #[test]
    fn failure_reports_last_line() {
        let o = interpret_output(
            "Start service Foo",
            &output(Some(1), "line one\nCannot start service Foo.\n"),
        );
        assert!(!o.success);
        assert!(!o.requires_reboot);
        assert_eq!(
            o.message,
            "Start service Foo failed (exit code 1): Cannot start service Foo."
        );
        let killed = interpret_output("X", &output(None, ""));
        assert_eq!(killed.message, "X failed (terminated)");
    }

    #[test]
    fn validation_rejects_bad_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("driver.txt");
        std::fs::write(&txt, "x").unwrap();

        assert!(ActionKind::InstallDriver { inf: txt.clone() }.validate().is_err());
        assert!(ActionKind::InstallDriver {
            inf: dir.path().join("missing.inf")
        }
        .validate()
        .is_err());
        assert!(ActionKind::InstallDriverFolder {
            folder: txt.clone()
        }
        .validate()
        .is_err());
        assert!(ActionKind::BackupDrivers { destination: txt }.validate().is_err());
        assert!(ActionKind::StopService { name: " ".into() }.validate().is_err());

        let inf = dir.path().join("net.INF");
        std::fs::write(&inf, "[Version]").unwrap();
        assert!(ActionKind::InstallDriver { inf }.validate().is_ok());
        assert!(folder_has_inf(dir.path()));
    }

    #[cfg(unix)]
    #[test]
    fn command_outcome_arrives_through_handle() {
        let handle = start_command(
            "Echo".into(),
            "sh".into(),
            vec!["-c".into(), "echo done".into()],
        )
        .unwrap();
        let outcome = handle.wait(|| {});
        assert!(outcome.success);
        assert_eq!(outcome.message, "Echo completed");
    }

    #[cfg(unix)]
    #[test]
    fn cancel_kills_the_child() {
        let handle = start_command(
            "Sleep".into(),
            "sh".into(),
            vec!["-c".into(), "exec sleep 30".into()],
        )
        .unwrap();
        assert!(handle.poll(Duration::from_millis(100)).is_none());
        handle.cancel();
        let outcome = handle.wait(|| {});
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Sleep cancelled");
    }

    #[cfg(unix)]
    #[test]
    fn missing_program_is_a_failed_outcome() {
        let handle = start_command(
            "Ghost".into(),
            "/nonexistent/hostsleuth-tool".into(),
            Vec::new(),
        )
        .unwrap();
        let outcome = handle.wait(|| {});
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Ghost failed:"));
    }
}
