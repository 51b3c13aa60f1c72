/// External command execution with a bounded wait.
///
/// Every inventory source and long-running action ends up spawning a system
/// tool (PowerShell, `sc.exe`, `pnputil.exe`). Tools are addressed by
/// absolute path so a writable directory on `PATH` cannot shadow them.
use crate::error::{Error, Result};
use serde_json::Value;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

#[cfg(windows)]
pub(crate) const POWERSHELL_EXE: &str =
    r"C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe";
#[cfg(windows)]
pub(crate) const SC_EXE: &str = r"C:\Windows\System32\sc.exe";
#[cfg(windows)]
pub(crate) const PNPUTIL_EXE: &str = r"C:\Windows\System32\pnputil.exe";
#[cfg(windows)]
pub(crate) const WINGET_EXE: &str = "winget.exe";

/// Upper bound for any single inventory or per-item query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Interval between child-process liveness checks.
const WAIT_POLL: Duration = Duration::from_millis(50);

/// Captured result of a finished process.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr, trimmed.
    pub fn combined(&self) -> String {
        let out = self.stdout.trim();
        let err = self.stderr.trim();
        match (out.is_empty(), err.is_empty()) {
            (true, _) => err.to_string(),
            (false, true) => out.to_string(),
            (false, false) => format!("{out}\n{err}"),
        }
    }
}

/// Spawn `program` with piped output and no console input.
pub fn spawn(program: &str, args: &[&str]) -> Result<Child> {
    debug!("Spawning {program} {}", args.join(" "));
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    Ok(child)
}

/// Wait for `child`, killing it when `timeout` elapses or `cancel` is set.
///
/// Output pipes are drained on helper threads so a chatty child cannot
/// block on a full pipe while we wait.
pub fn supervise(
    mut child: Child,
    what: &str,
    timeout: Option<Duration>,
    cancel: Option<&AtomicBool>,
) -> Result<CommandOutput> {
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);
    let started = Instant::now();

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Cancelled(what.to_string()));
        }
        if let Some(limit) = timeout {
            if started.elapsed() >= limit {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::QueryTimeout {
                    what: what.to_string(),
                    secs: limit.as_secs(),
                });
            }
        }
        thread::sleep(WAIT_POLL);
    };

    Ok(CommandOutput {
        exit_code: status.code(),
        stdout: stdout.map(join_drain).unwrap_or_default(),
        stderr: stderr.map(join_drain).unwrap_or_default(),
    })
}

/// Run a command to completion under `timeout`.
pub fn run_with_timeout(
    program: &str,
    args: &[&str],
    what: &str,
    timeout: Duration,
) -> Result<CommandOutput> {
    let child = spawn(program, args)?;
    supervise(child, what, Some(timeout), None)
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_drain(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

/// Run a PowerShell script and return its trimmed stdout.
///
/// A non-zero exit status is a [`Error::QueryFailed`] carrying stderr.
#[cfg(windows)]
pub fn run_powershell(script: &str, what: &str, timeout: Duration) -> Result<String> {
    let output = run_with_timeout(
        POWERSHELL_EXE,
        &["-NoProfile", "-NonInteractive", "-Command", script],
        what,
        timeout,
    )?;
    if !output.success() {
        return Err(Error::query(what, output.stderr.trim()));
    }
    Ok(output.stdout.trim().to_string())
}

#[cfg(not(windows))]
pub fn run_powershell(script: &str, what: &str, timeout: Duration) -> Result<String> {
    let _ = (script, what, timeout);
    Err(Error::Unsupported("PowerShell"))
}

/// Split `ConvertTo-Json` output into rows.
///
/// PowerShell emits a bare object for a single result and nothing at all
/// for zero results; both are normalised to a vector here.
pub fn json_rows(raw: &str) -> Result<Vec<Value>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    Ok(match serde_json::from_str::<Value>(raw)? {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        single => vec![single],
    })
}

/// String field of a JSON row; numbers and booleans are rendered, null and
/// missing become empty.
pub fn json_str(row: &Value, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Boolean field of a JSON row; accepts `true`, `1` and `"True"`.
pub fn json_bool(row: &Value, key: &str) -> bool {
    match row.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|v| v != 0),
        Some(Value::String(s)) => crate::model::record::parse_bool(s),
        _ => false,
    }
}

/// Quote a value for embedding in a single-quoted PowerShell string.
pub fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
