//! Remote secret manager provider.
//!
//! Reads the latest version of a secret through the `gcloud` CLI:
//!
//! ```bash
//! gcloud secrets versions access latest --secret=<name> --project=<project>
//! ```
//!
//! ## Requirements
//!
//! - `gcloud` CLI installed and authenticated
//! - `roles/secretmanager.secretAccessor` on the project
//!
//! Each lookup is bounded by a timeout and retried once on transient failure
//! (timeout, spawn failure, or an UNAVAILABLE / DEADLINE_EXCEEDED / INTERNAL
//! status). The timeout covers collecting output too, so a descendant that
//! keeps a pipe open after the CLI exits cannot stall the lookup.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};
use zeroize::Zeroizing;

use super::{AbsenceReason, Lookup, Provider};
use crate::core::constants::REMOTE_TIMEOUT_SECS;
use crate::error::Result;

const DEFAULT_PROGRAM: &str = "gcloud";
const MAX_ATTEMPTS: usize = 2;
const POLL_INTERVAL: Duration = Duration::from_millis(25);
const TRANSIENT_MARKERS: [&str; 3] = ["UNAVAILABLE", "DEADLINE_EXCEEDED", "INTERNAL"];

/// Secret provider backed by a remote secret manager.
#[derive(Debug, Clone)]
pub struct RemoteSecrets {
    project_id: Option<String>,
    program: String,
    timeout: Duration,
}

/// Result of one CLI invocation.
enum Attempt {
    Success(Zeroizing<Vec<u8>>),
    Failed(String),
    TimedOut,
    SpawnFailed(std::io::Error),
}

impl Attempt {
    fn is_transient(&self) -> bool {
        match self {
            Attempt::TimedOut | Attempt::SpawnFailed(_) => true,
            Attempt::Failed(stderr) => TRANSIENT_MARKERS.iter().any(|m| stderr.contains(m)),
            Attempt::Success(_) => false,
        }
    }
}

impl RemoteSecrets {
    /// Provider for `project_id`. Lookups report `NoProjectId` when it is
    /// `None` or empty.
    pub fn new(project_id: Option<String>) -> Self {
        Self {
            project_id: project_id.filter(|p| !p.trim().is_empty()),
            program: DEFAULT_PROGRAM.to_string(),
            timeout: Duration::from_secs(REMOTE_TIMEOUT_SECS),
        }
    }

    /// Use a different CLI binary (name on `PATH` or a path).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Whether the CLI binary can be found.
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    fn run_once(&self, secret: &str, project: &str) -> Attempt {
        let spawned = Command::new(&self.program)
            .args([
                "secrets",
                "versions",
                "access",
                "latest",
                &format!("--secret={}", secret),
                &format!("--project={}", project),
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => return Attempt::SpawnFailed(e),
        };

        // Drain pipes off-thread so a chatty child cannot block on a full pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = match wait_with_deadline(&mut child, deadline) {
            Ok(Some(status)) => status,
            Ok(None) => return Attempt::TimedOut,
            Err(e) => return Attempt::SpawnFailed(e),
        };

        let (Some(stdout), Some(stderr)) = (collect(&stdout, deadline), collect(&stderr, deadline))
        else {
            debug!(program = %self.program, "output pipe held open past the deadline");
            return Attempt::TimedOut;
        };
        let stdout = Zeroizing::new(stdout);

        if status.success() {
            Attempt::Success(stdout)
        } else {
            Attempt::Failed(String::from_utf8_lossy(&stderr).trim().to_string())
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        let _ = tx.send(buf);
    });
    rx
}

/// Output of a drained pipe, or `None` if it is still open at `deadline`.
///
/// Always allows one poll interval so output of a child that exited right at
/// the deadline is not lost.
fn collect(pipe: &Receiver<Vec<u8>>, deadline: Instant) -> Option<Vec<u8>> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    pipe.recv_timeout(remaining.max(POLL_INTERVAL)).ok()
}

/// Wait for `child` until `deadline`. Kills it and returns `None` on timeout.
fn wait_with_deadline(
    child: &mut Child,
    deadline: Instant,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

impl Provider for RemoteSecrets {
    fn lookup(&self, key: &str) -> Result<Lookup> {
        let Some(project) = self.project_id.as_deref() else {
            return Ok(Lookup::absent(
                AbsenceReason::NoProjectId,
                "no project configured for the remote secret manager",
            ));
        };

        if !self.is_available() {
            return Ok(Lookup::absent(
                AbsenceReason::ToolMissing,
                format!("'{}' not found on PATH", self.program),
            ));
        }

        let mut attempt = self.run_once(key, project);
        for retry in 1..MAX_ATTEMPTS {
            if !attempt.is_transient() {
                break;
            }
            warn!(secret = key, retry, "transient remote secret failure, retrying");
            attempt = self.run_once(key, project);
        }

        let lookup = match attempt {
            Attempt::Success(bytes) => match String::from_utf8(bytes.to_vec()) {
                Ok(value) => {
                    trace!(secret = key, project, "fetched remote secret");
                    return Ok(Lookup::Found(Zeroizing::new(value)));
                }
                Err(_) => Lookup::absent(
                    AbsenceReason::Remote,
                    format!("secret '{}' is not valid UTF-8", key),
                ),
            },
            Attempt::Failed(stderr) if stderr.contains("NOT_FOUND") => Lookup::absent(
                AbsenceReason::NotFound,
                format!("secret '{}' does not exist in project '{}'", key, project),
            ),
            Attempt::Failed(stderr) if stderr.contains("PERMISSION_DENIED") => Lookup::absent(
                AbsenceReason::PermissionDenied,
                format!("access to '{}' in project '{}' denied", key, project),
            ),
            Attempt::Failed(stderr) => Lookup::absent(
                AbsenceReason::Remote,
                format!("{} failed: {}", self.program, stderr),
            ),
            Attempt::TimedOut => Lookup::absent(
                AbsenceReason::Remote,
                format!(
                    "{} timed out after {}s",
                    self.program,
                    self.timeout.as_secs_f32()
                ),
            ),
            Attempt::SpawnFailed(e) => Lookup::absent(
                AbsenceReason::Remote,
                format!("failed to run {}: {}", self.program, e),
            ),
        };

        debug!(secret = key, project, "remote secret unavailable");
        Ok(lookup)
    }

    fn name(&self) -> &'static str {
        "google"
    }
}
