// Scoped external processes: spawn, stream output, await with a deadline, kill on every exit path

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use log::{Level, debug, log, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::constants::OUTPUT_TAIL_LINES;
use crate::error::{ProvisionError, ProvisionResult};
use crate::reporter::Reporter;

/// How a finished process ended, plus the last lines it printed.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub tail: Vec<String>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turn a non-zero exit into `BuildToolFailed` for `tool`.
    pub fn require_success(self, tool: &str) -> ProvisionResult<Vec<String>> {
        if self.success() {
            Ok(self.tail)
        } else {
            Err(ProvisionError::BuildToolFailed {
                tool: tool.to_string(),
                exit_code: self.exit_code,
                output_tail: self.tail,
            })
        }
    }
}

/// One external command with its working directory and deadline.
#[derive(Debug, Clone)]
pub struct ScopedProcess {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
    label: String,
    log_level: Level,
}

impl ScopedProcess {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        let program = program.into();
        let label = program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.display().to_string());
        Self {
            program,
            args: Vec::new(),
            working_dir: None,
            timeout,
            label,
            log_level: Level::Info,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Name used in logs and errors, e.g. "BuildTools"
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Level output lines are logged at (probes use debug)
    pub fn log_level(mut self, level: Level) -> Self {
        self.log_level = level;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run to completion. Every output line goes to `reporter` and the log; the last
    /// lines are kept for diagnostics. Dropping the returned future kills the child.
    pub async fn run(&self, reporter: &dyn Reporter) -> ProvisionResult<ProcessOutput> {
        debug!("Running {:?} {:?}", self.program, self.args);

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| ProvisionError::io(&self.program, e))?;
        let mut group = GroupKill::new(&child, &self.label);
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut tail = VecDeque::with_capacity(OUTPUT_TAIL_LINES);

        let work = async {
            let mut out = stdout.map(BufReader::new);
            let mut err = stderr.map(BufReader::new);
            let mut out_buf = Vec::new();
            let mut err_buf = Vec::new();

            loop {
                tokio::select! {
                    line = self.next_line(out.as_mut(), &mut out_buf), if out.is_some() => {
                        match line {
                            Some(line) => self.record(&mut tail, reporter, line),
                            None => out = None,
                        }
                    }
                    line = self.next_line(err.as_mut(), &mut err_buf), if err.is_some() => {
                        match line {
                            Some(line) => self.record(&mut tail, reporter, line),
                            None => err = None,
                        }
                    }
                    else => break,
                }
            }

            child.wait().await
        };

        let status = match tokio::time::timeout(self.timeout, work).await {
            Ok(status) => status.map_err(|e| ProvisionError::io(&self.program, e))?,
            Err(_) => {
                drop(group);
                if let Err(e) = child.kill().await {
                    debug!("Failed to kill timed out {}: {}", self.label, e);
                }
                return Err(ProvisionError::ProcessTimedOut {
                    program: self.label.clone(),
                    after: self.timeout,
                });
            }
        };
        group.disarm();

        debug!("{} exited with {:?}", self.label, status.code());
        Ok(ProcessOutput {
            exit_code: status.code(),
            tail: tail.into_iter().collect(),
        })
    }

    /// Next output line, decoded lossily. `None` once the stream is closed.
    async fn next_line<R>(&self, reader: Option<&mut R>, buf: &mut Vec<u8>) -> Option<String>
    where
        R: AsyncBufRead + Unpin,
    {
        let reader = reader?;
        buf.clear();
        match reader.read_until(b'\n', buf).await {
            Ok(0) => None,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                Some(String::from_utf8_lossy(buf).into_owned())
            }
            Err(e) => {
                warn!("Stopped reading output of {}: {}", self.label, e);
                None
            }
        }
    }

    fn record(&self, tail: &mut VecDeque<String>, reporter: &dyn Reporter, line: String) {
        log!(target: "svforge::process", self.log_level, "[{}] {}", self.label, line);
        reporter.process_line(&line);
        if tail.len() == OUTPUT_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
}

/// Kills the child's whole process group when dropped, so helpers the child spawned
/// (git, maven) go with it. Disarmed once the child exits on its own.
struct GroupKill {
    #[cfg(unix)]
    pgid: Option<i32>,
}

impl GroupKill {
    #[cfg(unix)]
    fn new(child: &tokio::process::Child, label: &str) -> Self {
        let pgid = child.id().and_then(|id| i32::try_from(id).ok());
        if pgid.is_none() {
            debug!("No process group for {}", label);
        }
        Self { pgid }
    }

    #[cfg(not(unix))]
    fn new(_child: &tokio::process::Child, _label: &str) -> Self {
        Self {}
    }

    fn disarm(&mut self) {
        #[cfg(unix)]
        {
            self.pgid = None;
        }
    }
}

impl Drop for GroupKill {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take() {
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;

            if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                debug!("Failed to kill process group {}: {}", pgid, e);
            }
        }
    }
}
