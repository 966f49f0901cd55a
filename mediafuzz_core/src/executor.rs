use crate::error::SETUP_FAILURE_EXIT_CODE;
use crate::input::Input;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::warn;

/// How long stderr may stay open once the child itself is gone.
const STDERR_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Ok,
    Timeout,
    Crash(String),
    /// The harness exited with the setup-failure status: the environment is
    /// broken, the input is not at fault.
    SetupFailure(String),
    Other(String),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stderr: Vec<u8>,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
}

impl ProcessOutput {
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub status: ExecutionStatus,
    pub output: ProcessOutput,
}

impl Execution {
    fn failed(message: String) -> Self {
        Self {
            status: ExecutionStatus::Other(message),
            output: ProcessOutput::default(),
        }
    }
}

/// Replays one input against a harness and reports how it ended.
pub trait Executor<I: Input> {
    fn execute_sync(&mut self, input: &I) -> Execution;
}

pub enum InputDelivery {
    StdIn,
    /// Input written to a temp file whose path replaces `{}` in the template,
    /// appended to the command line.
    File(String),
}

pub struct CommandExecutorConfig {
    pub command: Vec<String>,
    pub input_delivery: InputDelivery,
    pub timeout: Duration,
    pub working_dir: Option<PathBuf>,
}

/// Runs every input in a fresh child process, so an abort takes down the child
/// and not the caller.
pub struct CommandExecutor {
    config: CommandExecutorConfig,
}

impl CommandExecutor {
    pub fn new(config: CommandExecutorConfig) -> Self {
        Self { config }
    }

    fn wait_with_timeout(&self, child: &mut Child) -> Result<ExitStatus, ExecutionStatus> {
        let start_time = Instant::now();

        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {
                    if start_time.elapsed() > self.config.timeout {
                        if let Err(e) = kill_process_tree(child) {
                            return Err(ExecutionStatus::Other(format!(
                                "Failed to kill timed-out process: {e}",
                            )));
                        }
                        let _ = child.wait();
                        return Err(ExecutionStatus::Timeout);
                    }
                    thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    return Err(ExecutionStatus::Other(format!(
                        "Error waiting for child: {e}",
                    )));
                }
            }
        }
    }

    fn classify(status: ExitStatus, stderr: &[u8]) -> ExecutionStatus {
        if status.success() {
            return ExecutionStatus::Ok;
        }
        match status.code() {
            Some(SETUP_FAILURE_EXIT_CODE) => {
                let stderr = String::from_utf8_lossy(stderr);
                let reason = stderr
                    .lines()
                    .rev()
                    .find(|line| !line.trim().is_empty())
                    .unwrap_or("Exited with code 1");
                ExecutionStatus::SetupFailure(reason.to_string())
            }
            Some(code) => ExecutionStatus::Crash(format!("Exited with code {code}")),
            None => ExecutionStatus::Crash(Self::signal_description(status)),
        }
    }

    #[cfg(unix)]
    fn signal_description(status: ExitStatus) -> String {
        use std::os::unix::process::ExitStatusExt;
        match status.signal() {
            Some(signal) => format!("Terminated by signal {signal}"),
            None => "Exited abnormally".to_string(),
        }
    }

    #[cfg(not(unix))]
    fn signal_description(_status: ExitStatus) -> String {
        "Exited abnormally".to_string()
    }
}

/// Kills the child together with anything it spawned into its process group,
/// so a grandchild cannot keep the stderr pipe open.
#[cfg(unix)]
fn kill_process_tree(child: &mut Child) -> std::io::Result<()> {
    let Ok(pid) = libc::pid_t::try_from(child.id()) else {
        return child.kill();
    };
    // SAFETY: kill(2) has no memory-safety preconditions. The group id is the
    // child's pid, set at spawn and still reserved because it is unreaped.
    if unsafe { libc::kill(-pid, libc::SIGKILL) } == 0 {
        Ok(())
    } else {
        child.kill()
    }
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}

/// Collects what the reader thread captured, giving up after `grace` when
/// something outside the child's process group still holds the pipe.
fn join_stderr(reader: Option<JoinHandle<Vec<u8>>>, grace: Duration) -> Vec<u8> {
    let Some(reader) = reader else {
        return Vec::new();
    };
    let deadline = Instant::now() + grace;
    while !reader.is_finished() {
        if Instant::now() >= deadline {
            warn!("stderr of the harness child is still open, dropping its capture");
            return Vec::new();
        }
        thread::sleep(Duration::from_millis(5));
    }
    reader.join().unwrap_or_default()
}

fn drain_stderr(child: &mut Child) -> Option<JoinHandle<Vec<u8>>> {
    let mut stderr = child.stderr.take()?;
    Some(thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf);
        buf
    }))
}

impl<I: Input> Executor<I> for CommandExecutor {
    fn execute_sync(&mut self, input: &I) -> Execution {
        let Some((program, args)) = self.config.command.split_first() else {
            return Execution::failed("Empty command".to_string());
        };
        let mut cmd = Command::new(program);
        cmd.args(args);

        if let Some(cwd) = &self.config.working_dir {
            cmd.current_dir(cwd);
        }

        // Kept alive until the child has exited.
        let mut temp_file_handle: Option<tempfile::NamedTempFile> = None;

        match &self.config.input_delivery {
            InputDelivery::StdIn => {
                cmd.stdin(Stdio::piped());
            }
            InputDelivery::File(arg_template) => {
                let named_temp_file = match tempfile::NamedTempFile::new() {
                    Ok(f) => f,
                    Err(e) => return Execution::failed(format!("Failed to create temp file: {e}")),
                };
                if let Err(e) = File::create(named_temp_file.path())
                    .and_then(|mut f| f.write_all(input.as_bytes()))
                {
                    return Execution::failed(format!(
                        "Failed to write to temp file {:?}: {}",
                        named_temp_file.path(),
                        e
                    ));
                }

                let Some(path_str) = named_temp_file.path().to_str() else {
                    return Execution::failed("Temp file path is not valid UTF-8".to_string());
                };
                for part in arg_template.split_whitespace() {
                    cmd.arg(part.replace("{}", path_str));
                }
                cmd.stdin(Stdio::null());
                temp_file_handle = Some(named_temp_file);
            }
        }

        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return Execution::failed(format!(
                    "Failed to spawn command '{:?}': {}",
                    self.config.command, e
                ));
            }
        };
        let stderr_reader = drain_stderr(&mut child);

        if let Some(mut child_stdin) = child.stdin.take() {
            match child_stdin.write_all(input.as_bytes()) {
                // The child stopped reading early, typically because it
                // crashed; its exit status tells the rest.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                Err(e) => {
                    let _ = kill_process_tree(&mut child);
                    let _ = child.wait();
                    return Execution::failed(format!("Failed to write to stdin: {e}"));
                }
                Ok(()) => {}
            }
        }

        let wait_result = self.wait_with_timeout(&mut child);
        let stderr = join_stderr(stderr_reader, STDERR_GRACE);
        drop(temp_file_handle);

        let mut output = ProcessOutput {
            stderr,
            ..ProcessOutput::default()
        };
        let status = match wait_result {
            Ok(exit_status) => {
                output.exit_code = exit_status.code();
                #[cfg(unix)]
                {
                    use std::os::unix::process::ExitStatusExt;
                    output.signal = exit_status.signal();
                }
                Self::classify(exit_status, &output.stderr)
            }
            Err(status) => status,
        };
        Execution { status, output }
    }
}
