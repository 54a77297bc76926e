use super::model::{CommandResult, Verdict};
use async_trait::async_trait;
use derive_builder::Builder;
use std::{collections::HashMap, path::PathBuf, process::Stdio, time::Duration};
use tokio::{io::AsyncReadExt, process::Command};

#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;

/// How a command should be run.
#[derive(Debug, Clone, Default, Builder)]
#[builder(setter(into, strip_option))]
pub struct RunOptions {
    /// Working directory of the spawned command.
    pub cwd: PathBuf,

    /// Wall-clock budget. `None` waits forever.
    #[builder(default)]
    pub timeout: Option<Duration>,

    /// Replacement environment. `None` inherits the parent environment.
    #[builder(default)]
    pub env: Option<HashMap<String, String>>,
}

/// Something that can run a shell command line and capture its outcome.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, opts: &RunOptions) -> CommandResult;
}

/// Runs commands through `sh -c` on the local machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, opts: &RunOptions) -> CommandResult {
        run_command(command, opts).await
    }
}

/// Run `command` through the shell, capture its output and classify the
/// outcome.
///
/// The child is started in a fresh session so that it and all of its
/// descendants form one process group. When the timeout fires the whole
/// group is killed and whatever output was produced so far is kept. Launch
/// failures are absorbed into the returned result; this function never
/// reports an error to the caller.
pub async fn run_command(command: &str, opts: &RunOptions) -> CommandResult {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(&opts.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(env) = &opts.env {
        cmd.env_clear();
        cmd.envs(env);
    }
    #[cfg(unix)]
    unsafe {
        // The shell becomes a session leader, so killpg(pid) reaches every
        // descendant it ever spawns.
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return CommandResult::launch_failure(
                command,
                format!("Failed to run command '{}': {}", command.trim(), e),
            )
        }
    };
    let pid = child.id();

    let mut stdout_pipe = child.stdout.take().expect("child stdout is piped");
    let mut stderr_pipe = child.stderr.take().expect("child stderr is piped");
    // Detached readers keep draining the pipes while we wait, so a chatty
    // child never blocks on a full pipe and partial output survives a kill.
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf).await;
        buf
    });

    let mut timed_out = false;
    let wait_result = match opts.timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(res) => res,
            Err(_elapsed) => {
                timed_out = true;
                kill_process_group(pid);
                let _ = child.start_kill();
                child.wait().await
            }
        },
        None => child.wait().await,
    };

    // The group is dead by now, so both pipes are at EOF and these joins are
    // bounded.
    let stdout = String::from_utf8_lossy(&stdout_task.await.unwrap_or_default()).into_owned();
    let stderr = String::from_utf8_lossy(&stderr_task.await.unwrap_or_default()).into_owned();

    if timed_out {
        let limit = opts.timeout.expect("timed out, so a timeout was set");
        let message = format!(
            "Timeout: command '{}' ran longer than {} seconds",
            command.trim(),
            format_seconds(limit)
        );
        return CommandResult {
            command: command.to_owned(),
            verdict: Verdict::Timeout(message.clone()),
            exit_code: None,
            stdout,
            stderr: message,
        };
    }

    match wait_result {
        Ok(status) => {
            let code = ret_code_from_exit_status(status);
            CommandResult {
                command: command.to_owned(),
                verdict: classify(code, command),
                exit_code: Some(code),
                stdout,
                stderr,
            }
        }
        Err(e) => CommandResult {
            command: command.to_owned(),
            verdict: Verdict::Failure(format!(
                "Failed to wait for command '{}': {}",
                command.trim(),
                e
            )),
            exit_code: None,
            stdout,
            stderr,
        },
    }
}

fn classify(code: i32, command: &str) -> Verdict {
    match code {
        0 => Verdict::Success,
        code if code > 0 => Verdict::Failure(format!(
            "Command '{}' exited with code {}",
            command.trim(),
            code
        )),
        code => Verdict::Failure(format!("Runtime error: {}", strsignal(-code))),
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        // setsid made the child a group leader, so its pgid equals its pid.
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

#[cfg(not(unix))]
fn ret_code_from_exit_status(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

#[cfg(unix)]
fn ret_code_from_exit_status(status: std::process::ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(x), _) => x,
        (None, Some(x)) => -x,
        _ => unreachable!(),
    }
}

#[cfg(unix)]
/// Describe a signal code (>=0).
fn strsignal(signal: i32) -> String {
    use std::ffi::CStr;
    let c_buf: *const libc::c_char = unsafe { libc::strsignal(signal as libc::c_int) };
    let c_str: &CStr = unsafe { CStr::from_ptr(c_buf) };
    c_str.to_string_lossy().into_owned()
}

#[cfg(not(unix))]
fn strsignal(_signal: i32) -> String {
    "".into()
}

/// Render a duration the way it was written in the job file: whole seconds
/// without a fraction, fractional seconds as-is.
fn format_seconds(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs.fract() == 0.0 {
        format!("{}", secs as u64)
    } else {
        format!("{}", secs)
    }
}
