use std::io::{self, ErrorKind};
use std::process::Stdio;

use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::dispatch::{HookInvocationRequest, HookResponse};
use crate::error::HookError;
use crate::hooks::{HookDefinition, HookRunner, protocol, truncate_chars};

/// Stderr kept in failure messages.
const STDERR_LIMIT: usize = 500;
/// Bytes kept from each of stdout and stderr; anything past this is drained
/// and dropped.
const OUTPUT_LIMIT: u64 = 1024 * 1024;
/// Time between SIGTERM and SIGKILL when tearing down a hook's process group.
#[cfg(unix)]
const KILL_GRACE: std::time::Duration = std::time::Duration::from_millis(200);

/// Runs a hook as a child process.
///
/// The request goes to stdin as one JSON line; the decision is read from
/// stdout. On unix the hook leads its own process group, and that group is
/// killed when the hook exits, when the timeout fires, or when the caller
/// drops the future, so nothing the hook started in the background survives
/// the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalProcess;

impl HookRunner for ExternalProcess {
    async fn run(
        &self,
        hook: &HookDefinition,
        request: &HookInvocationRequest,
    ) -> Result<HookResponse, HookError> {
        let line = request
            .to_wire_line()
            .map_err(|e| HookError::Protocol(format!("cannot encode request: {e}")))?;

        let (program, args) = hook.command().split_first().ok_or_else(|| HookError::Launch {
            program: String::new(),
            source: io::Error::new(ErrorKind::InvalidInput, "empty command"),
        })?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        if let Some(cwd) = &request.cwd {
            command.current_dir(cwd);
        }

        debug!(
            "spawning hook [{}] for {}: {}",
            hook.pattern(),
            request.tool_name,
            hook.command_line()
        );
        let mut child = command.spawn().map_err(|source| HookError::Launch {
            program: program.clone(),
            source,
        })?;
        let group = ProcessGroup::new(child.id());

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(line.as_bytes()).await {
                // The hook decided without reading its input.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
            // stdin dropped here: EOF for the hook
        };
        let exited = async {
            let (fed, status) = tokio::join!(feed, child.wait());
            fed?;
            let status = status?;
            // Background jobs may still hold the pipes open.
            group.terminate().await;
            Ok::<_, io::Error>(status)
        };
        let collected = async {
            tokio::try_join!(
                read_capped(stdout, OUTPUT_LIMIT),
                read_capped(stderr, OUTPUT_LIMIT)
            )
        };

        let exchange = async move { tokio::try_join!(exited, collected) };
        let (status, (stdout, stderr)) = match tokio::time::timeout(hook.timeout(), exchange).await
        {
            Ok(result) => result?,
            Err(_) => {
                group.terminate().await;
                return Err(HookError::Timeout(hook.timeout_sec()));
            }
        };

        if !status.success() {
            return Err(HookError::Exit {
                status: status.to_string(),
                stderr: truncate_chars(String::from_utf8_lossy(&stderr).trim(), STDERR_LIMIT),
            });
        }

        protocol::parse_response(&String::from_utf8_lossy(&stdout))
    }
}

/// Read at most `limit` bytes, then keep draining to EOF so the writer
/// never blocks on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(pipe: Option<R>, limit: u64) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let Some(mut pipe) = pipe else {
        return Ok(buf);
    };
    (&mut pipe).take(limit).read_to_end(&mut buf).await?;
    tokio::io::copy(&mut pipe, &mut tokio::io::sink()).await?;
    Ok(buf)
}

/// The process group a hook leads.
///
/// [`terminate`](Self::terminate) sends SIGTERM, then SIGKILL after
/// [`KILL_GRACE`]. If the run is dropped before that completes, `Drop`
/// sends SIGKILL.
#[cfg(unix)]
struct ProcessGroup {
    pgid: Option<nix::unistd::Pid>,
    done: std::sync::atomic::AtomicBool,
}

#[cfg(unix)]
impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self {
            pgid: leader
                .and_then(|pid| i32::try_from(pid).ok())
                .map(nix::unistd::Pid::from_raw),
            done: std::sync::atomic::AtomicBool::new(false),
        }
    }

    async fn terminate(&self) {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, killpg};
        use std::sync::atomic::Ordering;

        let Some(pgid) = self.pgid else {
            return;
        };
        if self.done.load(Ordering::Acquire) {
            return;
        }
        match killpg(pgid, Signal::SIGTERM) {
            // Nothing left in the group.
            Err(Errno::ESRCH) => {
                self.done.store(true, Ordering::Release);
                return;
            }
            Err(e) => log::warn!("cannot signal hook process group {pgid}: {e}"),
            Ok(()) => debug!("sent SIGTERM to hook process group {pgid}"),
        }
        tokio::time::sleep(KILL_GRACE).await;
        match killpg(pgid, Signal::SIGKILL) {
            Ok(()) => debug!("sent SIGKILL to hook process group {pgid}"),
            Err(Errno::ESRCH) => {}
            Err(e) => log::warn!("cannot kill hook process group {pgid}: {e}"),
        }
        self.done.store(true, Ordering::Release);
    }
}

#[cfg(unix)]
impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid
            && !*self.done.get_mut()
        {
            let _ = nix::sys::signal::killpg(pgid, nix::sys::signal::Signal::SIGKILL);
        }
    }
}

/// Without process groups only the direct child is killed, via `kill_on_drop`.
#[cfg(not(unix))]
struct ProcessGroup;

#[cfg(not(unix))]
impl ProcessGroup {
    fn new(_leader: Option<u32>) -> Self {
        Self
    }

    async fn terminate(&self) {}
}
