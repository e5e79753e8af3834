use std::{process::Stdio, time::Duration};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    process::{Child, Command},
    time::Instant,
};

use crate::{
    error::{ReelError, ReelResult},
    model::ProgressInfo,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Running,
    Completed,
    Failed,
    TimedOut,
}

/// Incremental parser for the renderer's status stream.
///
/// ffmpeg rewrites its status line with `\r` and chunk boundaries fall
/// anywhere, so partial lines are buffered across `feed` calls and only
/// complete lines are parsed.
#[derive(Debug)]
pub struct ProgressParser {
    buf: String,
    total_secs: f64,
}

impl ProgressParser {
    pub fn new(total_secs: f64) -> Self {
        Self {
            buf: String::new(),
            total_secs,
        }
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<ProgressInfo> {
        self.buf.push_str(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.find(['\n', '\r']) {
            let line: String = self.buf.drain(..=pos).collect();
            if let Some(progress) = parse_progress_line(line.trim_end_matches(['\n', '\r']), self.total_secs)
            {
                out.push(progress);
            }
        }
        out
    }
}

/// Parses one ffmpeg status line, e.g.
/// `frame=  150 fps= 30 q=28.0 time=00:00:05.00 bitrate=... speed=1.50x`.
pub fn parse_progress_line(line: &str, total_secs: f64) -> Option<ProgressInfo> {
    if !line.contains("time=") {
        return None;
    }

    let frame = extract_value(line, "frame=")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    let speed = extract_value(line, "speed=")
        .map(|v| v.trim_end_matches('x').to_string())
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0);

    let time_seconds = extract_value(line, "time=")
        .and_then(|v| parse_clock(&v))
        .unwrap_or(0.0);

    let percent = if total_secs > 0.0 {
        (time_seconds / total_secs * 100.0).min(100.0)
    } else {
        0.0
    };

    let eta_seconds = if speed > 0.0 && total_secs > time_seconds {
        Some((total_secs - time_seconds) / speed)
    } else {
        None
    };

    Some(ProgressInfo {
        percent,
        eta_seconds,
        speed,
        frame,
        time_seconds,
    })
}

fn extract_value(line: &str, key: &str) -> Option<String> {
    let start = line.find(key)? + key.len();
    let rest = line[start..].trim_start();
    let end = rest
        .find(|c: char| c.is_whitespace())
        .unwrap_or(rest.len());
    let value = &rest[..end];
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// `HH:MM:SS.cc` clock to seconds.
fn parse_clock(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: f64 = parts[0].parse().ok()?;
    let mins: f64 = parts[1].parse().ok()?;
    let secs: f64 = parts[2].parse().ok()?;
    Some(hours * 3600.0 + mins * 60.0 + secs)
}

#[derive(Debug)]
pub struct KillOutcome {
    /// True when the grace period elapsed and the forceful kill fired.
    pub forced: bool,
    pub status: std::process::ExitStatus,
}

/// Two-phase cancellation.
///
/// Phase one asks ffmpeg to stop on its own terms (`q` on stdin); if the
/// process has not exited within `grace`, phase two kills it outright. The
/// future resolves only once the process's real exit event fires.
pub async fn kill_two_phase(child: &mut Child, grace: Duration) -> std::io::Result<KillOutcome> {
    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(b"q\n").await;
        let _ = stdin.shutdown().await;
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => Ok(KillOutcome {
            forced: false,
            status: status?,
        }),
        Err(_) => {
            child.start_kill()?;
            let status = child.wait().await?;
            Ok(KillOutcome {
                forced: true,
                status,
            })
        }
    }
}

/// Spawns and supervises one external render process.
///
/// State machine: Idle -> Running -> Completed | Failed | TimedOut.
/// One supervisor instance drives one process at a time.
#[derive(Debug)]
pub struct ProcessSupervisor {
    state: SupervisorState,
    grace: Duration,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self {
            state: SupervisorState::Idle,
            grace: Duration::from_secs(3),
        }
    }

    pub fn with_grace(grace: Duration) -> Self {
        Self {
            state: SupervisorState::Idle,
            grace,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Runs `program` to completion, streaming parsed progress to
    /// `on_progress` and enforcing a wall-clock timeout with the two-phase
    /// kill on breach.
    pub async fn run<F>(
        &mut self,
        program: &str,
        args: &[String],
        total_secs: f64,
        timeout_ms: u64,
        mut on_progress: F,
    ) -> ReelResult<()>
    where
        F: FnMut(ProgressInfo),
    {
        self.state = SupervisorState::Running;
        tracing::info!(program, args = args.len(), timeout_ms, "starting renderer");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                self.state = SupervisorState::Failed;
                if e.kind() == std::io::ErrorKind::NotFound {
                    ReelError::spawn(format!("'{program}' was not found on PATH"))
                } else {
                    ReelError::spawn(e.to_string())
                }
            })?;

        let mut stderr = child.stderr.take().ok_or_else(|| {
            ReelError::spawn("failed to capture renderer stderr (unexpected)")
        })?;

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut parser = ProgressParser::new(total_secs);
        let mut tail = String::new();
        let mut buf = [0u8; 4096];

        loop {
            tokio::select! {
                read = stderr.read(&mut buf) => {
                    match read {
                        Ok(0) => break,
                        Ok(n) => {
                            let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                            push_tail(&mut tail, &chunk);
                            for progress in parser.feed(&chunk) {
                                on_progress(progress);
                            }
                        }
                        Err(_) => break,
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::warn!(timeout_ms, "renderer exceeded wall-clock timeout, killing");
                    let _ = kill_two_phase(&mut child, self.grace).await;
                    self.state = SupervisorState::TimedOut;
                    return Err(ReelError::TimedOut { timeout_ms });
                }
            }
        }

        let status = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(status) => status.map_err(|e| ReelError::spawn(e.to_string()))?,
            Err(_) => {
                let _ = kill_two_phase(&mut child, self.grace).await;
                self.state = SupervisorState::TimedOut;
                return Err(ReelError::TimedOut { timeout_ms });
            }
        };

        if status.success() {
            self.state = SupervisorState::Completed;
            tracing::info!("renderer finished");
            Ok(())
        } else {
            self.state = SupervisorState::Failed;
            Err(ReelError::exit(status.code(), tail.trim().to_string()))
        }
    }
}

// Rolling stderr tail kept for failure diagnostics.
fn push_tail(tail: &mut String, chunk: &str) {
    const MAX: usize = 2048;
    tail.push_str(chunk);
    if tail.len() > MAX {
        let cut = tail.len() - MAX;
        let cut = tail
            .char_indices()
            .map(|(i, _)| i)
            .find(|&i| i >= cut)
            .unwrap_or(0);
        tail.drain(..cut);
    }
}
