//! Access to the session log for the `log` command.

use crate::context::CancelToken;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lines shown before following the log.
pub const FOLLOW_BACKLOG: usize = 30;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Read side of the session log.
pub trait SessionLog: Send + Sync {
    /// Write the last `lines` lines of the log.
    fn print_last(&self, lines: usize, out: &mut dyn Write) -> Result<()>;

    /// Stream new log output until `token` is cancelled.
    ///
    /// Only returns with an error: [`crate::error::ShellError::Cancelled`] once
    /// interrupted, or whatever stopped the log from being read.
    fn follow(&self, out: &mut dyn Write, token: &CancelToken) -> Result<()>;
}

/// Session log stored in a plain file.
pub struct FileLog {
    path: PathBuf,
}

impl FileLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionLog for FileLog {
    fn print_last(&self, lines: usize, out: &mut dyn Write) -> Result<()> {
        let bytes = fs::read(&self.path)
            .with_context(|| format!("log: can't read {}", self.path.display()))?;
        let text = String::from_utf8_lossy(&bytes);
        let all: Vec<&str> = text.lines().collect();
        for line in &all[all.len().saturating_sub(lines)..] {
            writeln!(out, "{}", line)?;
        }
        Ok(())
    }

    fn follow(&self, out: &mut dyn Write, token: &CancelToken) -> Result<()> {
        let mut file = File::open(&self.path)
            .with_context(|| format!("log: can't open {}", self.path.display()))?;
        let mut pos = file.seek(SeekFrom::End(0))?;
        loop {
            token.wait_timeout(POLL_INTERVAL)?;
            let len = fs::metadata(&self.path)?.len();
            if len < pos {
                // truncated underneath us
                pos = file.seek(SeekFrom::Start(0))?;
            }
            if len > pos {
                let mut chunk = Vec::new();
                (&mut file).take(len - pos).read_to_end(&mut chunk)?;
                pos += chunk.len() as u64;
                out.write_all(&chunk)?;
                out.flush()?;
            }
        }
    }
}

/// Number of lines asked for by `log [N]`.
///
/// `|N|` when the first argument is a number, otherwise 0, which means "follow".
pub fn requested_lines(args: &[String]) -> usize {
    args.first()
        .and_then(|arg| arg.parse::<i64>().ok())
        .map(|n| usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX))
        .unwrap_or(0)
}

/// Body of the `log`/`l` command.
pub fn run_log_command(
    log: &dyn SessionLog,
    args: &[String],
    out: &mut dyn Write,
    token: &CancelToken,
) -> Result<()> {
    match requested_lines(args) {
        0 => {
            log.print_last(FOLLOW_BACKLOG, out)?;
            log.follow(out, token)
        }
        n => log.print_last(n, out),
    }
}
