use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Where the session log goes unless `--log-file` says otherwise.
pub const DEFAULT_LOG_FILE: &str = "logs/proxy-shell.log";

/// Send all `log` output to `path`, truncating it first.
///
/// The terminal stays free for the shell itself; the `log` command reads the file back.
/// Level comes from `RUST_LOG` and defaults to `info`.
pub fn init(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("can't create log directory {}", dir.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("can't create log file {}", path.display()))?;

    Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} [{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init()
        .context("logger already initialised")?;
    Ok(())
}
