use argh::FromArgs;
use log::{debug, error, warn};
use proxy_shell::config::JsonSettings;
use proxy_shell::session_log::FileLog;
use proxy_shell::terminal::TERMINAL_STRATEGIES;
use proxy_shell::{BootOptions, Interpreter, SharedWriter, logging};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(FromArgs)]
/// Interactive control shell for the interception proxy.
struct Args {
    #[argh(option, short = 's')]
    /// JSON settings file applied before the first prompt.
    settings: Option<PathBuf>,

    #[argh(option)]
    /// session log file; defaults to logs/proxy-shell.log.
    log_file: Option<PathBuf>,

    #[argh(positional)]
    /// script whose commands run before the interactive prompt.
    script: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();

    let log_file = args
        .log_file
        .unwrap_or_else(|| PathBuf::from(logging::DEFAULT_LOG_FILE));
    if let Err(e) = logging::init(&log_file) {
        eprintln!("session log disabled: {:#}", e);
    }

    let options = BootOptions {
        settings: args.settings,
        script: args.script,
        out: SharedWriter::stdout(),
        log: Arc::new(FileLog::new(log_file)),
    };
    let mut sh = match Interpreter::boot(options, &JsonSettings, TERMINAL_STRATEGIES) {
        Ok(sh) => sh,
        Err(e) => {
            error!("shell startup failed: {:?}", e);
            eprintln!("proxy-shell: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // Ctrl-C while a command runs cancels that command only.
    let ctx = Arc::clone(sh.context());
    if let Err(e) = ctrlc::set_handler(move || {
        if !ctx.cancel_active() {
            debug!("interrupt with no running command");
        }
    }) {
        warn!("interrupt handler not installed: {}", e);
    }

    sh.run();
    ExitCode::SUCCESS
}
