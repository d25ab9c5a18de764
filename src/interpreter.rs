use crate::config::ConfigLoader;
use crate::context::{CancelToken, ShellContext, TaskOutcome};
use crate::io_adapters::SharedWriter;
use crate::messages::Locale;
use crate::mode::{Action, Mode};
use crate::parser::{self, ParsedCommand};
use crate::session_log::{self, SessionLog};
use crate::source::{InputSource, ScriptSource};
use crate::stack::SourceStack;
use crate::terminal::{TerminalStrategy, open_terminal};
use anyhow::Result;
use log::{debug, error, info};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

enum Flow {
    Continue,
    Exit,
}

/// Everything [`Interpreter::boot`] needs besides the collaborators.
pub struct BootOptions {
    /// Proxy settings applied before the first prompt.
    pub settings: Option<PathBuf>,
    /// Script replayed before control reaches the terminal.
    pub script: Option<PathBuf>,
    pub out: SharedWriter,
    pub log: Arc<dyn SessionLog>,
}

/// The shell driver.
///
/// Reads lines from the [`SourceStack`], handles the reserved commands (`exit`, mode
/// switches) itself and runs everything else as a cancellable task in the active
/// [`Mode`]. Only one command runs at a time.
///
/// Example
/// ```
/// use proxy_shell::{Interpreter, Mode, ScriptSource, SharedWriter, ShellContext};
/// use proxy_shell::session_log::FileLog;
/// use std::sync::Arc;
///
/// let ctx = Arc::new(ShellContext::new(Mode::Encode));
/// let (out, captured) = SharedWriter::capture();
/// let mut sh = Interpreter::new(ctx, out, Arc::new(FileLog::new("session.log")));
/// sh.push_source(Box::new(ScriptSource::new("no/such/script")));
/// sh.open();
/// sh.run();
/// assert!(captured.contents().is_empty());
/// ```
pub struct Interpreter {
    ctx: Arc<ShellContext>,
    stack: SourceStack,
    out: SharedWriter,
    log: Arc<dyn SessionLog>,
    locale: Locale,
}

impl Interpreter {
    pub fn new(ctx: Arc<ShellContext>, out: SharedWriter, log: Arc<dyn SessionLog>) -> Self {
        Self {
            ctx,
            stack: SourceStack::new(),
            out,
            log,
            locale: Locale::from_env(),
        }
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Full startup: settings, terminal, initial script, then open the stack.
    pub fn boot(
        options: BootOptions,
        loader: &dyn ConfigLoader,
        strategies: &[(&str, TerminalStrategy)],
    ) -> Result<Self> {
        load_settings(loader, options.settings.as_deref());

        let ctx = Arc::new(ShellContext::new(Mode::Encode));
        let terminal = open_terminal(&ctx, strategies)?;

        let mut sh = Self::new(ctx, options.out, options.log);
        sh.push_source(terminal);
        if let Some(script) = options.script {
            info!("initial script {}", script.display());
            sh.push_source(Box::new(ScriptSource::new(script)));
        }
        sh.open();
        Ok(sh)
    }

    /// Shared session state, e.g. for wiring the interrupt handler.
    pub fn context(&self) -> &Arc<ShellContext> {
        &self.ctx
    }

    pub fn push_source(&mut self, source: Box<dyn InputSource>) {
        self.stack.push(source);
    }

    /// Open the top of the seeded stack. Call once, after all initial sources are pushed.
    pub fn open(&mut self) {
        self.stack.open();
    }

    /// Run until `exit` or until every source is exhausted.
    pub fn run(&mut self) {
        while let Some(line) = self.stack.read_line() {
            if let Flow::Exit = self.execute_line(&line) {
                info!("exit requested at source depth {}", self.stack.depth());
                break;
            }
        }
        self.stack.close_all();
        info!("session ended");
    }

    fn execute_line(&mut self, line: &str) -> Flow {
        if line.trim_start().starts_with('#') {
            return Flow::Continue;
        }
        let Some(parsed) = parser::parse(line) else {
            return Flow::Continue;
        };

        match parsed.cmd.as_str() {
            "exit" => return Flow::Exit,
            "switch" | "s" => self.set_mode(self.ctx.mode().opposite()),
            "encode" | "e" => self.set_mode(Mode::Encode),
            "decode" | "d" => self.set_mode(Mode::Decode),
            "log" | "l" => {
                let log = Arc::clone(&self.log);
                self.run_command(parsed, move |parsed, out, token| {
                    session_log::run_log_command(log.as_ref(), &parsed.args, out, token)?;
                    Ok(Action::None)
                });
            }
            _ => {
                let mode = self.ctx.mode();
                let locale = self.locale;
                self.run_command(parsed, move |parsed, out, token| {
                    mode.dispatch(parsed, out, token, locale)
                });
            }
        }
        Flow::Continue
    }

    fn set_mode(&mut self, mode: Mode) {
        self.ctx.set_mode(mode);
        info!("switched to {} mode", mode.profile().name);
    }

    fn run_command<F>(&mut self, parsed: ParsedCommand, work: F)
    where
        F: FnOnce(&ParsedCommand, &mut SharedWriter, &CancelToken) -> Result<Action>
            + Send
            + 'static,
    {
        let name = parsed.cmd.clone();
        let raw = parsed.raw.clone();
        let mut task_out = self.out.clone();
        let outcome = self
            .ctx
            .run_task(&name, move |token| work(&parsed, &mut task_out, token));

        match outcome {
            TaskOutcome::Completed(Action::None) => {}
            TaskOutcome::Completed(Action::Include(path)) => {
                debug!("including script {}", path.display());
                self.stack.push(Box::new(ScriptSource::new(path)));
            }
            TaskOutcome::Cancelled => {
                info!("`{}` cancelled", raw.trim());
                self.print("");
            }
            TaskOutcome::Failed(e) => {
                error!("`{}` failed: {:?}", raw.trim(), e);
                self.print(&format!("error: {:#}", e));
            }
        }
    }

    fn print(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text).and_then(|_| self.out.flush()) {
            debug!("shell output unavailable: {}", e);
        }
    }
}

/// Apply the settings file, if one was given. Failures are logged and otherwise ignored.
///
/// Returns whether settings were applied.
pub fn load_settings(loader: &dyn ConfigLoader, path: Option<&Path>) -> bool {
    let Some(path) = path.filter(|p| !p.as_os_str().is_empty()) else {
        return false;
    };
    info!("loading settings from {}", path.display());
    match loader.load(path) {
        Ok(()) => true,
        Err(e) => {
            error!("settings not applied: {:?}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShellError;
    use crate::io_adapters::CaptureBuffer;
    use crate::terminal::FallbackSource;
    use anyhow::anyhow;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::fs;
    use std::io::Cursor;
    use std::rc::Rc;
    use std::thread;
    use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

    /// Stand-in for the terminal: fixed lines, counts how often it is read.
    struct FakeTerminal {
        lines: VecDeque<String>,
        reads: Rc<Cell<usize>>,
    }

    impl FakeTerminal {
        fn boxed(lines: &[&str], reads: &Rc<Cell<usize>>) -> Box<dyn InputSource> {
            Box::new(FakeTerminal {
                lines: lines.iter().map(|s| s.to_string()).collect(),
                reads: Rc::clone(reads),
            })
        }
    }

    impl InputSource for FakeTerminal {
        fn open(&mut self) {}

        fn read_line(&mut self) -> Option<String> {
            self.reads.set(self.reads.get() + 1);
            self.lines.pop_front()
        }

        fn close(&mut self) {}
    }

    /// Log collaborator whose follow mode only ends through cancellation.
    struct MemoryLog {
        broken: bool,
    }

    impl SessionLog for MemoryLog {
        fn print_last(&self, lines: usize, out: &mut dyn Write) -> Result<()> {
            if self.broken {
                return Err(anyhow!("log storage offline"));
            }
            writeln!(out, "last {} lines", lines)?;
            Ok(())
        }

        fn follow(&self, out: &mut dyn Write, token: &CancelToken) -> Result<()> {
            writeln!(out, "following")?;
            loop {
                token.wait_timeout(Duration::from_millis(10))?;
            }
        }
    }

    fn make_unique_temp_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "proxy_shell_interp_{}_{}_{}",
            tag,
            std::process::id(),
            nanos
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn shell(broken_log: bool) -> (Interpreter, CaptureBuffer) {
        let ctx = Arc::new(ShellContext::new(Mode::Encode));
        let (out, captured) = SharedWriter::capture();
        let sh = Interpreter::new(ctx, out, Arc::new(MemoryLog { broken: broken_log }))
            .with_locale(Locale::En);
        (sh, captured)
    }

    fn undefined_commands(output: &str) -> Vec<String> {
        output
            .lines()
            .filter_map(|l| l.strip_prefix("command not defined: "))
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_exit_in_nested_script_ends_whole_session() {
        let dir = make_unique_temp_dir("exit");
        let layer2 = dir.join("layer_2.txt");
        fs::write(&layer2, "layer_2_top\nlayer_2_bottom\n").unwrap();
        let layer1 = dir.join("layer_1.txt");
        fs::write(
            &layer1,
            format!("layer_1_top\n. {}\nexit\nlayer_1_bottom\n", layer2.display()),
        )
        .unwrap();
        let layer0 = dir.join("layer_0.txt");
        fs::write(
            &layer0,
            format!("layer_0_top\nsource {}\nlayer_0_bottom\n", layer1.display()),
        )
        .unwrap();

        let reads = Rc::new(Cell::new(0));
        let (mut sh, captured) = shell(false);
        sh.push_source(FakeTerminal::boxed(&["terminal_line"], &reads));
        sh.push_source(Box::new(ScriptSource::new(&layer0)));
        sh.open();
        sh.run();

        assert_eq!(
            undefined_commands(&captured.contents()),
            vec!["layer_0_top", "layer_1_top", "layer_2_top", "layer_2_bottom"]
        );
        assert_eq!(reads.get(), 0, "terminal must not be reached after exit");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_nested_inclusion_falls_back_to_outer_script() {
        let dir = make_unique_temp_dir("nested");
        let inner = dir.join("inner.txt");
        fs::write(&inner, "inner1\r\ninner2\r\n").unwrap();
        let outer = dir.join("outer.txt");
        fs::write(
            &outer,
            format!("outer1\nsource \"{}\"\nouter2\n", inner.display()),
        )
        .unwrap();

        let reads = Rc::new(Cell::new(0));
        let (mut sh, captured) = shell(false);
        sh.push_source(FakeTerminal::boxed(&["from_terminal"], &reads));
        sh.push_source(Box::new(ScriptSource::new(&outer)));
        sh.open();
        sh.run();

        assert_eq!(
            undefined_commands(&captured.contents()),
            vec!["outer1", "inner1", "inner2", "outer2", "from_terminal"]
        );
        assert_eq!(reads.get(), 2);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_commented_source_is_never_included() {
        let dir = make_unique_temp_dir("comment");
        let target = dir.join("target.txt");
        fs::write(&target, "status\n").unwrap();

        let reads = Rc::new(Cell::new(0));
        let (mut sh, captured) = shell(false);
        let script = format!(
            "# source {}\n   #. {}\n#status\n\n   \nsource\n",
            target.display(),
            target.display()
        );
        sh.push_source(FakeTerminal::boxed(&[], &reads));
        sh.push_source(Box::new(FallbackSource::new(
            Arc::clone(sh.context()),
            Box::new(Cursor::new(script.into_bytes())),
            Box::new(std::io::sink()),
        )));
        sh.open();
        sh.run();

        assert_eq!(captured.contents(), "");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_reserved_commands_switch_modes() {
        let reads = Rc::new(Cell::new(0));
        let (mut sh, captured) = shell(false);
        sh.push_source(FakeTerminal::boxed(
            &["status", "switch", "status", "s", "status", "d", "status", "e", "encode", "status"],
            &reads,
        ));
        sh.open();
        sh.run();

        assert_eq!(
            captured.contents(),
            "Encode Mode !\nDecode Mode !\nEncode Mode !\nDecode Mode !\nEncode Mode !\n"
        );
        assert_eq!(sh.context().mode(), Mode::Encode);
    }

    #[test]
    fn test_interrupt_cancels_running_command_and_shell_continues() {
        let reads = Rc::new(Cell::new(0));
        let (mut sh, captured) = shell(false);
        sh.push_source(FakeTerminal::boxed(&["log", "status"], &reads));
        sh.open();

        let ctx = Arc::clone(sh.context());
        let interrupter = thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(5);
            while !ctx.has_active_task() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            thread::sleep(Duration::from_millis(50));
            ctx.cancel_active()
        });
        sh.run();

        assert!(interrupter.join().unwrap());
        assert_eq!(
            captured.contents(),
            "last 30 lines\nfollowing\n\nEncode Mode !\n"
        );
        assert!(!sh.context().has_active_task());
    }

    #[test]
    fn test_log_with_count_prints_once() {
        let reads = Rc::new(Cell::new(0));
        let (mut sh, captured) = shell(false);
        sh.push_source(FakeTerminal::boxed(&["l -5", "log 2"], &reads));
        sh.open();
        sh.run();
        assert_eq!(captured.contents(), "last 5 lines\nlast 2 lines\n");
    }

    #[test]
    fn test_failing_command_is_absorbed() {
        let reads = Rc::new(Cell::new(0));
        let (mut sh, captured) = shell(true);
        sh.push_source(FakeTerminal::boxed(&["log 3", "status"], &reads));
        sh.open();
        sh.run();
        assert_eq!(
            captured.contents(),
            "error: log storage offline\nEncode Mode !\n"
        );
    }

    struct CountingLoader {
        calls: Cell<usize>,
        fail: bool,
    }

    impl ConfigLoader for CountingLoader {
        fn load(&self, path: &Path) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                Err(ShellError::Settings {
                    path: path.to_path_buf(),
                    reason: "bad".to_string(),
                }
                .into())
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_load_settings_is_best_effort() {
        let ok = CountingLoader {
            calls: Cell::new(0),
            fail: false,
        };
        assert!(!load_settings(&ok, None));
        assert!(!load_settings(&ok, Some(Path::new(""))));
        assert_eq!(ok.calls.get(), 0);
        assert!(load_settings(&ok, Some(Path::new("settings.json"))));

        let failing = CountingLoader {
            calls: Cell::new(0),
            fail: true,
        };
        assert!(!load_settings(&failing, Some(Path::new("settings.json"))));
        assert_eq!(failing.calls.get(), 1);
    }

    fn scripted_terminal(ctx: &Arc<ShellContext>) -> Result<Box<dyn InputSource>> {
        Ok(Box::new(FallbackSource::new(
            Arc::clone(ctx),
            Box::new(Cursor::new(b"status\n".to_vec())),
            Box::new(std::io::sink()),
        )))
    }

    #[test]
    fn test_boot_seeds_script_above_terminal() {
        let dir = make_unique_temp_dir("boot");
        let script = dir.join("init.txt");
        fs::write(&script, "decode\n").unwrap();

        let (out, captured) = SharedWriter::capture();
        let loader = CountingLoader {
            calls: Cell::new(0),
            fail: true,
        };
        let mut sh = Interpreter::boot(
            BootOptions {
                settings: Some(dir.join("settings.json")),
                script: Some(script),
                out,
                log: Arc::new(MemoryLog { broken: false }),
            },
            &loader,
            &[("scripted", scripted_terminal as TerminalStrategy)],
        )
        .unwrap();
        sh.run();

        assert_eq!(loader.calls.get(), 1);
        assert_eq!(captured.contents(), "Decode Mode !\n");

        let _ = fs::remove_dir_all(dir);
    }
}
