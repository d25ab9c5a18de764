//! Sources reading commands from the user's terminal.

use crate::context::ShellContext;
use crate::error::ShellError;
use crate::source::InputSource;
use anyhow::Result;
use log::{debug, error, info, warn};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;

/// Completion helper that always asks the mode active at completion time.
pub struct DynamicCompleter {
    ctx: Arc<ShellContext>,
}

impl DynamicCompleter {
    pub fn new(ctx: Arc<ShellContext>) -> Self {
        Self { ctx }
    }

    fn candidates(&self, line: &str, pos: usize) -> (usize, Vec<Pair>) {
        let (start, words) = self.ctx.mode().completion().candidates(line, pos);
        let pairs = words
            .into_iter()
            .map(|w| Pair {
                display: w.to_string(),
                replacement: w.to_string(),
            })
            .collect();
        (start, pairs)
    }
}

impl Helper for DynamicCompleter {}

impl Completer for DynamicCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(self.candidates(line, pos))
    }
}

impl Hinter for DynamicCompleter {
    type Hint = String;
}

impl Highlighter for DynamicCompleter {}

impl Validator for DynamicCompleter {}

/// Line-edited terminal with history and tab completion.
pub struct InteractiveSource {
    ctx: Arc<ShellContext>,
    editor: Option<Editor<DynamicCompleter, DefaultHistory>>,
}

impl InteractiveSource {
    /// Attach a line editor to the process terminal.
    ///
    /// Fails when standard input is not a terminal.
    pub fn new(ctx: Arc<ShellContext>) -> Result<Self> {
        if !io::stdin().is_terminal() {
            return Err(ShellError::TerminalUnavailable("stdin is not a terminal".to_string()).into());
        }
        let mut editor = Editor::<DynamicCompleter, DefaultHistory>::new()
            .map_err(|e| ShellError::TerminalUnavailable(e.to_string()))?;
        editor.set_helper(Some(DynamicCompleter::new(Arc::clone(&ctx))));
        Ok(Self {
            ctx,
            editor: Some(editor),
        })
    }
}

impl InputSource for InteractiveSource {
    fn open(&mut self) {
        println!(
            "proxy-shell {} (mode: {}); type `help` for commands",
            env!("CARGO_PKG_VERSION"),
            self.ctx.mode().profile().name
        );
    }

    fn read_line(&mut self) -> Option<String> {
        let editor = self.editor.as_mut()?;
        loop {
            // Re-read on every prompt so a mode switch shows up immediately.
            let prompt = self.ctx.prompt();
            match editor.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        if let Err(e) = editor.add_history_entry(line.as_str()) {
                            debug!("history not updated: {}", e);
                        }
                    }
                    return Some(line);
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => {
                    println!("{}exit", prompt);
                    return None;
                }
                Err(e) => {
                    error!("terminal read failed: {}", e);
                    return None;
                }
            }
        }
    }

    fn close(&mut self) {
        if self.editor.take().is_some() {
            debug!("line editor released");
        }
    }
}

/// Plain line reader used when no line editor can be attached.
///
/// No completion, no history. End of input and read errors both end the stream, the same
/// way Ctrl-D does on the interactive terminal.
pub struct FallbackSource {
    ctx: Arc<ShellContext>,
    reader: Box<dyn BufRead>,
    prompt_out: Box<dyn Write>,
}

impl FallbackSource {
    pub fn new(ctx: Arc<ShellContext>, reader: Box<dyn BufRead>, prompt_out: Box<dyn Write>) -> Self {
        Self {
            ctx,
            reader,
            prompt_out,
        }
    }

    pub fn stdin(ctx: Arc<ShellContext>) -> Self {
        Self::new(ctx, Box::new(io::stdin().lock()), Box::new(io::stdout()))
    }
}

impl InputSource for FallbackSource {
    fn open(&mut self) {}

    fn read_line(&mut self) -> Option<String> {
        let prompt = self.ctx.mode().profile().plain_prompt;
        if write!(self.prompt_out, "{}", prompt)
            .and_then(|_| self.prompt_out.flush())
            .is_err()
        {
            debug!("prompt could not be written");
        }
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                while line.ends_with(['\n', '\r']) {
                    line.pop();
                }
                Some(line)
            }
            Err(e) => {
                warn!("stdin read failed: {}", e);
                None
            }
        }
    }

    fn close(&mut self) {}
}

/// One way of building the terminal-class source.
pub type TerminalStrategy = fn(&Arc<ShellContext>) -> Result<Box<dyn InputSource>>;

fn build_interactive(ctx: &Arc<ShellContext>) -> Result<Box<dyn InputSource>> {
    Ok(Box::new(InteractiveSource::new(Arc::clone(ctx))?))
}

fn build_fallback(ctx: &Arc<ShellContext>) -> Result<Box<dyn InputSource>> {
    Ok(Box::new(FallbackSource::stdin(Arc::clone(ctx))))
}

/// Default order: line editor first, plain stdin reader second.
pub const TERMINAL_STRATEGIES: &[(&str, TerminalStrategy)] = &[
    ("interactive", build_interactive as TerminalStrategy),
    ("fallback", build_fallback as TerminalStrategy),
];

/// Try each strategy in order; the first that succeeds wins.
pub fn open_terminal(
    ctx: &Arc<ShellContext>,
    strategies: &[(&str, TerminalStrategy)],
) -> Result<Box<dyn InputSource>> {
    for (name, build) in strategies {
        match build(ctx) {
            Ok(source) => {
                info!("using {} terminal", name);
                return Ok(source);
            }
            Err(e) => warn!("{} terminal unavailable: {:#}", name, e),
        }
    }
    Err(ShellError::TerminalUnavailable("every terminal strategy failed".to_string()).into())
}
