//! The two operating modes of the shell and their command tables.

use crate::completion::{CompletionNode, CompletionTree, leaf, node};
use crate::context::CancelToken;
use crate::messages::{self, Locale};
use crate::parser::ParsedCommand;
use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Active mode of the shell. Switching is always a direct assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Encode,
    Decode,
}

/// Follow-up the driver has to perform after a command ran.
///
/// Commands run off the shell thread, so anything that touches the source stack is
/// handed back instead of done in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    /// Push a script source for this path on top of the stack.
    Include(PathBuf),
}

type CommandFn = fn(&ParsedCommand, &mut dyn Write, &CancelToken) -> Result<()>;

/// A mode-specific command: every alias it answers to and its body.
pub struct CommandSpec {
    pub names: &'static [&'static str],
    pub run: CommandFn,
}

/// Immutable data describing one mode.
pub struct ModeProfile {
    pub name: &'static str,
    /// Coloured prompt for the line editor.
    pub prompt: &'static str,
    /// Prompt without escape sequences for plain terminals.
    pub plain_prompt: &'static str,
    pub help: &'static str,
    pub commands: &'static [CommandSpec],
    extension_nodes: fn() -> Vec<CompletionNode>,
}

const SHARED_HELP: &str = "\
Shared commands:
  exit                     - quit the shell
  help                     - show this help
  l, log [N]               - print the last N log lines, or follow the log until Ctrl-C
  s, switch                - switch to the other mode
  ., source <file>         - run the commands of a script file

Mode commands:";

static ENCODE: ModeProfile = ModeProfile {
    name: "Encode",
    prompt: "\x1b[32m  B-E > \x1b[0m",
    plain_prompt: "  B-E > ",
    help: "
  d, decode                - switch to Decode mode
  status                   - show the active mode
",
    commands: &[CommandSpec {
        names: &["status"],
        run: encode_status,
    }],
    extension_nodes: encode_nodes,
};

static DECODE: ModeProfile = ModeProfile {
    name: "Decode",
    prompt: "\x1b[36m  B-D > \x1b[0m",
    plain_prompt: "  B-D > ",
    help: "
  e, encode                - switch to Encode mode
  status                   - show the active mode
",
    commands: &[CommandSpec {
        names: &["status"],
        run: decode_status,
    }],
    extension_nodes: decode_nodes,
};

fn encode_status(_: &ParsedCommand, out: &mut dyn Write, token: &CancelToken) -> Result<()> {
    token.checkpoint()?;
    writeln!(out, "Encode Mode !")?;
    Ok(())
}

fn decode_status(_: &ParsedCommand, out: &mut dyn Write, token: &CancelToken) -> Result<()> {
    token.checkpoint()?;
    writeln!(out, "Decode Mode !")?;
    Ok(())
}

fn encode_nodes() -> Vec<CompletionNode> {
    vec![
        leaf("status"),
        node(
            &["list", "set"],
            vec![leaf("server"), leaf("proxy"), leaf("encoder")],
        ),
    ]
}

fn decode_nodes() -> Vec<CompletionNode> {
    vec![
        leaf("status"),
        node(
            &["list", "set"],
            vec![leaf("server"), leaf("proxy"), leaf("decoder")],
        ),
    ]
}

fn shared_nodes() -> Vec<CompletionNode> {
    ["exit", "switch", "decode", "encode", "log", "source", "help"]
        .into_iter()
        .map(leaf)
        .collect()
}

impl Mode {
    pub fn opposite(self) -> Mode {
        match self {
            Mode::Encode => Mode::Decode,
            Mode::Decode => Mode::Encode,
        }
    }

    pub fn profile(self) -> &'static ModeProfile {
        match self {
            Mode::Encode => &ENCODE,
            Mode::Decode => &DECODE,
        }
    }

    /// Shared root words merged with this mode's own subtrees, built once per mode.
    pub fn completion(self) -> &'static CompletionTree {
        static ENCODE_TREE: OnceLock<CompletionTree> = OnceLock::new();
        static DECODE_TREE: OnceLock<CompletionTree> = OnceLock::new();
        let cell = match self {
            Mode::Encode => &ENCODE_TREE,
            Mode::Decode => &DECODE_TREE,
        };
        cell.get_or_init(|| {
            let mut roots = shared_nodes();
            roots.extend((self.profile().extension_nodes)());
            CompletionTree::new(roots)
        })
    }

    pub fn help_message(self) -> String {
        format!("{}{}", SHARED_HELP, self.profile().help)
    }

    /// Execute one parsed command in this mode.
    ///
    /// Shared commands are tried first, then the mode's table. Anything else prints the
    /// "command not defined" message, so every input ends up somewhere.
    pub fn dispatch(
        self,
        parsed: &ParsedCommand,
        out: &mut dyn Write,
        token: &CancelToken,
        locale: Locale,
    ) -> Result<Action> {
        match parsed.cmd.as_str() {
            "help" => {
                writeln!(out, "{}", self.help_message())?;
                return Ok(Action::None);
            }
            "source" | "." => return Ok(Action::Include(PathBuf::from(parsed.first_arg()))),
            _ => {}
        }

        let profile = self.profile();
        match profile
            .commands
            .iter()
            .find(|spec| spec.names.contains(&parsed.cmd.as_str()))
        {
            Some(spec) => (spec.run)(parsed, out, token)?,
            None => writeln!(out, "{}", messages::command_not_defined(locale, &parsed.raw))?,
        }
        Ok(Action::None)
    }
}
