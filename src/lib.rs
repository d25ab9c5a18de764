//! Interactive control shell for an interception proxy.
//!
//! Commands come from a stack of input sources: the user's terminal at the bottom and
//! any number of nested scripts on top (`source <file>`). The [`Interpreter`] reads that
//! stack as one stream of lines, handles mode switches and `exit` itself and runs every
//! other command as a cancellable task in the active [`Mode`], so Ctrl-C stops the
//! command without leaving the shell.
//!
//! The public modules expose the seams an embedding application plugs into: settings
//! loading ([`config`]), the session log ([`session_log`]) and the terminal sources
//! ([`terminal`]).

mod completion;
pub mod config;
mod context;
pub mod error;
mod interpreter;
mod io_adapters;
pub mod logging;
mod messages;
mod mode;
mod parser;
pub mod session_log;
mod source;
mod stack;
pub mod terminal;

pub use context::{CancelToken, ShellContext, TaskOutcome};
pub use interpreter::{BootOptions, Interpreter, load_settings};
pub use io_adapters::{CaptureBuffer, SharedWriter};
pub use messages::Locale;
pub use mode::{Action, Mode};
pub use parser::{ParsedCommand, parse};
pub use source::{InputSource, ScriptSource};
pub use stack::SourceStack;
