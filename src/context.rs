use crate::error::ShellError;
use crate::mode::Mode;
use anyhow::anyhow;
use log::{debug, info};
use std::any::Any;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct TokenState {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

/// Cooperative cancellation flag shared between a running command and the interrupt path.
///
/// Flipping the token never stops anything by itself: the command has to look at it at
/// its own checkpoints ([`CancelToken::checkpoint`], [`CancelToken::wait_timeout`]) and
/// unwind with [`ShellError::Cancelled`].
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenState>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake up any checkpoint currently waiting.
    pub fn cancel(&self) {
        *lock(&self.inner.cancelled) = true;
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *lock(&self.inner.cancelled)
    }

    /// Fail with [`ShellError::Cancelled`] if cancellation was requested.
    pub fn checkpoint(&self) -> Result<(), ShellError> {
        if self.is_cancelled() {
            Err(ShellError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `timeout`, returning early with [`ShellError::Cancelled`] when cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), ShellError> {
        let guard = lock(&self.inner.cancelled);
        let (guard, _) = self
            .inner
            .wake
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        if *guard {
            Err(ShellError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// How a unit of work started by [`ShellContext::run_task`] ended.
#[derive(Debug)]
pub enum TaskOutcome<T> {
    Completed(T),
    Cancelled,
    Failed(anyhow::Error),
}

struct ActiveTask {
    name: String,
    token: CancelToken,
}

/// Session state shared by the driver, the interrupt handler and the completer.
///
/// Holds the active [`Mode`] and the cancellation handle of the command currently
/// executing, if any. At most one command runs at a time.
pub struct ShellContext {
    mode: Mutex<Mode>,
    active: Mutex<Option<ActiveTask>>,
}

impl ShellContext {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode: Mutex::new(mode),
            active: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> Mode {
        *lock(&self.mode)
    }

    pub fn set_mode(&self, mode: Mode) {
        *lock(&self.mode) = mode;
    }

    /// Prompt of the mode active right now.
    pub fn prompt(&self) -> &'static str {
        self.mode().profile().prompt
    }

    pub fn has_active_task(&self) -> bool {
        lock(&self.active).is_some()
    }

    /// Ask the running command, if any, to stop at its next checkpoint.
    ///
    /// Returns `true` when a command was signalled.
    pub fn cancel_active(&self) -> bool {
        match lock(&self.active).as_ref() {
            Some(task) => {
                info!("interrupt: cancelling `{}`", task.name);
                task.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Run `work` as one cancellable unit and block until it finishes.
    ///
    /// The work runs on its own thread so that [`ShellContext::cancel_active`] can reach
    /// it while the caller waits. A panic inside the work is reported as
    /// [`TaskOutcome::Failed`].
    pub fn run_task<T, F>(&self, name: &str, work: F) -> TaskOutcome<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancelToken) -> anyhow::Result<T> + Send + 'static,
    {
        let token = CancelToken::new();
        *lock(&self.active) = Some(ActiveTask {
            name: name.to_string(),
            token: token.clone(),
        });

        let task_token = token.clone();
        let spawned = thread::Builder::new()
            .name(format!("cmd-{}", name))
            .spawn(move || work(&task_token));
        let joined = match spawned {
            Ok(handle) => handle.join(),
            Err(e) => {
                lock(&self.active).take();
                return TaskOutcome::Failed(anyhow!("failed to start `{}`: {}", name, e));
            }
        };
        lock(&self.active).take();

        let outcome = match joined {
            Ok(Ok(value)) => TaskOutcome::Completed(value),
            Ok(Err(e)) if ShellError::is_cancelled(&e) => TaskOutcome::Cancelled,
            Ok(Err(e)) => TaskOutcome::Failed(e),
            Err(panic) => TaskOutcome::Failed(anyhow!(
                "`{}` panicked: {}",
                name,
                panic_message(panic.as_ref())
            )),
        };
        debug!("task `{}` finished (cancel requested: {})", name, token.is_cancelled());
        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
