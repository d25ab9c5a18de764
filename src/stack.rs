use crate::source::InputSource;
use log::debug;

struct Frame {
    source: Box<dyn InputSource>,
    opened: bool,
}

impl Frame {
    fn ensure_open(&mut self) {
        if !self.opened {
            self.opened = true;
            self.source.open();
        }
    }
}

/// LIFO of input sources read as one continuous stream of lines.
///
/// The top frame is the active one. When it runs dry it is closed and dropped and
/// reading continues from the frame below; the stream ends once the bottom frame is
/// exhausted. Every frame is opened at most once and closed exactly once, including on
/// drop.
#[derive(Default)]
pub struct SourceStack {
    frames: Vec<Frame>,
}

impl SourceStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `source` on top. It is not opened until it is about to be read.
    pub fn push(&mut self, source: Box<dyn InputSource>) {
        self.frames.push(Frame {
            source,
            opened: false,
        });
        debug!("source stack depth {}", self.frames.len());
    }

    /// Open the current top frame.
    pub fn open(&mut self) {
        if let Some(top) = self.frames.last_mut() {
            top.ensure_open();
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Next line from the topmost frame that still has one, or `None` once every frame
    /// is exhausted.
    pub fn read_line(&mut self) -> Option<String> {
        loop {
            let top = self.frames.last_mut()?;
            top.ensure_open();
            if let Some(line) = top.source.read_line() {
                return Some(line);
            }
            self.pop();
            self.open();
        }
    }

    fn pop(&mut self) {
        if let Some(mut frame) = self.frames.pop() {
            frame.source.close();
            debug!("source exhausted, stack depth {}", self.frames.len());
        }
    }

    /// Close every remaining frame, top first.
    pub fn close_all(&mut self) {
        while !self.frames.is_empty() {
            self.pop();
        }
    }
}

impl Drop for SourceStack {
    fn drop(&mut self) {
        self.close_all();
    }
}
