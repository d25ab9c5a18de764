use std::io::{Result as IoResult, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Cloneable writer handed to commands running on their task thread.
///
/// Every clone writes into the same underlying sink, one write call at a time.
#[derive(Clone)]
pub struct SharedWriter {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl SharedWriter {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    /// Writer bound to the process standard output.
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Convenience: create a memory-backed writer and return (writer, handle).
    pub fn capture() -> (Self, CaptureBuffer) {
        let buffer = CaptureBuffer::default();
        (Self::new(Box::new(buffer.clone())), buffer)
    }
}

impl Write for SharedWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write(data)
    }

    fn flush(&mut self) -> IoResult<()> {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
    }
}

/// Memory-backed sink for capturing command output.
#[derive(Clone, Default)]
pub struct CaptureBuffer {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    /// Everything written so far, decoded lossily.
    pub fn contents(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_clones_share_one_sink() {
        let (writer, captured) = SharedWriter::capture();
        let mut a = writer.clone();
        let mut b = writer;
        write!(a, "one ").unwrap();
        thread::spawn(move || writeln!(b, "two").unwrap())
            .join()
            .unwrap();
        assert_eq!(captured.contents(), "one two\n");
    }
}
