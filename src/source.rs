use log::{debug, warn};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

/// Something that yields command lines one at a time.
///
/// Lifecycle: `open` once when the source becomes the active one, `read_line` until it
/// returns `None`, then `close` once. None of these ever fail; sources log their own
/// problems and report exhaustion instead.
pub trait InputSource {
    fn open(&mut self);

    /// Next line without its terminator, or `None` when the source is exhausted.
    fn read_line(&mut self) -> Option<String>;

    fn close(&mut self);
}

/// Plays back the lines of a script file.
///
/// A path that does not name a readable regular file produces an empty script.
pub struct ScriptSource {
    path: PathBuf,
    reader: Option<BufReader<File>>,
}

impl ScriptSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let reader = open_script(&path).map(BufReader::new);
        Self { path, reader }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_readable(&self) -> bool {
        self.reader.is_some()
    }
}

fn open_script(path: &Path) -> Option<File> {
    if path.as_os_str().is_empty() {
        return None;
    }
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            warn!("script {} is not a regular file, skipping", path.display());
            return None;
        }
        Err(e) => {
            warn!("script {} not readable: {}", path.display(), e);
            return None;
        }
    }
    File::open(path)
        .map_err(|e| warn!("cannot open script {}: {}", path.display(), e))
        .ok()
}

/// Read one line terminated by LF, CRLF or a lone CR.
///
/// Returns `Ok(None)` at end of input. A trailing line without terminator is still
/// returned.
fn read_script_line<R: BufRead>(reader: &mut R) -> std::io::Result<Option<String>> {
    let mut line = Vec::new();
    let mut saw_any = false;
    loop {
        let buf = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if buf.is_empty() {
            break;
        }
        saw_any = true;
        match buf.iter().position(|b| *b == b'\n' || *b == b'\r') {
            Some(i) => {
                let terminator = buf[i];
                line.extend_from_slice(&buf[..i]);
                reader.consume(i + 1);
                if terminator == b'\r' {
                    // A CR directly followed by LF is a single terminator.
                    let next = reader.fill_buf()?;
                    if next.first() == Some(&b'\n') {
                        reader.consume(1);
                    }
                }
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }
            None => {
                let len = buf.len();
                line.extend_from_slice(buf);
                reader.consume(len);
            }
        }
    }
    Ok(saw_any.then(|| String::from_utf8_lossy(&line).into_owned()))
}

impl InputSource for ScriptSource {
    fn open(&mut self) {}

    fn read_line(&mut self) -> Option<String> {
        let reader = self.reader.as_mut()?;
        match read_script_line(reader) {
            Ok(line) => line,
            Err(e) => {
                warn!("error reading script {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!("closed script {}", self.path.display());
        }
    }
}
