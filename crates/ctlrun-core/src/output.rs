//! Output stream registry and per-action output resolution.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::context::Variables;
use crate::control::{read_modifier, ControlFile, Modifier};

/// Append-mode file handle shared by every action writing to the same path.
///
/// Each write is flushed immediately so interleaved writers see their
/// output in call order.
#[derive(Debug, Clone)]
pub struct SharedFile {
    file: Arc<Mutex<File>>,
}

impl SharedFile {
    fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }
}

impl Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|e| io::Error::other(format!("Failed to acquire file lock: {}", e)))?;
        file.write_all(buf)?;
        file.flush()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|e| io::Error::other(format!("Failed to acquire file lock: {}", e)))?;
        file.flush()
    }
}

/// Files opened by `outputFile` modifiers during one top-level run.
///
/// A path is opened at most once per run; dropping the registry (and every
/// clone handed to background repeats) closes the files.
#[derive(Debug, Clone, Default)]
pub struct OutputFiles {
    files: HashMap<String, SharedFile>,
}

impl OutputFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `path` for appending, or reuse the handle opened earlier.
    ///
    /// A failed open leaves the registry unchanged.
    pub fn open(&mut self, path: &str) -> io::Result<SharedFile> {
        if let Some(file) = self.files.get(path) {
            return Ok(file.clone());
        }

        let file = SharedFile::open(Path::new(path))?;
        tracing::debug!(path = %path, "Output file opened");
        self.files.insert(path.to_string(), file.clone());
        Ok(file)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Where one action invocation writes.
pub enum OutputTarget<'a> {
    /// The caller's stream, unchanged.
    Caller(&'a mut (dyn Write + Send)),
    /// A file from the run's [`OutputFiles`].
    File(SharedFile),
    /// In-memory buffer captured for an `assign` modifier.
    Buffer(&'a mut Vec<u8>),
}

impl Write for OutputTarget<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputTarget::Caller(out) => out.write(buf),
            OutputTarget::File(file) => file.write(buf),
            OutputTarget::Buffer(buffer) => buffer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputTarget::Caller(out) => out.flush(),
            OutputTarget::File(file) => file.flush(),
            OutputTarget::Buffer(_) => Ok(()),
        }
    }
}

/// Decide where an action writes.
///
/// Precedence: a non-empty `outputFile` (warning when `assign` is also set),
/// then the assign buffer, then the caller's stream. Returns `None` when the
/// output file cannot be opened; the diagnostic goes to the caller's stream.
pub fn resolve_output<'a>(
    caller_out: &'a mut (dyn Write + Send),
    config: &ControlFile,
    action: &str,
    variables: &Variables,
    files: &mut OutputFiles,
    assign_buffer: Option<&'a mut Vec<u8>>,
) -> Option<OutputTarget<'a>> {
    let output_file = read_modifier(config, action, Modifier::OutputFile, variables)
        .map(|path| path.trim().to_string())
        .filter(|path| !path.is_empty());

    let Some(path) = output_file else {
        return Some(match assign_buffer {
            Some(buffer) => OutputTarget::Buffer(buffer),
            None => OutputTarget::Caller(caller_out),
        });
    };

    if assign_buffer.is_some() {
        let _ = writeln!(
            caller_out,
            "WARNING: assign is ignored when outputFile is specified in action '{}'",
            action
        );
        tracing::warn!(action = %action, "Both outputFile and assign set, using outputFile");
    }

    match files.open(&path) {
        Ok(file) => Some(OutputTarget::File(file)),
        Err(e) => {
            let _ = writeln!(
                caller_out,
                "Cannot open output file '{}' for action '{}': {}",
                path, action, e
            );
            tracing::warn!(action = %action, path = %path, error = %e, "Cannot open output file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        let config = ControlFile::parse("a = echo\n");
        let mut caller: Vec<u8> = Vec::new();
        let mut files = OutputFiles::new();

        let mut target =
            resolve_output(&mut caller, &config, "a", &Variables::new(), &mut files, None).unwrap();
        assert!(matches!(target, OutputTarget::Caller(_)));
        write!(target, "hello").unwrap();
        drop(target);
        assert_eq!(caller, b"hello");
    }

    #[test]
    fn test_assign_buffer() {
        let config = ControlFile::parse("a = echo\na.assign = x\n");
        let mut caller: Vec<u8> = Vec::new();
        let mut buffer: Vec<u8> = Vec::new();
        let mut files = OutputFiles::new();

        let mut target = resolve_output(
            &mut caller,
            &config,
            "a",
            &Variables::new(),
            &mut files,
            Some(&mut buffer),
        )
        .unwrap();
        write!(target, "captured").unwrap();
        drop(target);
        assert_eq!(buffer, b"captured");
        assert!(caller.is_empty());
    }

    #[test]
    fn test_output_file_reused_and_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let config = ControlFile::parse(&format!(
            "a.outputFile = {p}\nb.outputFile = {p}\n",
            p = path.display()
        ));
        let mut files = OutputFiles::new();
        let mut caller: Vec<u8> = Vec::new();

        for (action, line) in [("a", "first"), ("b", "second")] {
            let mut target =
                resolve_output(&mut caller, &config, action, &Variables::new(), &mut files, None)
                    .unwrap();
            assert!(matches!(target, OutputTarget::File(_)));
            writeln!(target, "{}", line).unwrap();
        }

        assert_eq!(files.len(), 1);
        assert!(caller.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_output_file_wins_over_assign() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let config = ControlFile::parse(&format!("a.outputFile = {}\na.assign = x\n", path.display()));
        let mut caller: Vec<u8> = Vec::new();
        let mut buffer: Vec<u8> = Vec::new();
        let mut files = OutputFiles::new();

        let target = resolve_output(
            &mut caller,
            &config,
            "a",
            &Variables::new(),
            &mut files,
            Some(&mut buffer),
        )
        .unwrap();
        assert!(matches!(target, OutputTarget::File(_)));
        drop(target);
        assert!(String::from_utf8(caller).unwrap().contains("WARNING"));
    }

    #[test]
    fn test_output_file_open_failure() {
        let config = ControlFile::parse("a.outputFile = /nonexistent/dir/out.txt\n");
        let mut caller: Vec<u8> = Vec::new();
        let mut files = OutputFiles::new();

        let target = resolve_output(&mut caller, &config, "a", &Variables::new(), &mut files, None);
        assert!(target.is_none());
        drop(target);
        assert!(files.is_empty());
        assert!(String::from_utf8(caller)
            .unwrap()
            .contains("Cannot open output file '/nonexistent/dir/out.txt'"));
    }

    #[test]
    fn test_empty_output_file_ignored() {
        let config = ControlFile::parse("a.outputFile = <none>\n");
        let mut caller: Vec<u8> = Vec::new();
        let mut files = OutputFiles::new();

        let target =
            resolve_output(&mut caller, &config, "a", &Variables::new(), &mut files, None).unwrap();
        assert!(matches!(target, OutputTarget::Caller(_)));
    }
}
