//! Object streams: lazily read, line-oriented record files.

use std::any::Any;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use crate::error::CommandError;
use crate::runtime::{Object, Value};

/// How each line of a stream file is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// The line itself.
    Text,
    Int,
    Float,
    /// Whitespace or comma separated floats.
    Vector,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Text => "Text",
            RecordType::Int => "Int",
            RecordType::Float => "Float",
            RecordType::Vector => "Vector",
        }
    }

    fn decode(&self, line: &str) -> Result<Value, CommandError> {
        let invalid = |what: &str| CommandError::IllegalArgument(format!("not {}: {}", what, line));
        match self {
            RecordType::Text => Ok(Value::Str(line.to_string())),
            RecordType::Int => line.parse().map(Value::Int).map_err(|_| invalid("an integer")),
            RecordType::Float => line.parse().map(Value::Float).map_err(|_| invalid("a number")),
            RecordType::Vector => line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|part| !part.is_empty())
                .map(|part| part.parse().map(Value::Float).map_err(|_| invalid("a vector")))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
        }
    }
}

impl FromStr for RecordType {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "str" | "string" => Ok(RecordType::Text),
            "int" | "integer" => Ok(RecordType::Int),
            "float" | "double" => Ok(RecordType::Float),
            "vector" => Ok(RecordType::Vector),
            _ => Err(CommandError::NoSuchInstantiator(format!("record type '{}'", s.trim()))),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
struct StreamState {
    reader: Option<BufReader<File>>,
    position: usize,
    closed: bool,
}

/// Stream of records read from a file, opened on first read.
///
/// Blank lines are skipped. Reading past the end raises `NoSuchElement`,
/// which is what `repeatUntilException` loops stop on.
#[derive(Debug)]
pub struct ObjectStream {
    path: PathBuf,
    record_type: RecordType,
    state: Mutex<StreamState>,
}

impl ObjectStream {
    /// Create a stream over `path`. The file must exist.
    pub fn open(path: impl AsRef<Path>, record_type: RecordType) -> Result<Self, CommandError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CommandError::NotFound(format!("stream file '{}'", path.display())));
        }
        Ok(Self {
            path: path.to_path_buf(),
            record_type,
            state: Mutex::new(StreamState::default()),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, StreamState>, CommandError> {
        self.state
            .lock()
            .map_err(|e| CommandError::IllegalState(format!("Failed to acquire stream lock: {}", e)))
    }

    /// Read the next record.
    pub fn next_record(&self) -> Result<Value, CommandError> {
        let mut state = self.lock()?;
        if state.closed {
            return Err(CommandError::IllegalState(format!(
                "stream '{}' is closed",
                self.path.display()
            )));
        }

        if state.reader.is_none() {
            let file = File::open(&self.path)?;
            state.reader = Some(BufReader::new(file));
        }

        let mut line = String::new();
        loop {
            line.clear();
            let read = match state.reader.as_mut() {
                Some(reader) => reader.read_line(&mut line)?,
                None => 0,
            };
            if read == 0 {
                return Err(CommandError::NoSuchElement(format!(
                    "end of stream '{}' after {} records",
                    self.path.display(),
                    state.position
                )));
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                let value = self.record_type.decode(trimmed)?;
                state.position += 1;
                return Ok(value);
            }
        }
    }

    /// Read up to `limit` records, or all remaining ones.
    ///
    /// Fails with `NoSuchElement` only if the stream was already exhausted.
    pub fn take(&self, limit: Option<usize>) -> Result<Vec<Value>, CommandError> {
        let mut records = Vec::new();
        while limit.map_or(true, |n| records.len() < n) {
            match self.next_record() {
                Ok(value) => records.push(value),
                Err(CommandError::NoSuchElement(_)) if !records.is_empty() => break,
                Err(CommandError::NoSuchElement(_)) if limit.is_none() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }

    /// Rewind to the first record and reopen if closed.
    pub fn reset(&self) -> Result<(), CommandError> {
        let mut state = self.lock()?;
        *state = StreamState::default();
        Ok(())
    }

    /// Number of records read so far.
    pub fn position(&self) -> usize {
        self.lock().map(|state| state.position).unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().map(|state| state.closed).unwrap_or(true)
    }
}

impl Object for ObjectStream {
    fn type_name(&self) -> &str {
        "ObjectStream"
    }

    fn display(&self) -> String {
        format!(
            "ObjectStream({}, {}, {})",
            self.path.display(),
            self.record_type,
            if self.is_closed() {
                "closed".to_string()
            } else {
                format!("position {}", self.position())
            }
        )
    }

    fn close(&self) -> Result<(), CommandError> {
        let mut state = self.lock()?;
        state.reader = None;
        state.closed = true;
        tracing::debug!(path = %self.path.display(), "Object stream closed");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
