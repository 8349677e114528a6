//! Samples read line by line from a text file.

use crate::lines::next_sample;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tlm_core::{SourceError, TelemetrySource};
use tracing::debug;

/// Reads one sample per non-empty line.
///
/// Each `open` starts again from the top of the file.
#[derive(Debug)]
pub struct FileSource {
    name: String,
    path: PathBuf,
    reader: Option<BufReader<File>>,
}

impl FileSource {
    /// Source reading `path`; nothing is opened yet.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: format!("file:{}", path.display()),
            path,
            reader: None,
        }
    }

    /// File the source reads.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TelemetrySource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(), SourceError> {
        let file = File::open(&self.path).map_err(|e| SourceError::open(&self.name, e.to_string()))?;
        self.reader = Some(BufReader::new(file));
        debug!(path = %self.path.display(), "file source opened");
        Ok(())
    }

    fn read_sample(&mut self) -> Result<Option<String>, SourceError> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(SourceError::read(&self.name, "source not opened"));
        };
        let sample = next_sample(reader, &self.name)?;
        if sample.is_none() {
            self.reader = None;
        }
        Ok(sample)
    }
}
