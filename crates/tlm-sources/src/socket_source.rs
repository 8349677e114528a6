//! Samples streamed over a unix-domain socket.
//!
//! The peer writes newline-terminated samples; the source ends when the peer
//! closes its side of the connection.

use crate::lines::next_sample;
use std::io::BufReader;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use tlm_core::{SourceError, TelemetrySource};
use tracing::{debug, info};

/// Connects to a unix stream socket and reads one sample per line.
#[derive(Debug)]
pub struct SocketSource {
    name: String,
    path: PathBuf,
    reader: Option<BufReader<UnixStream>>,
}

impl SocketSource {
    /// Source connecting to `path` on `open`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: format!("socket:{}", path.display()),
            path,
            reader: None,
        }
    }

    /// Socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TelemetrySource for SocketSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(), SourceError> {
        let stream =
            UnixStream::connect(&self.path).map_err(|e| SourceError::open(&self.name, e.to_string()))?;
        info!(path = %self.path.display(), "connected to telemetry socket");
        self.reader = Some(BufReader::new(stream));
        Ok(())
    }

    fn read_sample(&mut self) -> Result<Option<String>, SourceError> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(SourceError::read(&self.name, "socket not connected"));
        };
        let sample = next_sample(reader, &self.name)?;
        if sample.is_none() {
            debug!(path = %self.path.display(), "telemetry peer closed the connection");
            self.reader = None;
        }
        Ok(sample)
    }
}
