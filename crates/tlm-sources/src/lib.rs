//! Telemetry sources.
//!
//! Every source implements [`tlm_core::TelemetrySource`]:
//!
//! - [`FileSource`]: one sample per non-empty line of a text file
//! - [`SocketSource`]: one sample per line from a unix-domain socket (unix only)
//! - [`SystemSource`]: host CPU, temperature and RAM as `"cpu;temp;ram"`
//! - [`ScriptedSource`]: a fixed list of samples with optional fault injection

pub mod file_source;
mod lines;
pub mod scripted;
#[cfg(unix)]
pub mod socket_source;
pub mod system_source;

pub use file_source::FileSource;
pub use scripted::ScriptedSource;
#[cfg(unix)]
pub use socket_source::SocketSource;
pub use system_source::SystemSource;
