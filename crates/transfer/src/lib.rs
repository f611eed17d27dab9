//! Streaming integrity hashing and progress reporting for uploads.
//!
//! Both pieces sit between a local file and the remote catalog: the
//! checksum helpers compute the SHA-256 digest the catalog is expected
//! to echo back, and [`ProgressReader`] counts bytes as the transport
//! pulls them so a [`ProgressTracker`] can report on a fixed interval.

mod checksum;
mod progress;

pub use checksum::{ChecksumError, checksum_bytes, checksum_reader, verify_checksum};
pub use progress::{
    DEFAULT_INTERVAL, ProgressCallback, ProgressReader, ProgressTracker, SpeedCalculator,
    TransferProgress,
};
