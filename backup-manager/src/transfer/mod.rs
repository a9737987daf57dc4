//! Byte transports: manifest compression and download progress.

pub mod compression;
pub mod progress;
pub mod progress_stream;
