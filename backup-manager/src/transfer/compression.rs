//! Streaming zstd transport for manifest bytes.
//!
//! Both wrappers expose plain `Write`/`Read`, so the manifest codec never
//! knows whether it is talking to a compressed stream.

use std::io::{self, BufReader, Read, Write};
use zstd::stream::{read::Decoder, write::Encoder};

/// Favor encode speed; backups are created interactively.
pub const DEFAULT_LEVEL: i32 = 1;

/// Compressing writer. Call [`CompressedWriter::finish`] to write the frame
/// epilogue; dropping it without finishing leaves a truncated frame.
pub struct CompressedWriter<W: Write> {
    encoder: Encoder<'static, W>,
}

impl<W: Write> CompressedWriter<W> {
    pub fn new(inner: W, level: i32) -> io::Result<Self> {
        Ok(Self {
            encoder: Encoder::new(inner, level)?,
        })
    }

    /// Complete the frame and hand back the underlying writer.
    pub fn finish(self) -> io::Result<W> {
        self.encoder.finish()
    }
}

impl<W: Write> Write for CompressedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

/// Decompressing reader.
pub struct CompressedReader<R: Read> {
    decoder: Decoder<'static, BufReader<R>>,
}

impl<R: Read> CompressedReader<R> {
    pub fn new(inner: R) -> io::Result<Self> {
        Ok(Self {
            decoder: Decoder::new(inner)?,
        })
    }
}

impl<R: Read> Read for CompressedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf)
    }
}
