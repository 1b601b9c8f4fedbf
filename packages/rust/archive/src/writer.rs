//! Minimal record writer.

use std::io::{self, Write};

use flate2::Compression;
use flate2::write::GzEncoder;

/// Writes records in container framing, one gzip member per record by default.
///
/// `Content-Length` and the version line are added automatically.
pub struct ArchiveWriter<W: Write> {
    out: W,
    compress: bool,
}

impl<W: Write> ArchiveWriter<W> {
    /// Writer producing a gzip member per record.
    pub fn new(out: W) -> Self {
        Self { out, compress: true }
    }

    /// Writer producing plain, uncompressed framing.
    pub fn uncompressed(out: W) -> Self {
        Self {
            out,
            compress: false,
        }
    }

    /// Append one record with the given headers and block.
    pub fn write_record(&mut self, headers: &[(&str, &str)], block: &[u8]) -> io::Result<()> {
        let mut framed = Vec::with_capacity(block.len() + 256);
        framed.extend_from_slice(b"WARC/1.0\r\n");
        for (name, value) in headers {
            write!(framed, "{name}: {value}\r\n")?;
        }
        write!(framed, "Content-Length: {}\r\n\r\n", block.len())?;
        framed.extend_from_slice(block);
        framed.extend_from_slice(b"\r\n\r\n");

        if self.compress {
            let mut encoder = GzEncoder::new(&mut self.out, Compression::default());
            encoder.write_all(&framed)?;
            encoder.finish()?;
            Ok(())
        } else {
            self.out.write_all(&framed)
        }
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
