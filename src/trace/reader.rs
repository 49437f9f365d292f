//! Length-prefixed record iterator (spec §4.B).

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use super::record::Record;
use super::wire::{DecodeError, RecordDecoder};

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Decode(DecodeError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "{e}"),
            Error::Decode(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Decode(e) => Some(e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}

/// A lazy, finite sequence of decoded records read from a `(u32 length,
/// payload)`-framed byte stream, transparently gzip-decompressed when the
/// source file name ends in `.gz`.
pub struct TraceReader<R> {
    inner: R,
    decoder: Box<dyn RecordDecoder>,
    seen_any: bool,
    skip_malformed: bool,
    records_read: usize,
}

impl TraceReader<Box<dyn Read>> {
    /// Opens a trace file, selecting gzip decompression by file name suffix.
    pub fn open(path: &Path, decoder: Box<dyn RecordDecoder>) -> Result<Self, Error> {
        let file = File::open(path)?;
        let is_gz = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
        let inner: Box<dyn Read> = if is_gz {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(TraceReader::new(inner, decoder))
    }
}

impl<R: Read> TraceReader<R> {
    pub fn new(inner: R, decoder: Box<dyn RecordDecoder>) -> Self {
        TraceReader {
            inner,
            decoder,
            seen_any: false,
            skip_malformed: false,
            records_read: 0,
        }
    }

    /// Open question (spec §9, "truncated traces"): selects skip-and-continue
    /// instead of the spec's default stop-at-first-bad behavior.
    #[must_use]
    pub fn with_skip_malformed(mut self, skip: bool) -> Self {
        self.skip_malformed = skip;
        self
    }

    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    fn read_length_prefix(&mut self) -> io::Result<Option<u32>> {
        let mut len_buf = [0u8; 4];
        match self.inner.read_exact(&mut len_buf) {
            Ok(()) => Ok(Some(u32::from_be_bytes(len_buf))),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Reads the next record, or `None` at a clean end of stream. A
    /// truncation after at least one successful record is treated as a
    /// clean end-of-stream (captures a crash mid-write); truncation before
    /// any record is fatal.
    pub fn next_record(&mut self) -> Result<Option<Record>, Error> {
        loop {
            let len = match self.read_length_prefix()? {
                Some(len) => len as usize,
                None => return Ok(None),
            };
            let mut payload = vec![0u8; len];
            match self.inner.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && self.seen_any => {
                    tracing::warn!(
                        "trace truncated mid-message after {} record(s); stopping",
                        self.records_read
                    );
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
            match self.decoder.decode(&payload) {
                Ok(record) => {
                    self.seen_any = true;
                    self.records_read += 1;
                    return Ok(Some(record));
                }
                Err(e) if self.seen_any && self.skip_malformed => {
                    tracing::warn!("skipping malformed record #{}: {e}", self.records_read);
                    continue;
                }
                Err(e) if self.seen_any => {
                    tracing::warn!(
                        "undecodable record after {} successful record(s): {e}; stopping",
                        self.records_read
                    );
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl<R: Read> Iterator for TraceReader<R> {
    type Item = Result<Record, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::wire::LiteDecoder;

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend((payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn minimal_record(opcode: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(opcode.to_le_bytes());
        out.extend(0u32.to_le_bytes());
        out.push(0);
        out.push(0);
        out
    }

    #[test]
    fn reads_two_records_then_stops() {
        let mut stream = Vec::new();
        stream.extend(frame(&minimal_record(76))); // eglSwapBuffers id
        stream.extend(frame(&minimal_record(17))); // glCreateShader id
        let decoder = Box::new(LiteDecoder::with_standard_functions());
        let mut reader = TraceReader::new(std::io::Cursor::new(stream), decoder);
        assert!(reader.next_record().unwrap().is_some());
        assert!(reader.next_record().unwrap().is_some());
        assert!(reader.next_record().unwrap().is_none());
        assert_eq!(reader.records_read(), 2);
    }

    #[test]
    fn truncation_after_first_record_is_a_clean_stop() {
        let mut stream = Vec::new();
        stream.extend(frame(&minimal_record(0)));
        stream.extend(10u32.to_be_bytes()); // length prefix promising 10 bytes
        stream.extend([1, 2, 3]); // but only 3 are present
        let decoder = Box::new(LiteDecoder::with_standard_functions());
        let mut reader = TraceReader::new(std::io::Cursor::new(stream), decoder);
        assert!(reader.next_record().unwrap().is_some());
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn truncation_before_any_record_is_fatal() {
        let stream = 10u32.to_be_bytes().to_vec();
        let decoder = Box::new(LiteDecoder::with_standard_functions());
        let mut reader = TraceReader::new(std::io::Cursor::new(stream), decoder);
        assert!(reader.next_record().is_err());
    }
}
