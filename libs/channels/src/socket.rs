//! Length-prefixed framing over a local socket pair
//!
//! Each item travels as a 4-byte big-endian length followed by the item
//! bytes. Flow control is the same slot-credit handshake as the ring
//! backends; the socket only carries the data.

use bytes::{Bytes, BytesMut};
use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;

const LENGTH_PREFIX: usize = 4;

/// Connected stream pair: the first half writes, the second reads
pub fn stream_pair() -> io::Result<(UnixStream, UnixStream)> {
    UnixStream::pair()
}

/// Frame writer that reuses one buffer across items
#[derive(Debug)]
pub struct FrameWriter {
    buffer: BytesMut,
    max_frame: usize,
}

impl FrameWriter {
    pub fn new(max_frame: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(LENGTH_PREFIX + max_frame),
            max_frame,
        }
    }

    pub fn write_frame<W: Write>(&mut self, mut stream: W, payload: &[u8]) -> io::Result<()> {
        if payload.len() > self.max_frame {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame of {} bytes exceeds maximum {}", payload.len(), self.max_frame),
            ));
        }
        let len = u32::try_from(payload.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame length overflows u32"))?;

        self.buffer.clear();
        self.buffer.extend_from_slice(&len.to_be_bytes());
        self.buffer.extend_from_slice(payload);

        // Single write per frame
        stream.write_all(&self.buffer)?;
        stream.flush()
    }
}

#[derive(Debug)]
pub struct FrameReader {
    buffer: BytesMut,
    max_frame: usize,
}

impl FrameReader {
    pub fn new(max_frame: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_frame),
            max_frame,
        }
    }

    /// Read one frame. `Ok(None)` means the peer closed the stream between
    /// frames.
    pub fn read_frame<R: Read>(&mut self, mut stream: R) -> io::Result<Option<Bytes>> {
        let mut len_bytes = [0u8; LENGTH_PREFIX];
        match stream.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }

        let len = u32::from_be_bytes(len_bytes) as usize;
        if len > self.max_frame {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {} bytes exceeds maximum {}", len, self.max_frame),
            ));
        }

        self.buffer.resize(len, 0);
        stream.read_exact(&mut self.buffer[..len])?;
        Ok(Some(self.buffer.split_to(len).freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_frames_in_sequence() {
        let mut wire = Vec::new();
        let mut writer = FrameWriter::new(16);
        writer.write_frame(&mut wire, b"first").unwrap();
        writer.write_frame(&mut wire, b"").unwrap();
        writer.write_frame(&mut wire, b"third!").unwrap();
        assert_eq!(&wire[..4], &5u32.to_be_bytes());

        let mut reader = FrameReader::new(16);
        let mut input = Cursor::new(wire);
        assert_eq!(reader.read_frame(&mut input).unwrap().unwrap().as_ref(), b"first");
        assert_eq!(reader.read_frame(&mut input).unwrap().unwrap().as_ref(), b"");
        assert_eq!(reader.read_frame(&mut input).unwrap().unwrap().as_ref(), b"third!");
        assert!(reader.read_frame(&mut input).unwrap().is_none());
    }

    #[test]
    fn test_oversized_frames_rejected() {
        let mut writer = FrameWriter::new(2);
        assert!(writer.write_frame(Vec::new(), b"abc").is_err());

        let mut wire = 100u32.to_be_bytes().to_vec();
        wire.extend_from_slice(&[0; 100]);
        let mut reader = FrameReader::new(8);
        let err = reader.read_frame(Cursor::new(wire)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_truncated_payload_is_an_error() {
        let mut wire = 4u32.to_be_bytes().to_vec();
        wire.extend_from_slice(b"ab");
        let mut reader = FrameReader::new(8);
        assert!(reader.read_frame(Cursor::new(wire)).is_err());
    }

    #[test]
    fn test_over_stream_pair() {
        let (a, b) = stream_pair().unwrap();
        FrameWriter::new(8).write_frame(&a, b"ping").unwrap();
        let frame = FrameReader::new(8).read_frame(&b).unwrap().unwrap();
        assert_eq!(frame.as_ref(), b"ping");
    }
}
