//! Length-delimited framing around encoded message payloads
//!
//! Format: `[varint length][payload bytes]`, repeated. This lets several
//! messages share one stream and be read back independently, without
//! loading everything at once.

use crate::error::Result;
use std::io::{Read, Write};

/// Write a single payload in length-delimited format.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let mut length = Vec::with_capacity(5);
    prost::encoding::encode_varint(payload.len() as u64, &mut length);
    writer.write_all(&length)?;
    writer.write_all(payload)?;
    Ok(())
}

/// Write multiple payloads in length-delimited format.
pub fn write_frames<W: Write>(writer: &mut W, payloads: &[Vec<u8>]) -> Result<()> {
    for payload in payloads {
        write_frame(writer, payload)?;
    }
    Ok(())
}

/// Read frames lazily from a length-delimited stream.
///
/// # Example
///
/// ```no_run
/// use proto_bridge_core::framing::read_frames;
/// use std::fs::File;
///
/// let file = File::open("messages.pb")?;
/// for frame in read_frames(file) {
///     let payload = frame?;
///     println!("{} bytes", payload.len());
/// }
/// # Ok::<(), proto_bridge_core::Error>(())
/// ```
pub fn read_frames<R: Read>(reader: R) -> FrameIterator<R> {
    FrameIterator { reader }
}

/// Iterator over payloads in a length-delimited stream
pub struct FrameIterator<R: Read> {
    reader: R,
}

impl<R: Read> Iterator for FrameIterator<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let length = match read_varint(&mut self.reader) {
            Ok(length) => length as usize,
            Err(e) => {
                // Clean EOF between frames ends the iteration
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    return None;
                }
                return Some(Err(e.into()));
            }
        };

        let mut payload = vec![0u8; length];
        if let Err(e) = self.reader.read_exact(&mut payload) {
            return Some(Err(e.into()));
        }
        Some(Ok(payload))
    }
}

/// Read a varint from a reader
fn read_varint<R: Read>(reader: &mut R) -> std::io::Result<u64> {
    let mut result = 0u64;
    let mut shift = 0;
    let mut buf = [0u8; 1];

    loop {
        reader.read_exact(&mut buf)?;
        let byte = buf[0];

        result |= ((byte & 0x7F) as u64) << shift;

        if byte & 0x80 == 0 {
            break;
        }

        shift += 7;
        if shift >= 64 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Varint too large",
            ));
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_write_and_read_single_frame() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, b"hello").unwrap();

        let frames: Vec<Vec<u8>> = read_frames(Cursor::new(buffer))
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(frames, vec![b"hello".to_vec()]);
    }

    #[test]
    fn test_write_and_read_multiple_frames() {
        let payloads = vec![b"one".to_vec(), Vec::new(), vec![0xFFu8; 300]];
        let mut buffer = Vec::new();
        write_frames(&mut buffer, &payloads).unwrap();

        let frames: Vec<Vec<u8>> = read_frames(Cursor::new(buffer))
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(frames, payloads);
    }

    #[test]
    fn test_read_empty_stream() {
        let frames: Vec<Vec<u8>> = read_frames(Cursor::new(Vec::new()))
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert!(frames.is_empty());
    }

    #[test]
    fn test_lazy_iteration() {
        let mut buffer = Vec::new();
        write_frames(&mut buffer, &[b"a".to_vec(), b"b".to_vec()]).unwrap();

        let mut iter = read_frames(Cursor::new(buffer));
        assert_eq!(iter.next().unwrap().unwrap(), b"a".to_vec());
        assert_eq!(iter.next().unwrap().unwrap(), b"b".to_vec());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_truncated_frame_is_an_error() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, b"complete payload").unwrap();
        buffer.truncate(buffer.len() - 4);

        let result: Result<Vec<Vec<u8>>> = read_frames(Cursor::new(buffer)).collect();
        assert!(result.is_err());
    }

    #[test]
    fn test_varint_round_trip() {
        for value in [0u64, 42, 127, 128, 300, 70000, u32::MAX as u64] {
            let mut buf = Vec::new();
            prost::encoding::encode_varint(value, &mut buf);
            assert_eq!(read_varint(&mut Cursor::new(buf)).unwrap(), value);
        }
    }
}
