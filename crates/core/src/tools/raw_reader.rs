//! Fixed-size frame reads from a tool's stdout.

use std::io::{ErrorKind, Read};

use super::error::ToolError;
use crate::frame::{Frame, Resolution};

/// Reads packed RGB24 frames of a known resolution from a byte stream.
///
/// A clean end of stream between frames yields `None`; a stream that ends
/// inside a frame is reported as [`ToolError::IncompleteIo`].
pub struct RawFrameReader<R> {
    inner: R,
    resolution: Resolution,
    frame_size: usize,
}

impl<R: Read> RawFrameReader<R> {
    pub fn new(inner: R, resolution: Resolution) -> Self {
        Self {
            inner,
            resolution,
            frame_size: resolution.rgb_frame_size(),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Reads the next frame.
    pub fn read_frame(&mut self) -> Result<Option<Frame>, ToolError> {
        let mut buffer = vec![0u8; self.frame_size];
        let mut filled = 0;
        while filled < self.frame_size {
            match self.inner.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ToolError::Io(e)),
            }
        }

        if filled == 0 {
            return Ok(None);
        }
        if filled < self.frame_size {
            return Err(ToolError::IncompleteIo {
                expected: self.frame_size,
                actual: filled,
            });
        }
        Frame::from_rgb_bytes(self.resolution, buffer)
            .map(Some)
            .ok_or(ToolError::IncompleteIo {
                expected: self.frame_size,
                actual: filled,
            })
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Decodes interleaved s16le PCM.
pub fn decode_s16le(bytes: &[u8], channels: u16) -> Result<Vec<i16>, ToolError> {
    let block = 2 * channels.max(1) as usize;
    if bytes.len() % block != 0 {
        return Err(ToolError::IncompleteIo {
            expected: bytes.len() + (block - bytes.len() % block),
            actual: bytes.len(),
        });
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_whole_frames_then_none() {
        let res = Resolution::new(2, 2);
        let mut bytes = vec![10u8; res.rgb_frame_size()];
        bytes.extend(vec![20u8; res.rgb_frame_size()]);
        let mut reader = RawFrameReader::new(Cursor::new(bytes), res);

        assert_eq!(reader.read_frame().unwrap().unwrap().first_pixel(), Some([10, 10, 10]));
        assert_eq!(reader.read_frame().unwrap().unwrap().first_pixel(), Some([20, 20, 20]));
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_short_read_is_incomplete_io() {
        let res = Resolution::new(2, 2);
        let mut reader = RawFrameReader::new(Cursor::new(vec![0u8; 7]), res);
        match reader.read_frame() {
            Err(ToolError::IncompleteIo { expected, actual }) => {
                assert_eq!(expected, 12);
                assert_eq!(actual, 7);
            }
            other => panic!("expected IncompleteIo, got {:?}", other.map(|f| f.is_some())),
        }
    }

    /// Hands out at most `chunk` bytes per read call.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_reassembles_partial_reads() {
        let res = Resolution::new(4, 4);
        let source = Trickle {
            data: vec![7u8; res.rgb_frame_size()],
            pos: 0,
            chunk: 5,
        };
        let mut reader = RawFrameReader::new(source, res);
        assert!(reader.read_frame().unwrap().is_some());
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_decode_s16le() {
        let samples = decode_s16le(&[0x01, 0x00, 0xff, 0xff], 2).unwrap();
        assert_eq!(samples, vec![1, -1]);
        assert!(decode_s16le(&[0x01, 0x00, 0xff], 2).is_err());
    }
}
