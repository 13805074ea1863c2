//! ETI byte sinks: the file output formats the core loop fans a finalized
//! frame out to, per the layouts in the governing design notes §6.
//!
//! All three formats write a whole frame per call; none buffer across
//! calls, so a partial write on disk pressure never corrupts a later frame.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

/// Padded length of a raw-format ETI frame record.
const RAW_FRAME_LEN: usize = 6144;
/// Fill byte for raw-format padding, chosen by the reference encoder so a
/// truncated tail is visually distinguishable from real frame data.
const RAW_PAD_BYTE: u8 = 0x55;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("frame of {0} bytes exceeds the raw sink's fixed {RAW_FRAME_LEN}-byte record")]
    FrameTooLarge(usize),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One configured ETI output sink.
pub enum EtiSink {
    /// u32le frame count at offset 0 (rewritten on every write), then
    /// repeated u16le length + payload records.
    Framed { file: File, frame_count: u32 },
    /// u16le length + payload records, no leading count.
    Streamed { file: File },
    /// Fixed 6144-byte payload records, padded with `0x55`.
    Raw { file: File },
}

impl EtiSink {
    pub fn open_framed(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let mut file = OpenOptions::new().create(true).read(true).write(true).truncate(true).open(path)?;
        file.write_all(&0u32.to_le_bytes())?;
        Ok(EtiSink::Framed { file, frame_count: 0 })
    }

    pub fn open_streamed(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
        Ok(EtiSink::Streamed { file })
    }

    pub fn open_raw(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
        Ok(EtiSink::Raw { file })
    }

    /// Writes one finalized ETI frame. `frame` is the packed byte sequence
    /// from [`crate::eti::Frame::pack`].
    pub fn write_frame(&mut self, frame: &[u8]) -> Result<(), SinkError> {
        match self {
            EtiSink::Framed { file, frame_count } => {
                let len: u16 = frame.len().try_into().map_err(|_| SinkError::FrameTooLarge(frame.len()))?;
                file.write_all(&len.to_le_bytes())?;
                file.write_all(frame)?;
                *frame_count = frame_count.wrapping_add(1);
                let pos = file.stream_position()?;
                file.seek(SeekFrom::Start(0))?;
                file.write_all(&frame_count.to_le_bytes())?;
                file.seek(SeekFrom::Start(pos))?;
                Ok(())
            }
            EtiSink::Streamed { file } => {
                let len: u16 = frame.len().try_into().map_err(|_| SinkError::FrameTooLarge(frame.len()))?;
                file.write_all(&len.to_le_bytes())?;
                file.write_all(frame)?;
                Ok(())
            }
            EtiSink::Raw { file } => {
                if frame.len() > RAW_FRAME_LEN {
                    return Err(SinkError::FrameTooLarge(frame.len()));
                }
                let mut record = [RAW_PAD_BYTE; RAW_FRAME_LEN];
                record[..frame.len()].copy_from_slice(frame);
                file.write_all(&record)?;
                Ok(())
            }
        }
    }

    pub fn flush(&mut self) -> Result<(), SinkError> {
        let file = match self {
            EtiSink::Framed { file, .. } | EtiSink::Streamed { file } | EtiSink::Raw { file } => file,
        };
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn tmp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("dabmux-sink-test-{name}-{}", std::process::id()))
    }

    #[test]
    fn framed_header_tracks_frame_count() {
        let path = tmp_path("framed");
        let mut sink = EtiSink::open_framed(&path).unwrap();
        sink.write_frame(&[1, 2, 3]).unwrap();
        sink.write_frame(&[4, 5]).unwrap();
        drop(sink);

        let mut bytes = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut bytes).unwrap();
        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 2);
        assert_eq!(u16::from_le_bytes(bytes[4..6].try_into().unwrap()), 3);
        assert_eq!(&bytes[6..9], &[1, 2, 3]);
        assert_eq!(u16::from_le_bytes(bytes[9..11].try_into().unwrap()), 2);
        assert_eq!(&bytes[11..13], &[4, 5]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn streamed_has_no_leading_count() {
        let path = tmp_path("streamed");
        let mut sink = EtiSink::open_streamed(&path).unwrap();
        sink.write_frame(&[9, 9, 9]).unwrap();
        drop(sink);

        let mut bytes = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut bytes).unwrap();
        assert_eq!(u16::from_le_bytes(bytes[0..2].try_into().unwrap()), 3);
        assert_eq!(&bytes[2..5], &[9, 9, 9]);
        assert_eq!(bytes.len(), 5);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn raw_pads_to_fixed_length() {
        let path = tmp_path("raw");
        let mut sink = EtiSink::open_raw(&path).unwrap();
        sink.write_frame(&[0xAA; 112]).unwrap();
        drop(sink);

        let mut bytes = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes.len(), RAW_FRAME_LEN);
        assert_eq!(&bytes[..112], &[0xAA; 112][..]);
        assert!(bytes[112..].iter().all(|&b| b == RAW_PAD_BYTE));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn raw_rejects_oversize_frame() {
        let path = tmp_path("raw-oversize");
        let mut sink = EtiSink::open_raw(&path).unwrap();
        let result = sink.write_frame(&[0u8; RAW_FRAME_LEN + 1]);
        assert!(matches!(result, Err(SinkError::FrameTooLarge(_))));
        let _ = std::fs::remove_file(&path);
    }
}
