//! Playback state and the per-file streaming session.
//!
//! - [`PlayState`]: where the engine is in its play / flush / stop cycle
//! - [`PlaybackSession`]: an open WAV file being streamed chunk by chunk

use crate::error::{Result, WavPlayerError};
use crate::wav::{self, WavHeader};
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

/// Represents the current state of the playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlayState {
    /// Sample data is being streamed to the sink
    Playing = 0,
    /// The stream has ended or was stopped; silence is overwriting the sink's ring buffer
    Flushing = 1,
    /// Drained. The sink is kept fed with silence until the next `play()`
    Stopped = 2,
    /// No sink configured
    Idle = 3,
}

impl PlayState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Playing,
            1 => Self::Flushing,
            2 => Self::Stopped,
            _ => Self::Idle,
        }
    }

    /// `Playing` and `Flushing` both count as playing
    pub fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::Flushing)
    }
}

/// An open WAV file positioned inside its data region
#[derive(Debug)]
pub struct PlaybackSession<R = File> {
    reader: R,
    header: WavHeader,
    /// Sample bytes handed out so far
    bytes_delivered: u64,
}

impl PlaybackSession<File> {
    /// Open `path`, parse its header and seek to the first sample
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => WavPlayerError::FileNotFound(path.to_path_buf()),
            _ => WavPlayerError::Io(e),
        })?;
        let session = Self::from_reader(file)?;
        log::debug!("Opened {} for streaming", path.display());
        Ok(session)
    }
}

impl<R: Read + Seek> PlaybackSession<R> {
    pub fn from_reader(mut reader: R) -> Result<Self> {
        let header = wav::parse(&mut reader)?;
        reader.seek(SeekFrom::Start(header.data_offset))?;
        Ok(Self {
            reader,
            header,
            bytes_delivered: 0,
        })
    }

    pub fn header(&self) -> &WavHeader {
        &self.header
    }

    pub fn bytes_delivered(&self) -> u64 {
        self.bytes_delivered
    }

    /// Read the next chunk of sample data into `buf`.
    ///
    /// Returns how many bytes of `buf` should be played; 0 means the stream is
    /// exhausted. Read errors are reported as exhaustion so the engine always moves on
    /// to flushing. Bytes past the declared data length are never handed out.
    pub fn next_chunk(&mut self, buf: &mut [u8]) -> usize {
        let delivered_before = self.bytes_delivered;
        let num_read = match fill(&mut self.reader, buf) {
            Ok(n) => n,
            Err(e) => {
                log::warn!(
                    "Read failed after {} bytes, ending stream: {}",
                    delivered_before,
                    e
                );
                0
            }
        };
        self.bytes_delivered += num_read as u64;

        let declared = self.header.data_len as u64;
        if num_read > 0 && self.bytes_delivered > declared {
            let remaining = declared.saturating_sub(delivered_before) as usize;
            log::debug!(
                "Truncating final chunk from {} to {} bytes at declared length {}",
                num_read,
                remaining,
                declared
            );
            self.bytes_delivered = delivered_before + remaining as u64;
            return remaining;
        }

        num_read
    }
}

/// Read until `buf` is full or the reader reports end of file
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
