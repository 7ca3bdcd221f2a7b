//! Canonical PCM WAV header parsing.
//!
//! The parser targets the 44-byte canonical layout: `RIFF` header, a 16-byte `fmt `
//! body, then the `data` chunk. It locates the sample data by scanning a bounded window
//! after the `fmt ` body for the `data` marker, and takes the data length from the
//! declared size field at byte 40. WAV files that carry large metadata chunks between
//! `fmt ` and `data` are not supported.

use crate::error::{Result, WavPlayerError};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::time::Duration;

/// Number of bytes searched for the `data` marker after the `fmt ` body
pub const HEADER_SCAN_WINDOW: usize = 200;

const CANONICAL_HEADER_LEN: u64 = 44;
const DATA_LEN_OFFSET: u64 = 40;
const DATA_MARKER: &[u8; 4] = b"data";
const WAVE_FORMAT_PCM: u16 = 1;

/// Output channel layout derived from the `fmt ` channel count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    /// 1 channel is mono, anything wider is played as stereo
    pub fn from_channel_count(channels: u16) -> Self {
        if channels == 1 { Self::Mono } else { Self::Stereo }
    }

    pub fn channels(self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

/// Playback parameters and data-region location extracted from a WAV header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub channel_layout: ChannelLayout,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Byte offset of the first sample from the start of the file
    pub data_offset: u64,
    /// Declared length of the sample data in bytes
    pub data_len: u32,
}

impl WavHeader {
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample as usize).div_ceil(8)
    }

    /// Bytes per frame (one sample for every channel)
    pub fn block_align(&self) -> usize {
        self.bytes_per_sample() * self.channel_layout.channels() as usize
    }

    /// Byte offset one past the last sample byte
    pub fn data_end(&self) -> u64 {
        self.data_offset + self.data_len as u64
    }

    pub fn duration(&self) -> Duration {
        let bytes_per_second = self.block_align() as f64 * self.sample_rate as f64;
        Duration::from_secs_f64(self.data_len as f64 / bytes_per_second)
    }
}

/// Parse the header of a canonical PCM WAV stream.
///
/// Leaves the reader positioned just after the declared data-length field; callers
/// seek to [`WavHeader::data_offset`] before reading samples.
pub fn parse<R: Read + Seek>(reader: &mut R) -> Result<WavHeader> {
    expect_tag(reader, b"RIFF", "WAV chunk ID invalid")?;
    skip(reader, 4)?;
    expect_tag(reader, b"WAVE", "WAV format invalid")?;

    expect_tag(reader, b"fmt ", "WAV fmt chunk ID invalid")?;
    skip(reader, 4)?;
    let audio_format = read_u16_le(reader)?;
    if audio_format != WAVE_FORMAT_PCM {
        return Err(WavPlayerError::Format(format!(
            "unsupported audio format tag {:#06x}, only PCM is supported",
            audio_format
        )));
    }
    let channels = read_u16_le(reader)?;
    let sample_rate = read_u32_le(reader)?;
    skip(reader, 4 + 2)?; // byte rate, block align
    let bits_per_sample = read_u16_le(reader)?;

    if channels == 0 {
        return Err(WavPlayerError::Format("channel count is 0".to_string()));
    }
    if sample_rate == 0 {
        return Err(WavPlayerError::Format("sample rate is 0".to_string()));
    }
    if !matches!(bits_per_sample, 16 | 24 | 32) {
        return Err(WavPlayerError::Format(format!(
            "unsupported bits per sample: {}",
            bits_per_sample
        )));
    }

    let mut window = [0u8; HEADER_SCAN_WINDOW];
    let window_len = read_up_to(reader, &mut window)?;
    let marker_index = window[..window_len]
        .windows(DATA_MARKER.len())
        .position(|candidate| candidate == DATA_MARKER)
        .ok_or_else(|| WavPlayerError::Format("data chunk not found".to_string()))?;

    reader.seek(SeekFrom::Start(DATA_LEN_OFFSET))?;
    let data_len = read_u32_le(reader)?;

    let header = WavHeader {
        channel_layout: ChannelLayout::from_channel_count(channels),
        sample_rate,
        bits_per_sample,
        data_offset: CANONICAL_HEADER_LEN + marker_index as u64,
        data_len,
    };

    let file_len = reader.seek(SeekFrom::End(0))?;
    if header.data_end() > file_len {
        return Err(WavPlayerError::Format(format!(
            "declared data region {}..{} exceeds file size {}",
            header.data_offset,
            header.data_end(),
            file_len
        )));
    }
    reader.seek(SeekFrom::Start(DATA_LEN_OFFSET + 4))?;

    log::debug!(
        "Parsed WAV header: {:?}, {} Hz, {} bits, data at {} ({} bytes)",
        header.channel_layout,
        header.sample_rate,
        header.bits_per_sample,
        header.data_offset,
        header.data_len
    );

    Ok(header)
}

fn expect_tag<R: Read>(reader: &mut R, tag: &[u8; 4], message: &str) -> Result<()> {
    let mut found = [0u8; 4];
    read_exact(reader, &mut found)?;
    if &found != tag {
        return Err(WavPlayerError::Format(message.to_string()));
    }
    Ok(())
}

fn skip<R: Seek>(reader: &mut R, bytes: i64) -> Result<()> {
    reader.seek(SeekFrom::Current(bytes))?;
    Ok(())
}

fn read_u16_le<R: Read>(reader: &mut R) -> Result<u16> {
    let mut bytes = [0u8; 2];
    read_exact(reader, &mut bytes)?;
    Ok(u16::from_le_bytes(bytes))
}

fn read_u32_le<R: Read>(reader: &mut R) -> Result<u32> {
    let mut bytes = [0u8; 4];
    read_exact(reader, &mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => WavPlayerError::Format("truncated header".to_string()),
        _ => WavPlayerError::Io(e),
    })
}

/// Fill `buf` until it is full or the reader is exhausted
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(WavPlayerError::Io(e)),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{WavBytes, write_hound_wav};
    use std::fs::File;
    use std::io::Cursor;

    #[test]
    fn test_parse_mono_16bit_44100() {
        let bytes = WavBytes::new(1, 44100, 16).data(vec![7u8; 882]).build();
        let header = parse(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(header.channel_layout, ChannelLayout::Mono);
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.bits_per_sample, 16);
        assert_eq!(header.data_offset, 44);
        assert_eq!(header.data_len, 882);
        assert_eq!(header.block_align(), 2);
        assert!((header.duration().as_secs_f64() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_parse_hound_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_hound_wav(&path, 2, 22050, 300);

        let header = parse(&mut File::open(&path).unwrap()).unwrap();
        assert_eq!(header.channel_layout, ChannelLayout::Stereo);
        assert_eq!(header.sample_rate, 22050);
        assert_eq!(header.bits_per_sample, 16);
        assert_eq!(header.data_offset, 44);
        assert_eq!(header.data_len, 300 * 2 * 2);
    }

    #[test]
    fn test_wide_channel_count_plays_as_stereo() {
        let bytes = WavBytes::new(6, 48000, 16).data(vec![1u8; 24]).build();
        let header = parse(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(header.channel_layout, ChannelLayout::Stereo);
    }

    #[test]
    fn test_corrupted_markers_rejected() {
        for (offset, message) in [
            (0, "WAV chunk ID invalid"),
            (8, "WAV format invalid"),
            (12, "WAV fmt chunk ID invalid"),
        ] {
            let mut bytes = WavBytes::new(1, 44100, 16).data(vec![1u8; 16]).build();
            bytes[offset] = b'X';
            match parse(&mut Cursor::new(bytes)) {
                Err(WavPlayerError::Format(found)) => assert_eq!(found, message),
                other => panic!("expected format error at offset {}, got {:?}", offset, other),
            }
        }
    }

    #[test]
    fn test_missing_data_marker_rejected() {
        let mut bytes = WavBytes::new(1, 44100, 16).data(vec![1u8; 400]).build();
        bytes[36..40].copy_from_slice(b"junk");
        match parse(&mut Cursor::new(bytes)) {
            Err(WavPlayerError::Format(message)) => assert_eq!(message, "data chunk not found"),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_data_marker_beyond_scan_window_rejected() {
        // A metadata chunk that pushes `data` past the window
        let bytes = WavBytes::new(1, 44100, 16)
            .extra_chunk(*b"LIST", vec![b'x'; HEADER_SCAN_WINDOW])
            .data(vec![1u8; 16])
            .build();
        assert!(matches!(
            parse(&mut Cursor::new(bytes)),
            Err(WavPlayerError::Format(_))
        ));
    }

    #[test]
    fn test_data_offset_follows_marker_position() {
        let bytes = WavBytes::new(1, 8000, 16)
            .extra_chunk(*b"LIST", vec![b'x'; 12])
            .data(vec![0x80; 20])
            .build();
        let header = parse(&mut Cursor::new(bytes)).unwrap();
        // 8-byte chunk header + 12 bytes of body ahead of the marker
        assert_eq!(header.data_offset, 44 + 20);
    }

    #[test]
    fn test_declared_length_beyond_file_rejected() {
        let mut bytes = WavBytes::new(1, 44100, 16).data(vec![1u8; 100]).build();
        bytes[40..44].copy_from_slice(&1000u32.to_le_bytes());
        assert!(matches!(
            parse(&mut Cursor::new(bytes)),
            Err(WavPlayerError::Format(_))
        ));
    }

    #[test]
    fn test_declared_length_is_authoritative() {
        // Trailing bytes after the data region do not change the declared length
        let bytes = WavBytes::new(1, 44100, 16)
            .data(vec![1u8; 100])
            .trailing(b"dataLIST garbage".to_vec())
            .build();
        let header = parse(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(header.data_len, 100);
    }

    #[test]
    fn test_truncated_header_rejected() {
        let bytes = WavBytes::new(1, 44100, 16).data(vec![1u8; 4]).build();
        for len in [3, 20, 30] {
            assert!(matches!(
                parse(&mut Cursor::new(bytes[..len].to_vec())),
                Err(WavPlayerError::Format(_))
            ));
        }
    }

    #[test]
    fn test_unsupported_fields_rejected() {
        let mut compressed = WavBytes::new(1, 44100, 16).data(vec![1u8; 4]).build();
        compressed[20..22].copy_from_slice(&0x55u16.to_le_bytes());
        assert!(parse(&mut Cursor::new(compressed)).is_err());

        let odd_depth = WavBytes::new(1, 44100, 12).data(vec![1u8; 4]).build();
        assert!(parse(&mut Cursor::new(odd_depth)).is_err());

        // Unsigned 8-bit has no all-zero silence
        let unsigned = WavBytes::new(1, 8000, 8).data(vec![0x80; 4]).build();
        assert!(matches!(
            parse(&mut Cursor::new(unsigned)),
            Err(WavPlayerError::Format(_))
        ));

        let no_rate = WavBytes::new(1, 0, 16).data(vec![1u8; 4]).build();
        assert!(parse(&mut Cursor::new(no_rate)).is_err());
    }
}
