//! Fixtures shared by the unit tests

use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;

/// Hand-assembled WAV bytes, for headers `hound` will not write (corrupt, oddly laid out)
pub(crate) struct WavBytes {
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    extra_chunks: Vec<([u8; 4], Vec<u8>)>,
    data: Vec<u8>,
    trailing: Vec<u8>,
}

impl WavBytes {
    pub(crate) fn new(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        Self {
            channels,
            sample_rate,
            bits_per_sample,
            extra_chunks: Vec::new(),
            data: Vec::new(),
            trailing: Vec::new(),
        }
    }

    pub(crate) fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Chunk placed between the `fmt ` body and `data`
    pub(crate) fn extra_chunk(mut self, tag: [u8; 4], body: Vec<u8>) -> Self {
        self.extra_chunks.push((tag, body));
        self
    }

    /// Bytes appended after the data region
    pub(crate) fn trailing(mut self, trailing: Vec<u8>) -> Self {
        self.trailing = trailing;
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let block_align = self.channels * self.bits_per_sample.div_ceil(8);
        let byte_rate = self.sample_rate * block_align as u32;

        let mut body = Vec::new();
        body.extend_from_slice(b"WAVE");
        body.extend_from_slice(b"fmt ");
        body.extend_from_slice(&16u32.to_le_bytes());
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&self.channels.to_le_bytes());
        body.extend_from_slice(&self.sample_rate.to_le_bytes());
        body.extend_from_slice(&byte_rate.to_le_bytes());
        body.extend_from_slice(&block_align.to_le_bytes());
        body.extend_from_slice(&self.bits_per_sample.to_le_bytes());
        for (tag, chunk) in &self.extra_chunks {
            body.extend_from_slice(tag);
            body.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
            body.extend_from_slice(chunk);
        }
        body.extend_from_slice(b"data");
        body.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        body.extend_from_slice(&self.data);
        body.extend_from_slice(&self.trailing);

        let mut bytes = Vec::with_capacity(body.len() + 8);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&body);
        bytes
    }
}

/// Sample bytes with no all-zero run long enough to be mistaken for a silence buffer
pub(crate) fn pattern_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 + 1).collect()
}

/// Write a 16-bit PCM file with `frames` frames of a non-silent ramp
pub(crate) fn write_hound_wav(path: &Path, channels: u16, sample_rate: u32, frames: usize) {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).expect("Failed to create test WAV");
    for i in 0..frames * channels as usize {
        writer
            .write_sample((i % 1000) as i16 + 1)
            .expect("Failed to write test sample");
    }
    writer.finalize().expect("Failed to finalize test WAV");
}

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
