//! Configuration for wavstream

use crate::error::{Result, WavPlayerError};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WavPlayerConfig {
    /// Length in bytes of the all-zero buffer written whenever no samples are delivered
    pub silence_buffer_len: usize,
    /// Length in bytes of the buffer each refill reads sample data into
    pub stream_buffer_len: usize,
    /// Length in bytes of the output sink's internal ring buffer
    pub internal_buffer_len: usize,
    /// Upper bound on how long `play()` and teardown wait for a previous session to drain
    pub drain_timeout: Duration,
    /// Directory that relative file names passed to `play()` are resolved against
    pub media_dir: PathBuf,
}

impl Default for WavPlayerConfig {
    fn default() -> Self {
        Self {
            silence_buffer_len: 1000,
            stream_buffer_len: 10000,
            internal_buffer_len: 20000,
            drain_timeout: Duration::from_secs(5),
            media_dir: PathBuf::from("."),
        }
    }
}

impl WavPlayerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn silence_buffer_len(mut self, len: usize) -> Self {
        self.silence_buffer_len = len;
        self
    }

    pub fn stream_buffer_len(mut self, len: usize) -> Self {
        self.stream_buffer_len = len;
        self
    }

    pub fn internal_buffer_len(mut self, len: usize) -> Self {
        self.internal_buffer_len = len;
        self
    }

    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn media_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.media_dir = dir.into();
        self
    }

    /// Largest single write the engine will ever hand to a sink
    pub fn max_write_len(&self) -> usize {
        self.silence_buffer_len.max(self.stream_buffer_len)
    }

    pub fn validate(&self) -> Result<()> {
        if self.silence_buffer_len == 0 {
            return Err(WavPlayerError::Configuration(
                "silence buffer length must be greater than 0".to_string(),
            ));
        }
        if self.stream_buffer_len == 0 {
            return Err(WavPlayerError::Configuration(
                "stream buffer length must be greater than 0".to_string(),
            ));
        }
        if self.internal_buffer_len == 0 {
            return Err(WavPlayerError::Configuration(
                "internal buffer length must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve a file name against `media_dir`. Absolute paths are returned unchanged.
    pub fn resolve(&self, name: impl AsRef<Path>) -> PathBuf {
        let name = name.as_ref();
        if name.is_absolute() {
            name.to_path_buf()
        } else {
            self.media_dir.join(name)
        }
    }
}
