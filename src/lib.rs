//! Streaming PCM WAV playback.
//!
//! `wavstream` plays uncompressed WAV files through a single output bus without loading
//! them into memory. Sample data is read in fixed-size chunks, each chunk is handed to the
//! sink as one buffer, and the next chunk is read when the sink reports that the previous
//! one has been consumed. After the last chunk (or a stop request) the sink's ring buffer
//! is flushed with silence so the tail of the file is heard in full and nothing stale is
//! replayed.
//!
//! ```no_run
//! use wavstream::{CpalSink, WavPlayer, WavPlayerConfig};
//!
//! let config = WavPlayerConfig::new().media_dir("/usr/share/sounds");
//! let sink = CpalSink::new(&config)?;
//! let mut player = WavPlayer::new(sink, config)?;
//! player.play("alarm.wav")?;
//! while player.is_playing() {
//!     std::thread::sleep(std::time::Duration::from_millis(50));
//! }
//! # Ok::<(), wavstream::WavPlayerError>(())
//! ```

pub mod buffers;
pub mod config;
pub mod engine;
pub mod error;
pub mod playback;
mod refill;
pub mod sink;
pub mod state;
pub mod wav;

#[cfg(test)]
mod test_support;

pub use config::WavPlayerConfig;
pub use engine::WavPlayer;
pub use error::{Result, WavPlayerError};
pub use playback::{PlayState, PlaybackSession};
pub use sink::{CompletionNotifier, CpalSink, OutputSink, SinkFormat};
pub use wav::{ChannelLayout, WavHeader};
