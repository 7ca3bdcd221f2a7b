//! Output sink abstraction.
//!
//! A sink is the single audio output bus of the device. The engine configures it for
//! each file, hands it one buffer at a time, and waits for the sink to report that the
//! buffer has been fully transferred before handing over the next one.

mod cpal_sink;
#[cfg(test)]
pub(crate) mod mock;

pub use cpal_sink::CpalSink;

use crate::error::Result;
use crate::wav::{ChannelLayout, WavHeader};
use crossbeam_channel::{Sender, TrySendError};

/// Stream format the sink is configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkFormat {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channel_layout: ChannelLayout,
}

impl From<&WavHeader> for SinkFormat {
    fn from(header: &WavHeader) -> Self {
        Self {
            sample_rate: header.sample_rate,
            bits_per_sample: header.bits_per_sample,
            channel_layout: header.channel_layout,
        }
    }
}

/// Handle a sink uses to report that the last written buffer has been transferred.
///
/// Backed by a single-slot channel: `notify` never blocks and never allocates, so it is
/// safe to call from an audio callback.
#[derive(Debug, Clone)]
pub struct CompletionNotifier {
    sender: Sender<u64>,
    generation: u64,
}

impl CompletionNotifier {
    pub(crate) fn new(sender: Sender<u64>, generation: u64) -> Self {
        Self { sender, generation }
    }

    /// Returns `false` if the notification could not be queued
    pub fn notify(&self) -> bool {
        match self.sender.try_send(self.generation) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::trace!("Buffer completion dropped: previous completion still pending");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// The hardware output bus driven by the engine.
///
/// The engine guarantees that `write` is called at most once per completion reported
/// through the notifier (plus the single write that starts the chain after
/// `configure`), so a sink never has more than one buffer outstanding.
pub trait OutputSink: Send + 'static {
    /// Prepare the bus for `format`. Only called while the sink is torn down.
    fn configure(&mut self, format: SinkFormat, notifier: CompletionNotifier) -> Result<()>;

    /// Queue `buffer` for transfer and return immediately. The notifier fires once the
    /// whole buffer has been taken.
    fn write(&mut self, buffer: &[u8]) -> Result<()>;

    /// Tear the bus down. Once this returns the notifier handed to `configure` must not
    /// fire again. Calling this on an unconfigured sink does nothing.
    fn deinit(&mut self);

    /// Switch the output amplifier on or off
    fn set_amplifier(&mut self, _enabled: bool) {}

    /// Size in bytes of the sink's own ring buffer, which must be flushed with silence
    /// before playback is reported as stopped
    fn internal_buffer_len(&self) -> usize;
}
