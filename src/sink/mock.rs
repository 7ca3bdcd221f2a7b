//! Recording sink used by the engine tests

use super::{CompletionNotifier, OutputSink, SinkFormat};
use crate::error::{Result, WavPlayerError};
use crate::state::lock;
use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SinkEvent {
    Configure(SinkFormat),
    /// A write of `len` bytes; `silent` when every byte was zero
    Write { len: usize, silent: bool },
    Deinit,
    Amplifier(bool),
}

#[derive(Debug, Default)]
pub(crate) struct Recording {
    pub events: Vec<SinkEvent>,
    /// Concatenation of every non-silent write
    pub audio: Vec<u8>,
}

impl Recording {
    pub fn writes(&self) -> impl Iterator<Item = (usize, bool)> + '_ {
        self.events.iter().filter_map(|event| match event {
            SinkEvent::Write { len, silent } => Some((*len, *silent)),
            _ => None,
        })
    }

    pub fn configure_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, SinkEvent::Configure(_)))
            .count()
    }
}

/// Records everything the engine asks of it.
///
/// In paced mode a pacer thread completes every write `pace` after it was issued,
/// simulating the bus draining the buffer. `deinit` joins the pacer, so no completion
/// from an earlier configuration arrives afterwards. In manual mode nothing completes;
/// tests drive the refill handler directly.
pub(crate) struct RecordingSink {
    recording: Arc<Mutex<Recording>>,
    internal_buffer_len: usize,
    pace: Option<Duration>,
    configured: bool,
    pacer: Option<Pacer>,
    fail_configure: bool,
}

struct Pacer {
    writes: Sender<()>,
    handle: JoinHandle<()>,
}

impl Pacer {
    fn spawn(notifier: CompletionNotifier, pace: Duration) -> Self {
        let (writes, pending) = crossbeam_channel::unbounded::<()>();
        let handle = std::thread::spawn(move || {
            for () in pending.iter() {
                std::thread::sleep(pace);
                notifier.notify();
            }
        });
        Self { writes, handle }
    }

    fn stop(self) {
        drop(self.writes);
        let _ = self.handle.join();
    }
}

impl RecordingSink {
    pub fn manual(internal_buffer_len: usize) -> Self {
        Self {
            recording: Arc::new(Mutex::new(Recording::default())),
            internal_buffer_len,
            pace: None,
            configured: false,
            pacer: None,
            fail_configure: false,
        }
    }

    pub fn paced(internal_buffer_len: usize, pace: Duration) -> Self {
        let mut sink = Self::manual(internal_buffer_len);
        sink.pace = Some(pace);
        sink
    }

    pub fn failing_configure(mut self) -> Self {
        self.fail_configure = true;
        self
    }

    pub fn recording(&self) -> Arc<Mutex<Recording>> {
        self.recording.clone()
    }

    fn record(&self, event: SinkEvent) {
        lock(&self.recording).events.push(event);
    }
}

impl OutputSink for RecordingSink {
    fn configure(&mut self, format: SinkFormat, notifier: CompletionNotifier) -> Result<()> {
        if self.fail_configure {
            return Err(WavPlayerError::AudioDevice("no such device".into()));
        }
        self.pacer = self.pace.map(|pace| Pacer::spawn(notifier, pace));
        self.configured = true;
        self.record(SinkEvent::Configure(format));
        Ok(())
    }

    fn write(&mut self, buffer: &[u8]) -> Result<()> {
        if !self.configured {
            return Err(WavPlayerError::Engine("write before configure".into()));
        }

        let silent = buffer.iter().all(|&b| b == 0);
        {
            let mut recording = lock(&self.recording);
            recording.events.push(SinkEvent::Write {
                len: buffer.len(),
                silent,
            });
            if !silent {
                recording.audio.extend_from_slice(buffer);
            }
        }

        if let Some(pacer) = &self.pacer {
            let _ = pacer.writes.send(());
        }
        Ok(())
    }

    fn deinit(&mut self) {
        if let Some(pacer) = self.pacer.take() {
            pacer.stop();
        }
        if std::mem::take(&mut self.configured) {
            self.record(SinkEvent::Deinit);
        }
    }

    fn set_amplifier(&mut self, enabled: bool) {
        self.record(SinkEvent::Amplifier(enabled));
    }

    fn internal_buffer_len(&self) -> usize {
        self.internal_buffer_len
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        if let Some(pacer) = self.pacer.take() {
            pacer.stop();
        }
    }
}
