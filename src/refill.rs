//! The buffer-consumed handler.
//!
//! [`RefillContext`] holds everything the handler touches: the sink, the fixed buffers,
//! the open session and the flush counter. Each completion reported by the sink runs
//! [`RefillContext::on_buffer_consumed`] once, which issues exactly one write (or none
//! when idle). The handler never allocates and never returns an error.

use crate::buffers::BufferPool;
use crate::error::Result;
use crate::playback::{PlayState, PlaybackSession};
use crate::sink::{CompletionNotifier, OutputSink, SinkFormat};
use crate::state::{EngineState, flush_cycle_count};
use std::fs::File;
use std::io::{Read, Seek};

pub(crate) struct RefillContext<S, R = File> {
    sink: S,
    buffers: BufferPool,
    session: Option<PlaybackSession<R>>,
    /// Silence writes per flush, fixed when the sink is started
    flush_cycles: u32,
    flush_remaining: u32,
    /// Generation of the notifier handed to the sink at the last start
    generation: u64,
}

impl<S: OutputSink, R: Read + Seek> RefillContext<S, R> {
    pub fn new(sink: S, buffers: BufferPool) -> Self {
        Self {
            sink,
            buffers,
            session: None,
            flush_cycles: 0,
            flush_remaining: 0,
            generation: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[cfg(test)]
    pub fn flush_cycles(&self) -> u32 {
        self.flush_cycles
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Reconfigure the sink for `session` and start streaming it.
    ///
    /// The caller has already moved the engine to `Idle` and torn the sink down. On
    /// error the engine stays `Idle`.
    pub fn start(
        &mut self,
        session: PlaybackSession<R>,
        notifier: CompletionNotifier,
        generation: u64,
        state: &EngineState,
    ) -> Result<()> {
        let format = SinkFormat::from(session.header());
        self.sink.configure(format, notifier)?;

        self.generation = generation;
        self.flush_cycles =
            flush_cycle_count(self.sink.internal_buffer_len(), self.buffers.silence_len());
        self.flush_remaining = self.flush_cycles;
        log::debug!(
            "Sink started, {} silence writes per flush",
            self.flush_cycles
        );
        self.session = Some(session);
        state.set(PlayState::Playing);

        // First write primes the sink; every later one answers a completion
        self.write_silence();
        self.sink.set_amplifier(true);
        Ok(())
    }

    /// Amplifier off, session closed, sink torn down
    pub fn shut_down(&mut self) {
        self.sink.set_amplifier(false);
        self.sink.deinit();
        if self.session.take().is_some() {
            log::debug!("Closed session on teardown");
        }
    }

    pub fn on_buffer_consumed(&mut self, state: &EngineState) {
        match state.get() {
            PlayState::Playing => self.refill(state),
            PlayState::Flushing => self.flush(state),
            PlayState::Stopped => self.write_silence(),
            PlayState::Idle => {}
        }
    }

    fn refill(&mut self, state: &EngineState) {
        let num_read = match self.session.as_mut() {
            Some(session) => session.next_chunk(self.buffers.stream_mut()),
            None => 0,
        };

        if num_read == 0 {
            if let Some(session) = self.session.take() {
                log::debug!(
                    "End of stream after {} bytes, flushing",
                    session.bytes_delivered()
                );
            }
            state.transition(PlayState::Playing, PlayState::Flushing);
            self.write_silence();
            return;
        }

        if let Err(e) = self.sink.write(self.buffers.stream(num_read)) {
            log::error!("Sink rejected {} byte sample buffer: {}", num_read, e);
        }
    }

    fn flush(&mut self, state: &EngineState) {
        if self.session.take().is_some() {
            log::debug!("Stop requested, closed session");
        }

        self.write_silence();
        self.flush_remaining = self.flush_remaining.saturating_sub(1);
        if self.flush_remaining == 0 {
            state.transition(PlayState::Flushing, PlayState::Stopped);
        }
    }

    fn write_silence(&mut self) {
        if let Err(e) = self.sink.write(self.buffers.silence()) {
            log::error!("Sink rejected silence buffer: {}", e);
        }
    }
}
