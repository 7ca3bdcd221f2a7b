//! The playback engine.
//!
//! [`WavPlayer`] owns an output sink and a refill thread. The sink reports each consumed
//! buffer through a single-slot completion channel; the refill thread drains that channel
//! and runs the refill handler, which queues the next buffer. The foreground only ever
//! starts sessions, requests stops and waits for them to drain.

use crate::buffers::BufferPool;
use crate::config::WavPlayerConfig;
use crate::error::{Result, WavPlayerError};
use crate::playback::{PlayState, PlaybackSession};
use crate::refill::RefillContext;
use crate::sink::{CompletionNotifier, OutputSink};
use crate::state::{EngineState, lock};
use crate::wav::WavHeader;
use crossbeam_channel::{Receiver, Sender, select};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Streaming WAV player driving a single output sink
pub struct WavPlayer<S: OutputSink> {
    config: WavPlayerConfig,
    state: Arc<EngineState>,
    context: Arc<Mutex<RefillContext<S>>>,
    completion_sender: Sender<u64>,
    /// Kept to discard completions left over from a previous configuration
    completions: Receiver<u64>,
    /// Generation of the most recent configure attempt
    generation: u64,
    active_header: Option<WavHeader>,
    shutdown: Option<Sender<()>>,
    refill_thread: Option<JoinHandle<()>>,
}

impl<S: OutputSink> WavPlayer<S> {
    /// Create a player around `sink`. The sink stays torn down until the first `play()`.
    pub fn new(sink: S, config: WavPlayerConfig) -> Result<Self> {
        config.validate()?;

        let buffers = BufferPool::new(config.silence_buffer_len, config.stream_buffer_len);
        let state = Arc::new(EngineState::new());
        let context = Arc::new(Mutex::new(RefillContext::new(sink, buffers)));
        let (completion_sender, completions) = crossbeam_channel::bounded(1);
        let (shutdown, shutdown_receiver) = crossbeam_channel::bounded(1);

        let thread_state = state.clone();
        let thread_context = context.clone();
        let thread_completions = completions.clone();
        let refill_thread = std::thread::Builder::new()
            .name("wavstream-refill".to_string())
            .spawn(move || {
                run_refill_loop(
                    thread_context,
                    thread_state,
                    thread_completions,
                    shutdown_receiver,
                )
            })
            .map_err(|e| WavPlayerError::Engine(format!("Failed to spawn refill thread: {}", e)))?;

        log::debug!(
            "Player created: silence {} bytes, stream {} bytes, drain timeout {:?}",
            config.silence_buffer_len,
            config.stream_buffer_len,
            config.drain_timeout
        );

        Ok(Self {
            config,
            state,
            context,
            completion_sender,
            completions,
            generation: 0,
            active_header: None,
            shutdown: Some(shutdown),
            refill_thread: Some(refill_thread),
        })
    }

    /// Start streaming `name`, resolved against the configured media directory.
    ///
    /// Any session still playing is stopped and drained first. Header errors are
    /// reported before the previous session is touched.
    pub fn play(&mut self, name: impl AsRef<Path>) -> Result<()> {
        let path = self.config.resolve(name);
        if !path.is_file() {
            return Err(WavPlayerError::FileNotFound(path));
        }

        let session = PlaybackSession::open(&path)?;
        self.drain()?;
        self.start_session(session)?;

        if let Some(header) = &self.active_header {
            log::info!(
                "Playing {}: {} Hz, {} bit, {:?}, {:.2}s",
                path.display(),
                header.sample_rate,
                header.bits_per_sample,
                header.channel_layout,
                header.duration().as_secs_f64()
            );
        }
        Ok(())
    }

    /// Request a graceful stop. Does nothing unless samples are being delivered.
    pub fn stop(&self) {
        if self.state.transition(PlayState::Playing, PlayState::Flushing) {
            log::debug!("Stop requested");
        }
    }

    /// True while samples or the trailing flush silence are being delivered
    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn state(&self) -> PlayState {
        self.state.get()
    }

    /// Header of the file currently being played, if any
    pub fn header(&self) -> Option<&WavHeader> {
        self.active_header.as_ref().filter(|_| self.is_playing())
    }

    pub fn config(&self) -> &WavPlayerConfig {
        &self.config
    }

    /// Stop, drain, and tear the sink down with the amplifier disabled.
    ///
    /// The sink is torn down even when the drain times out; the timeout is still
    /// reported.
    pub fn teardown(&mut self) -> Result<()> {
        self.stop();
        let drained = self.state.wait_until_settled(self.config.drain_timeout);
        self.force_idle();
        log::info!("Playback torn down");

        if drained {
            Ok(())
        } else {
            Err(WavPlayerError::DrainTimeout(self.config.drain_timeout))
        }
    }

    /// Stop whatever is playing and wait for the flush to finish.
    ///
    /// On timeout the sink is torn down anyway, so the next `play()` starts clean.
    fn drain(&mut self) -> Result<()> {
        self.stop();
        if self.state.wait_until_settled(self.config.drain_timeout) {
            return Ok(());
        }

        log::warn!(
            "Previous session still draining after {:?}, tearing the sink down",
            self.config.drain_timeout
        );
        self.force_idle();
        Err(WavPlayerError::DrainTimeout(self.config.drain_timeout))
    }

    fn force_idle(&mut self) {
        {
            let mut context = lock(&self.context);
            self.state.set(PlayState::Idle);
            context.shut_down();
        }
        self.active_header = None;
    }

    fn start_session(&mut self, session: PlaybackSession) -> Result<()> {
        let header = *session.header();
        let mut context = lock(&self.context);

        self.state.set(PlayState::Idle);
        self.active_header = None;
        context.shut_down();

        self.generation += 1;
        while self.completions.try_recv().is_ok() {}
        let notifier = CompletionNotifier::new(self.completion_sender.clone(), self.generation);

        context.start(session, notifier, self.generation, &self.state)?;
        self.active_header = Some(header);
        Ok(())
    }
}

impl<S: OutputSink> Drop for WavPlayer<S> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            log::warn!("Teardown on drop: {}", e);
        }
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.refill_thread.take() {
            if handle.join().is_err() {
                log::error!("Refill thread panicked");
            }
        }
    }
}

fn run_refill_loop<S: OutputSink>(
    context: Arc<Mutex<RefillContext<S>>>,
    state: Arc<EngineState>,
    completions: Receiver<u64>,
    shutdown: Receiver<()>,
) {
    log::debug!("Refill thread started");
    loop {
        select! {
            recv(completions) -> message => {
                let Ok(generation) = message else { break };
                let mut context = lock(&context);
                if generation != context.generation() {
                    log::trace!("Ignoring completion from generation {}", generation);
                    continue;
                }
                context.on_buffer_consumed(&state);
            }
            recv(shutdown) -> _ => break,
        }
    }
    log::debug!("Refill thread exiting");
}
