//! Output sink backed by the default cpal output device.
//!
//! The sink's internal ring buffer is a byte ring shared with the cpal data callback.
//! `write` stages one buffer and moves as much of it into the ring as fits; the data
//! callback drains whole samples from the ring, tops the ring up from the staged buffer,
//! and reports completion once the staged buffer has been taken in full.
//!
//! `cpal::Stream` cannot move between threads, so a dedicated stream thread owns it and
//! is driven through a command channel.

use super::{CompletionNotifier, OutputSink, SinkFormat};
use crate::config::WavPlayerConfig;
use crate::error::{Result, WavPlayerError};
use crate::state::lock;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use crossbeam_channel::{Receiver, Sender};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

const MAX_SOURCE_CHANNELS: usize = 2;
const MAX_BYTES_PER_SAMPLE: usize = 4;

/// Sink that plays through the host's default output device
pub struct CpalSink {
    internal_buffer_len: usize,
    transfer: Arc<Mutex<Transfer>>,
    amplifier: Arc<AtomicBool>,
    commands: Option<Sender<StreamCommand>>,
    stream_thread: Option<JoinHandle<()>>,
    configured: bool,
}

impl CpalSink {
    /// Create a sink sized from `config`. No device is opened until `configure`.
    pub fn new(config: &WavPlayerConfig) -> Result<Self> {
        config.validate()?;

        let transfer = Arc::new(Mutex::new(Transfer::new(config.max_write_len())));
        let amplifier = Arc::new(AtomicBool::new(false));
        let (commands, command_receiver) = crossbeam_channel::unbounded();

        let thread_transfer = transfer.clone();
        let thread_amplifier = amplifier.clone();
        let stream_thread = std::thread::Builder::new()
            .name("wavstream-cpal".to_string())
            .spawn(move || run_stream_thread(command_receiver, thread_transfer, thread_amplifier))?;

        Ok(Self {
            internal_buffer_len: config.internal_buffer_len,
            transfer,
            amplifier,
            commands: Some(commands),
            stream_thread: Some(stream_thread),
            configured: false,
        })
    }
}

impl OutputSink for CpalSink {
    fn configure(&mut self, format: SinkFormat, notifier: CompletionNotifier) -> Result<()> {
        if self.configured {
            return Err(WavPlayerError::Engine(
                "Sink is already configured; deinit it first".into(),
            ));
        }
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| WavPlayerError::Engine("Stream thread has shut down".into()))?;

        let (producer, consumer) = HeapRb::<u8>::new(self.internal_buffer_len).split();
        {
            let mut transfer = lock(&self.transfer);
            transfer.reset();
            transfer.producer = Some(producer);
            transfer.notifier = Some(notifier);
        }

        let (reply, reply_receiver) = crossbeam_channel::bounded(1);
        let opened = commands
            .send(StreamCommand::Start {
                format,
                consumer,
                reply,
            })
            .map_err(|_| WavPlayerError::Engine("Stream thread has shut down".into()))
            .and_then(|()| {
                reply_receiver.recv().map_err(|_| {
                    WavPlayerError::Engine("Stream thread exited while opening the device".into())
                })?
            });

        if let Err(e) = opened {
            lock(&self.transfer).reset();
            return Err(e);
        }

        self.configured = true;
        Ok(())
    }

    fn write(&mut self, buffer: &[u8]) -> Result<()> {
        lock(&self.transfer).stage(buffer)
    }

    fn deinit(&mut self) {
        if !self.configured {
            return;
        }
        lock(&self.transfer).reset();
        if let Some(commands) = &self.commands {
            let _ = commands.send(StreamCommand::Stop);
        }
        self.amplifier.store(false, Ordering::Relaxed);
        self.configured = false;
    }

    fn set_amplifier(&mut self, enabled: bool) {
        self.amplifier.store(enabled, Ordering::Relaxed);
    }

    fn internal_buffer_len(&self) -> usize {
        self.internal_buffer_len
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.deinit();
        // Closing the command channel ends the stream thread
        self.commands.take();
        if let Some(handle) = self.stream_thread.take() {
            let _ = handle.join();
        }
    }
}

/// The buffer currently being moved into the ring
struct Transfer {
    producer: Option<HeapProd<u8>>,
    staging: Box<[u8]>,
    staged_len: usize,
    staged_pos: usize,
    notifier: Option<CompletionNotifier>,
}

impl Transfer {
    fn new(capacity: usize) -> Self {
        Self {
            producer: None,
            staging: vec![0u8; capacity].into_boxed_slice(),
            staged_len: 0,
            staged_pos: 0,
            notifier: None,
        }
    }

    fn has_pending(&self) -> bool {
        self.staged_pos < self.staged_len
    }

    fn stage(&mut self, buffer: &[u8]) -> Result<()> {
        if self.producer.is_none() {
            return Err(WavPlayerError::Engine(
                "Write issued to an unconfigured sink".into(),
            ));
        }
        if self.has_pending() {
            return Err(WavPlayerError::Engine(
                "Write issued while the previous buffer is still pending".into(),
            ));
        }
        if buffer.len() > self.staging.len() {
            return Err(WavPlayerError::Configuration(format!(
                "Buffer of {} bytes exceeds staging capacity of {} bytes",
                buffer.len(),
                self.staging.len()
            )));
        }

        self.staging[..buffer.len()].copy_from_slice(buffer);
        self.staged_len = buffer.len();
        self.staged_pos = 0;

        if buffer.is_empty() {
            self.complete();
        } else {
            self.pump();
        }
        Ok(())
    }

    /// Move staged bytes into the ring; report completion once all of them are in
    fn pump(&mut self) {
        if !self.has_pending() {
            return;
        }
        let Some(producer) = self.producer.as_mut() else {
            return;
        };
        self.staged_pos += producer.push_slice(&self.staging[self.staged_pos..self.staged_len]);
        if !self.has_pending() {
            self.complete();
        }
    }

    fn complete(&self) {
        if let Some(notifier) = &self.notifier {
            notifier.notify();
        }
    }

    fn reset(&mut self) {
        self.producer = None;
        self.notifier = None;
        self.staged_len = 0;
        self.staged_pos = 0;
    }
}

enum StreamCommand {
    Start {
        format: SinkFormat,
        consumer: HeapCons<u8>,
        reply: Sender<Result<()>>,
    },
    Stop,
}

fn run_stream_thread(
    commands: Receiver<StreamCommand>,
    transfer: Arc<Mutex<Transfer>>,
    amplifier: Arc<AtomicBool>,
) {
    let mut stream: Option<cpal::Stream> = None;

    for command in commands.iter() {
        match command {
            StreamCommand::Start {
                format,
                consumer,
                reply,
            } => {
                stream = None;
                let result = open_stream(format, consumer, transfer.clone(), amplifier.clone())
                    .map(|opened| stream = Some(opened));
                let _ = reply.send(result);
            }
            StreamCommand::Stop => {
                if stream.take().is_some() {
                    log::debug!("cpal output stream closed");
                }
            }
        }
    }

    log::debug!("cpal stream thread exiting");
}

fn open_stream(
    format: SinkFormat,
    consumer: HeapCons<u8>,
    transfer: Arc<Mutex<Transfer>>,
    amplifier: Arc<AtomicBool>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or_else(|| {
        WavPlayerError::AudioDevice("No default output device available".into())
    })?;

    let source_channels = format.channel_layout.channels();
    let sample_rate = cpal::SampleRate(format.sample_rate);

    // Prefer the narrowest layout that fits; mono is duplicated onto wider devices
    let supported = device
        .supported_output_configs()
        .map_err(|e| {
            WavPlayerError::AudioDevice(format!("Failed to query output configs: {}", e))
        })?
        .filter(|range| {
            range.channels() >= source_channels
                && range.min_sample_rate() <= sample_rate
                && range.max_sample_rate() >= sample_rate
        })
        .min_by_key(|range| range.channels())
        .ok_or_else(|| {
            WavPlayerError::AudioDevice(format!(
                "Device does not support {} Hz with {} channel(s)",
                format.sample_rate, source_channels
            ))
        })?;

    let config = cpal::StreamConfig {
        channels: supported.channels(),
        sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let reader = SampleReader {
        consumer,
        bytes_per_sample: (format.bits_per_sample as usize).div_ceil(8),
        source_channels: source_channels as usize,
    };

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, reader, transfer, amplifier)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, reader, transfer, amplifier)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, reader, transfer, amplifier)?,
        cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, reader, transfer, amplifier)?,
        other => {
            return Err(WavPlayerError::AudioDevice(format!(
                "Unsupported device sample format {:?}",
                other
            )));
        }
    };

    stream.play().map_err(|e| {
        WavPlayerError::AudioDevice(format!("Failed to start stream: {}", e))
    })?;

    log::info!(
        "Opened output stream: {} Hz, {} device channel(s), {} bits per source sample",
        format.sample_rate,
        config.channels,
        format.bits_per_sample
    );

    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut reader: SampleReader,
    transfer: Arc<Mutex<Transfer>>,
    amplifier: Arc<AtomicBool>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let device_channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let audible = amplifier.load(Ordering::Relaxed);
                let mut frame = [0.0f32; MAX_SOURCE_CHANNELS];

                for output in data.chunks_mut(device_channels) {
                    let has_frame = reader.next_frame(&mut frame);
                    for (channel, sample) in output.iter_mut().enumerate() {
                        let value = if has_frame && audible {
                            route(&frame, reader.source_channels, channel)
                        } else {
                            0.0
                        };
                        *sample = T::from_sample(value);
                    }
                }

                // Never wait on the writer from the audio callback
                if let Ok(mut transfer) = transfer.try_lock() {
                    transfer.pump();
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| WavPlayerError::AudioDevice(format!("Failed to build stream: {}", e)))
}

/// Pulls whole PCM frames out of the byte ring
struct SampleReader {
    consumer: HeapCons<u8>,
    bytes_per_sample: usize,
    source_channels: usize,
}

impl SampleReader {
    /// Decode the next frame into `frame`. Returns `false` on underrun, leaving the ring
    /// untouched until a whole frame is available.
    fn next_frame(&mut self, frame: &mut [f32; MAX_SOURCE_CHANNELS]) -> bool {
        let frame_len = self.bytes_per_sample * self.source_channels;
        if self.consumer.occupied_len() < frame_len {
            return false;
        }

        let mut scratch = [0u8; MAX_BYTES_PER_SAMPLE];
        for slot in frame.iter_mut().take(self.source_channels) {
            let raw = &mut scratch[..self.bytes_per_sample];
            self.consumer.pop_slice(raw);
            *slot = decode_sample(raw);
        }
        true
    }
}

fn route(frame: &[f32; MAX_SOURCE_CHANNELS], source_channels: usize, device_channel: usize) -> f32 {
    if source_channels == 1 {
        frame[0]
    } else if device_channel < source_channels {
        frame[device_channel]
    } else {
        0.0
    }
}

/// Convert one signed little-endian PCM sample to `f32` in [-1, 1).
/// An all-zero sample is silence at every supported width.
fn decode_sample(raw: &[u8]) -> f32 {
    match *raw {
        [b0, b1] => i16::from_le_bytes([b0, b1]) as f32 / 32768.0,
        [b0, b1, b2] => (i32::from_le_bytes([0, b0, b1, b2]) >> 8) as f32 / 8_388_608.0,
        [b0, b1, b2, b3] => i32::from_le_bytes([b0, b1, b2, b3]) as f32 / 2_147_483_648.0,
        _ => 0.0,
    }
}
