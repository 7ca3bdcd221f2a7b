//! Play a WAV file through the default output device.
//!
//! Usage: `cargo run --example play_wav -- <file.wav> [stop-after-ms]`

use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use wavstream::{CpalSink, WavPlayer, WavPlayerConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(file) = args.get(1) else {
        anyhow::bail!("usage: {} <file.wav> [stop-after-ms]", args[0]);
    };
    let stop_after = args
        .get(2)
        .map(|ms| ms.parse::<u64>().map(Duration::from_millis))
        .transpose()
        .context("stop-after must be a number of milliseconds")?;

    let config = WavPlayerConfig::new();
    let sink = CpalSink::new(&config).context("Failed to create output sink")?;
    let mut player = WavPlayer::new(sink, config)?;

    player
        .play(file)
        .with_context(|| format!("Failed to play {}", file))?;
    if let Some(header) = player.header() {
        println!(
            "{}: {} Hz, {} bit, {:?}, {:.2}s",
            file,
            header.sample_rate,
            header.bits_per_sample,
            header.channel_layout,
            header.duration().as_secs_f64()
        );
    }

    let started = Instant::now();
    let mut stop_requested = false;
    while player.is_playing() {
        if let Some(limit) = stop_after {
            if !stop_requested && started.elapsed() >= limit {
                println!("Stopping after {:?}", limit);
                player.stop();
                stop_requested = true;
            }
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    println!("Finished after {:.2}s", started.elapsed().as_secs_f64());
    player.teardown()?;
    Ok(())
}
