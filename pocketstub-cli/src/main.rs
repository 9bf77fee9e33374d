//! Pocketstub CLI — runs the handheld system stub on a desktop.
//!
//! A fake game loop advances the stub frame by frame: audio comes from a
//! square-wave beeper that a periodic timer gates on and off, the clock is the
//! host's monotonic clock, and the wave-out sink is a CPAL output stream.

use std::cell::Cell;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use pocketstub_core::audio::Volume;
use pocketstub_core::clock::StdTicks;
use pocketstub_engine::host::list_output_devices;
use pocketstub_engine::{CpalSink, Generator, GeneratorSource, NoKeys, Osc, Platform, PlatformConfig, Wave};

#[derive(Debug, Parser)]
#[command(name = "pocketstub", about = "Run the handheld system stub against host audio")]
struct Args {
    /// List output devices and exit.
    #[arg(long)]
    list_devices: bool,

    /// Output device name (default device if omitted).
    #[arg(long)]
    device: Option<String>,

    /// Wave-out rate the game produces, in Hz.
    #[arg(long, default_value_t = 22_050)]
    sample_rate: u32,

    /// Run time in seconds of game time.
    #[arg(long, default_value_t = 5)]
    duration: u64,

    /// Frame length handed to `advance`, in ms.
    #[arg(long, default_value_t = 20)]
    frame_ms: u32,

    /// Beeper pitch in Hz.
    #[arg(long, default_value_t = 440.0)]
    tone_hz: f32,

    /// Beeper gate timer period in ms.
    #[arg(long, default_value_t = 250)]
    timer_ms: u32,

    /// Initial volume, 0..=30 in steps of 5.
    #[arg(long, default_value = "15", value_parser = parse_volume)]
    volume: Volume,
}

fn parse_volume(arg: &str) -> Result<Volume, String> {
    let level: u8 = arg.parse().map_err(|e| format!("{e}"))?;
    let volume = Volume::new(level);
    if volume.level() != level {
        return Err(format!("volume must be a multiple of {} in 0..=30", Volume::STEP));
    }
    Ok(volume)
}

/// Square wave that is silent while its gate is closed.
struct Beeper {
    osc: Osc,
    gate: Rc<Cell<bool>>,
}

impl Generator for Beeper {
    fn reset(&mut self, sr: f32) { self.osc.reset(sr); }

    fn next(&mut self) -> f32 {
        let s = self.osc.next();
        if self.gate.get() { s } else { 0.0 }
    }
}

type Callback = Box<dyn FnMut(u32) -> bool>;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list_devices {
        println!("Available output devices:");
        for name in list_output_devices().context("enumerating output devices")? {
            println!("- {name}");
        }
        return Ok(());
    }
    if args.frame_ms == 0 {
        bail!("--frame-ms must be at least 1");
    }

    let config = PlatformConfig::default()
        .with_sample_rate(args.sample_rate)
        .with_initial_volume(args.volume);
    let sink = match &args.device {
        Some(name) => CpalSink::with_device(name.clone()),
        None => CpalSink::new(),
    };

    let mut stub: Box<Platform<StdTicks, CpalSink, GeneratorSource<Beeper>, Callback>> =
        Box::new(Platform::new(config, StdTicks::new(), sink, NoKeys));

    let gate = Rc::new(Cell::new(true));
    let mut osc = Osc::new(args.tone_hz, Wave::Square);
    osc.set_gain(0.5);
    let beeper = Beeper { osc, gate: Rc::clone(&gate) };
    stub.start_audio(GeneratorSource::new(beeper, args.sample_rate))
        .context("opening the audio sink")?;

    let beats = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&beats);
    stub.add_timer(
        args.timer_ms,
        Box::new(move |_| {
            gate.set(!gate.get());
            counter.set(counter.get() + 1);
            true
        }),
    )
    .context("scheduling the gate timer")?;

    log::info!(
        "running {} s of game time in {} ms frames (beeper {} Hz, gate every {} ms)",
        args.duration,
        args.frame_ms,
        args.tone_hz,
        args.timer_ms
    );

    let end = args.duration * 1000;
    let mut frames = 0u64;
    while stub.game_time() < end {
        stub.process_events();
        if stub.input().quit {
            break;
        }
        let stats = stub.advance(args.frame_ms);
        frames += 1;
        if frames % 50 == 0 {
            log::debug!(
                "frame {frames}: t={} ms, {} samples, {} scans",
                stub.timestamp(),
                stats.samples,
                stats.scans
            );
        }
    }

    stub.stop_audio();
    log::info!("done: {frames} frames, {} gate flips, clock {} ms", beats.get(), stub.timestamp());
    Ok(())
}
