// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use clap::{crate_version, Parser, Subcommand};
use image::RgbImage;
use tracing_subscriber::EnvFilter;

use subaudio::audio::provider::describe_chain;
use subaudio::audio::{open_provider, AudioProvider, SampleRange};
use subaudio::config::{CacheType, Settings};
use subaudio::controller::{AudioEvent, Controller};
use subaudio::playback;
use subaudio::spectrum::{ColorScheme, SpectrumRenderer};
use subaudio::util::timestamp;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Audio decoding, spectrum rendering and playback for subtitle timing."
)]
struct Cli {
    /// Path to a YAML settings file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the cache tier (none, ram or disk).
    #[arg(long, global = true)]
    cache: Option<CacheType>,

    /// Overrides the spectrogram palette (spectrum or icy).
    #[arg(long, global = true)]
    color_scheme: Option<ColorScheme>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Opens a source and prints its format and provider chain.
    Info {
        /// A path, file:// URI, dummy-audio: or video-audio: source.
        source: String,
    },
    /// Renders a spectrogram of a source to an image file.
    Spectrum {
        source: String,
        /// Output image path. The extension picks the format (png, ppm, ...).
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, default_value_t = 1024)]
        width: u32,
        #[arg(long, default_value_t = 256)]
        height: u32,
        /// Time of the first column.
        #[arg(long, default_value_t = 0)]
        start_ms: u64,
        /// Time covered by each column.
        #[arg(long, default_value_t = 10)]
        ms_per_column: u64,
    },
    /// Plays a source, or part of it, through the configured player.
    Play {
        source: String,
        #[arg(long, default_value_t = 0)]
        start_ms: u64,
        /// Stop here instead of at the end of the audio.
        #[arg(long)]
        end_ms: Option<u64>,
    },
    /// Lists the available audio output devices.
    Devices {},
}

/// Loads the settings file, if any, and applies command line overrides.
fn load_settings(cli: &Cli) -> Result<Settings, Box<dyn Error>> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(cache) = cli.cache {
        settings.audio = settings.audio.with_cache(cache);
    }
    if let Some(color_scheme) = cli.color_scheme {
        settings.spectrum = settings.spectrum.with_color_scheme(color_scheme);
    }
    Ok(settings)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    match cli.command {
        Commands::Info { source } => {
            let provider = open_provider(&source, &settings.audio, None)?;
            let format = provider.format();
            println!("Source:   {}", provider.source_name());
            println!("Format:   {}", format);
            println!("Samples:  {}", provider.num_samples());
            println!(
                "Duration: {}",
                timestamp(format.ms_from_samples(provider.num_samples()))
            );
            println!("Chain:    {}", describe_chain(provider.as_ref()));
        }
        Commands::Spectrum {
            source,
            out,
            width,
            height,
            start_ms,
            ms_per_column,
        } => {
            let provider: Arc<dyn AudioProvider> =
                Arc::from(open_provider(&source, &settings.audio, None)?);
            let format = provider.format();
            let samples_per_column = format.samples_from_ms(ms_per_column).max(1);
            let start_column = format.samples_from_ms(start_ms) / samples_per_column;

            let mut renderer = SpectrumRenderer::new(provider, &settings.spectrum)?;
            let mut image = RgbImage::new(width, height);
            renderer.render(&mut image, start_column, samples_per_column, None)?;
            image.save(&out)?;
            println!("Wrote {}x{} spectrogram to {}.", width, height, out.display());
        }
        Commands::Play {
            source,
            start_ms,
            end_ms,
        } => {
            let mut controller = Controller::new(settings)?;
            let events = controller.subscribe();
            controller.open_audio(&source)?;

            let start = controller.samples_from_ms(start_ms)?;
            match end_ms {
                Some(end_ms) => {
                    let end = controller.samples_from_ms(end_ms)?;
                    controller.play_range(SampleRange::new(start, end))?
                }
                None => controller.play_to_end(start)?,
            }

            'playing: loop {
                if let Some(next) = controller.next_tick() {
                    thread::sleep(next.saturating_duration_since(Instant::now()));
                }
                if controller.timer_due(Instant::now()) {
                    controller.on_timer();
                }
                for event in events.try_iter() {
                    match event {
                        AudioEvent::PlaybackPosition(position) => {
                            println!("{}", timestamp(controller.ms_from_samples(position)?))
                        }
                        AudioEvent::PlaybackStopped => break 'playing,
                        _ => {}
                    }
                }
            }
            controller.close_audio();
        }
        Commands::Devices {} => {
            let devices = playback::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
    }

    Ok(())
}
