use clap::{Args, Parser, Subcommand};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use stem_mixer::config::{load_config_or_default, EngineConfig};
use stem_mixer::state::{EffectFamily, EqSettings};
use stem_mixer::{Catalog, Command, FileSource, LogNotifier, MixSession, TrackId};

#[derive(Parser)]
#[command(name = "stem-mixer", version, about = "Mix a session's stems live or bounce them to WAV")]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Args)]
struct SessionArgs {
    /// Catalog JSON listing each session's stems
    #[arg(long)]
    catalog: PathBuf,
    /// Session id in the catalog
    #[arg(long)]
    session: String,
    /// Directory relative stem locations resolve against
    #[arg(long)]
    root: Option<PathBuf>,
    /// Engine config JSON
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Mode {
    /// Render the session's mix to a WAV file
    Export {
        #[command(flatten)]
        session: SessionArgs,
        /// Output path (defaults to "<title>_mixed.wav")
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Play the session through the default output device
    Play {
        #[command(flatten)]
        session: SessionArgs,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.mode {
        Mode::Export { session, out } => export(&session, out),
        Mode::Play { session } => play(&session),
    }
}

fn open_session(args: &SessionArgs, config: EngineConfig) -> Result<MixSession, Box<dyn std::error::Error>> {
    let catalog = Catalog::load(&args.catalog)?;
    let root = match &args.root {
        Some(root) => root.clone(),
        None => args
            .catalog
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let session = MixSession::from_catalog(
        config,
        &catalog,
        &args.session,
        Box::new(FileSource::new(root)),
        Box::new(LogNotifier),
    )?;
    Ok(session)
}

fn load_engine_config(args: &SessionArgs) -> EngineConfig {
    match &args.config {
        Some(path) => load_config_or_default(path),
        None => EngineConfig::default(),
    }
}

fn export(args: &SessionArgs, out: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(args, load_engine_config(args))?;
    let mix = session.export(&mut |stage| println!("Export: {}%", stage.percent()))?;
    let path = out.unwrap_or_else(|| PathBuf::from(&mix.filename));
    std::fs::write(&path, &mix.bytes)?;
    println!("Wrote {} ({} bytes)", path.display(), mix.bytes.len());
    session.close();
    Ok(())
}

fn play(args: &SessionArgs) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize cpal
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or("No output device available")?;
    println!("Using audio device: {}", device.name()?);

    let default_config = device.default_output_config()?;
    let sample_format = default_config.sample_format();
    let stream_config: cpal::StreamConfig = default_config.into();

    // The live context runs at the device rate
    let mut config = load_engine_config(args);
    config.sample_rate = stream_config.sample_rate.0;

    let session = Arc::new(Mutex::new(open_session(args, config)?));
    {
        let session = session.lock();
        println!("\nSession '{}':", session.title());
        for track in &session.snapshot().tracks {
            println!("  {} - {}", track.id, track.name);
        }
        println!("Duration: {:.2}s", session.duration());
    }

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, session.clone())?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, session.clone())?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, session.clone())?,
        _ => return Err("Unsupported sample format".into()),
    };
    stream.play()?;
    print_help();

    // Frame ticker: sampling and metering loops
    let running = Arc::new(AtomicBool::new(true));
    let ticker = {
        let session = session.clone();
        let running = running.clone();
        thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(16));
                session.lock().on_frame();
            }
        })
    };

    loop {
        let mut input = String::new();
        print!("> ");
        io::stdout().flush()?;
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let parts: Vec<&str> = input.split_whitespace().collect();
        if matches!(parts.first(), Some(&"q") | Some(&"quit")) {
            break;
        }
        let mut session = session.lock();
        if let Err(message) = run_command(&mut session, &parts) {
            println!("{}", message);
        }
    }

    running.store(false, Ordering::Relaxed);
    let _ = ticker.join();
    session.lock().close();
    drop(stream);
    Ok(())
}

fn parse<T: std::str::FromStr>(parts: &[&str], index: usize, usage: &str) -> Result<T, String> {
    parts
        .get(index)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| format!("Usage: {}", usage))
}

fn track_arg(parts: &[&str], usage: &str) -> Result<TrackId, String> {
    parts
        .get(1)
        .map(|s| TrackId::from(*s))
        .ok_or_else(|| format!("Usage: {}", usage))
}

fn run_command(session: &mut MixSession, parts: &[&str]) -> Result<(), String> {
    let Some(&name) = parts.first() else {
        session.toggle_play_all();
        return Ok(());
    };

    match name {
        "p" | "play" => session.play_all(),
        "pause" => session.pause_all(),
        "toggle" => session.toggle_track(&track_arg(parts, "toggle <id>")?),
        "seek" => session.seek_all(parse(parts, 1, "seek <seconds>")?),
        "loop" => match parts.get(1) {
            Some(&"off") => {
                let window = session.loop_window();
                session.set_loop(false, window.start, window.end);
            }
            _ => session.set_loop(
                true,
                parse(parts, 1, "loop <start> <end> | loop off")?,
                parse(parts, 2, "loop <start> <end> | loop off")?,
            ),
        },
        "volume" => {
            let id = track_arg(parts, "volume <id> <0..100>")?;
            session.dispatch(Command::SetVolume(id, parse(parts, 2, "volume <id> <0..100>")?));
        }
        "pan" => {
            let id = track_arg(parts, "pan <id> <-100..100>")?;
            session.dispatch(Command::SetPan(id, parse(parts, 2, "pan <id> <-100..100>")?));
        }
        "mute" => {
            session.dispatch(Command::ToggleMute(track_arg(parts, "mute <id>")?));
        }
        "solo" => {
            session.dispatch(Command::ToggleSolo(track_arg(parts, "solo <id>")?));
        }
        "reverb" => {
            let id = track_arg(parts, "reverb <id> <0..100>")?;
            session.dispatch(Command::SetReverb(id, parse(parts, 2, "reverb <id> <0..100>")?));
        }
        "delay" => {
            let usage = "delay <id> <ms> <feedback> <mix>";
            let id = track_arg(parts, usage)?;
            session.dispatch(Command::SetDelay(
                id,
                parse(parts, 2, usage)?,
                parse(parts, 3, usage)?,
                parse(parts, 4, usage)?,
            ));
        }
        "eq" => {
            let usage = "eq <id> <low> <mid> <high>";
            let id = track_arg(parts, usage)?;
            let eq = EqSettings {
                low: parse(parts, 2, usage)?,
                mid: parse(parts, 3, usage)?,
                high: parse(parts, 4, usage)?,
            };
            session.dispatch(Command::SetEq(id, eq));
        }
        "bypass" => {
            let usage = "bypass <id> reverb|delay|eq";
            let id = track_arg(parts, usage)?;
            let family = match parts.get(2) {
                Some(&"reverb") => EffectFamily::Reverb,
                Some(&"delay") => EffectFamily::Delay,
                Some(&"eq") => EffectFamily::Eq,
                _ => return Err(format!("Usage: {}", usage)),
            };
            session.dispatch(Command::ToggleEffectBypass(id, family));
        }
        "master" => {
            session.dispatch(Command::SetMasterVolume(parse(parts, 1, "master <0..100>")?));
        }
        "limiter" => {
            session.dispatch(Command::ToggleLimiter);
        }
        "reset" => {
            let command = match parts.get(1) {
                Some(id) => Command::ResetTrack(TrackId::from(*id)),
                None => Command::ResetAll,
            };
            session.dispatch(command);
        }
        "undo" => {
            if !session.undo() {
                println!("Nothing to undo");
            }
        }
        "redo" => {
            if !session.redo() {
                println!("Nothing to redo");
            }
        }
        "meter" => {
            let id = track_arg(parts, "meter <id>")?;
            match session.level(&id) {
                Some(level) => println!("{}: {:.1}", id, level),
                None => {
                    session.start_metering(&id);
                    println!("Metering {}", id);
                }
            }
        }
        "tracks" => {
            for track in &session.snapshot().tracks {
                let time = session.current_time(&track.id).unwrap_or(0.0);
                println!(
                    "  {} vol {} pan {} {}{} @ {:.2}s",
                    track.id,
                    track.volume,
                    track.pan,
                    if track.muted { "M" } else { "-" },
                    if track.solo { "S" } else { "-" },
                    time
                );
            }
        }
        "export" => {
            let mix = session
                .export(&mut |stage| println!("Export: {}%", stage.percent()))
                .map_err(|e| e.to_string())?;
            let path = parts.get(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(&mix.filename));
            std::fs::write(&path, &mix.bytes).map_err(|e| e.to_string())?;
            println!("Wrote {}", path.display());
        }
        "h" | "help" => print_help(),
        _ => return Err(format!("Unknown command '{}', type 'help'", name)),
    }
    Ok(())
}

fn print_help() {
    println!("\nTransport Commands:");
    println!("  ENTER               - Toggle play/pause of every track");
    println!("  p, play             - Play");
    println!("  pause               - Pause");
    println!("  toggle <id>         - Play/pause one track");
    println!("  seek <time>         - Seek every track (e.g. 'seek 10.5')");
    println!("  loop <start> <end>  - Enable loop window; 'loop off' disables it");
    println!("\nMix Commands:");
    println!("  tracks              - List tracks");
    println!("  volume <id> <v>     - Set volume 0..100");
    println!("  pan <id> <p>        - Set pan -100..100");
    println!("  mute <id>, solo <id> - Toggle mute/solo");
    println!("  reverb <id> <v>     - Reverb send 0..100");
    println!("  delay <id> <ms> <fb> <mix> - Delay settings");
    println!("  eq <id> <l> <m> <h> - 3-band EQ in dB (e.g. 'eq drums 3 0 -2')");
    println!("  bypass <id> <fx>    - Toggle bypass of reverb, delay or eq");
    println!("  master <v>          - Master volume 0..100");
    println!("  limiter             - Toggle the master limiter");
    println!("  reset [id]          - Reset one track or everything");
    println!("  undo, redo          - Step through history");
    println!("  meter <id>          - Start metering / show level");
    println!("  export [path]       - Bounce the mix to WAV");
    println!("  q, quit             - Quit\n");
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    session: Arc<Mutex<MixSession>>,
) -> Result<cpal::Stream, Box<dyn std::error::Error>>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let err_fn = |err| log::error!("Audio stream error: {}", err);
    let channels = config.channels as usize;

    // Preallocated stereo buffer so the callback does not allocate
    let mut stereo = vec![0.0f32; 16384];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            // Never block the audio thread on the control side
            fill_output(data, &mut stereo, channels, |buffer| match session.try_lock() {
                Some(mut session) => session.render(buffer),
                None => buffer.fill(0.0),
            });
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Render stereo through `render` and spread it over the device channels.
/// Silence goes out when `stereo` is too small for the device buffer.
fn fill_output<T>(data: &mut [T], stereo: &mut [f32], channels: usize, render: impl FnOnce(&mut [f32]))
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    let channels = channels.max(1);
    let frames = data.len() / channels;
    if stereo.len() < frames * 2 {
        log::error!("Audio buffer of {} frames exceeds preallocated buffer", frames);
        data.fill(T::EQUILIBRIUM);
        return;
    }
    let buffer = &mut stereo[..frames * 2];
    render(buffer);

    for (frame, out) in buffer.chunks_exact(2).zip(data.chunks_exact_mut(channels)) {
        if out.len() == 1 {
            out[0] = T::from_sample(0.5 * (frame[0] + frame[1]));
            continue;
        }
        for (ch, sample) in out.iter_mut().enumerate() {
            let value = if ch < 2 { frame[ch] } else { 0.0 };
            *sample = T::from_sample(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_device_buffer_gets_silence() {
        let mut data = vec![0.7f32; 8 * 2];
        let mut stereo = vec![0.0f32; 4];
        fill_output(&mut data, &mut stereo, 2, |buffer| buffer.fill(0.3));
        assert!(data.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn stereo_is_spread_over_device_channels() {
        let mut stereo = vec![0.0f32; 16];
        let mut data = vec![1.0f32; 2 * 4];
        fill_output(&mut data, &mut stereo, 4, |buffer| {
            buffer.copy_from_slice(&[0.25, -0.25, 0.5, -0.5]);
        });
        assert_eq!(data, vec![0.25, -0.25, 0.0, 0.0, 0.5, -0.5, 0.0, 0.0]);

        let mut mono = vec![0.0f32; 2];
        fill_output(&mut mono, &mut stereo, 1, |buffer| {
            buffer.copy_from_slice(&[0.25, 0.75, 1.0, 0.0]);
        });
        assert_eq!(mono, vec![0.5, 0.5]);
    }
}
