use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kiwi_voice::voice::{AudioOutput, AudioPlayback, DecodedAudio, TextToSpeech, decode_audio};
use kiwi_voice::{Config, Daemon};

/// Kiwi - wake word driven voice sessions
#[derive(Parser)]
#[command(name = "kiwi", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "KIWI_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable voice features (for headless servers without audio hardware)
    #[arg(long, env = "KIWI_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hallo! Das ist ein Test der Sprachausgabe.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,kiwi_voice=info",
        1 => "info,kiwi_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&text).await,
        };
    }

    tracing::info!(
        port = ?cli.port,
        disable_voice = cli.disable_voice,
        "starting kiwi"
    );

    let mut config = Config::load_with_options(cli.disable_voice)?;
    if let Some(port) = cli.port {
        // Keep a defaulted TTS URL pointing at our own listener
        let own_url = format!("http://127.0.0.1:{}", config.api_server.port);
        if config.voice.tts_url == own_url {
            config.voice.tts_url = format!("http://127.0.0.1:{port}");
        }
        config.api_server.port = port;
    }
    tracing::debug!(?config, "loaded configuration");

    Daemon::new(config).run().await?;

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::open()?;

    // 2 seconds of 440Hz at 24kHz
    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;
    let num_samples = sample_rate as usize * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    playback
        .play(DecodedAudio {
            samples,
            sample_rate,
        })
        .await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");
    println!("  3. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Synthesize text once through the configured `/api/tts` service and play it
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let tts = TextToSpeech::new_gateway(
        &config.voice.tts_url,
        config.voice.tts_voice.clone(),
        config.voice.tts_model.clone(),
        config.voice.tts_timeout,
    )?;

    println!("Synthesizing speech via {}...", config.voice.tts_url);
    let mp3_data = tts
        .synthesize(text)
        .await
        .map_err(|e| anyhow::anyhow!("TTS synthesis failed: {e}"))?;
    println!("Got {} bytes of audio data", mp3_data.len());

    let audio = decode_audio(&mp3_data)?;
    println!(
        "Decoded {} ms at {} Hz",
        audio.duration_ms(),
        audio.sample_rate
    );

    println!("Playing audio...");
    AudioPlayback::open()?.play(audio).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
