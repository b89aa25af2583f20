use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use travis_voice::completion::CompletionClient;
use travis_voice::desktop::SystemDesktop;
use travis_voice::vision::{self, ViewerMode};
use travis_voice::voice::{
    CloudRecognizer, Microphone, SpeechRecognizer, SpeechToText, calculate_energy,
    system_speaker,
};
use travis_voice::{Assistant, Components, Config, Dispatcher};

/// Travis - Voice-activated desktop assistant
#[derive(Parser)]
#[command(name = "travis", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (defaults to the per-user config directory)
    #[arg(short, long, env = "TRAVIS_CONFIG")]
    config: Option<PathBuf>,

    /// Wake word to listen for
    #[arg(long)]
    wake_word: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Ask the AI brain a question
    Ask {
        /// Question text
        question: String,
    },
    /// Show which command a transcript selects, without running it
    Dispatch {
        /// Transcript to match
        transcript: String,
    },
    /// Open the camera viewer
    Camera {
        /// Overlay detected faces
        #[arg(long)]
        detect: bool,
    },
    /// Listen for one command and print the transcript
    Listen,
}

fn main() -> ExitCode {
    // Before parsing, so clap sees TRAVIS_CONFIG from .env too
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,travis_voice=info",
        1 => "info,travis_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match &dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) => {
            if let Some(problem) = dotenv_problem(e) {
                tracing::warn!(error = %problem, ".env not loaded, using process environment");
            }
        }
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(wake_word) = cli.wake_word.as_deref() {
        config.override_wake_word(wake_word);
    }
    tracing::debug!(?config, "loaded configuration");

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration),
            Command::TestTts { text } => test_tts(&config, &text),
            Command::Ask { question } => ask(config, &question),
            Command::Dispatch { transcript } => {
                println!("{}", Dispatcher::new().select(&transcript));
                Ok(())
            }
            Command::Camera { detect } => camera(&config, detect),
            Command::Listen => listen(config),
        };
    }

    tracing::info!(wake_word = %config.assistant.wake_word, "starting travis");

    let mut assistant = build_assistant(config)?;
    assistant.run(None)?;

    Ok(())
}

/// A missing `.env` is normal; anything else is worth reporting
fn dotenv_problem(error: &dotenvy::Error) -> Option<&dotenvy::Error> {
    (!error.not_found()).then_some(error)
}

fn build_assistant(config: Config) -> anyhow::Result<Assistant> {
    let speaker = system_speaker(&config.assistant.name, &config.tts);
    let recognizer = CloudRecognizer::new(SpeechToText::new(config.stt)?, config.listen.detector);
    let completion = CompletionClient::new(config.completion)?;
    let camera = vision::system_camera(&config.camera);

    let components = Components {
        recognizer: Box::new(recognizer),
        speaker,
        desktop: Box::new(SystemDesktop::new(config.apps)),
        camera,
        completion,
    };

    Ok(Assistant::new(components, &config.assistant, config.listen))
}

/// Test microphone input
fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let microphone = Microphone::open()?;

    let sample_rate = microphone.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        std::thread::sleep(Duration::from_secs(1));

        let samples = microphone.take_buffer();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    drop(microphone);

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in and selected as the default input?");
    println!("  2. Run: arecord -l (to list devices)");
    println!("  3. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Test TTS output
fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    let mut speaker = system_speaker(&config.assistant.name, &config.tts);
    speaker.speak(text)?;
    Ok(())
}

/// Ask one question and print the answer
fn ask(config: Config, question: &str) -> anyhow::Result<()> {
    let client = CompletionClient::new(config.completion)?;
    match client.ask(question) {
        Ok(answer) => {
            println!("{answer}");
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            Err(e.into())
        }
    }
}

/// Run one camera session
fn camera(config: &Config, detect: bool) -> anyhow::Result<()> {
    let mut speaker = system_speaker(&config.assistant.name, &config.tts);
    let mut backend = vision::system_camera(&config.camera);
    let mode = if detect {
        ViewerMode::Detection
    } else {
        ViewerMode::Plain
    };

    vision::run_viewer(backend.as_mut(), mode, speaker.as_mut())?;
    Ok(())
}

/// Listen for one command and print it
fn listen(config: Config) -> anyhow::Result<()> {
    let params = config.listen.command;
    let mut recognizer =
        CloudRecognizer::new(SpeechToText::new(config.stt)?, config.listen.detector);

    println!("Listening...");
    let transcript = recognizer.listen(params)?;
    println!("You said: {transcript}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dotenv_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let err = dotenvy::from_path(dir.path().join(".env")).unwrap_err();
        assert!(dotenv_problem(&err).is_none());
    }

    #[test]
    fn test_malformed_dotenv_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "TRAVIS_DOTENV_TEST_KEY 'unterminated\n").unwrap();

        let err = dotenvy::from_path(&path).unwrap_err();
        assert!(dotenv_problem(&err).is_some());
    }

    #[test]
    fn test_blank_wake_word_flag_keeps_default() {
        let cli = Cli::try_parse_from(["travis", "--wake-word", "", "dispatch", "open camera"])
            .unwrap();
        let mut config = Config::from_sources(
            travis_voice::config::file::TravisConfigFile::default(),
            |_| None,
        );
        config.override_wake_word(cli.wake_word.as_deref().unwrap());
        assert_eq!(config.assistant.wake_word, "travis");
    }
}
