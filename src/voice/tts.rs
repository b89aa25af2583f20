//! Text-to-speech (TTS) through the local voice synthesizer

use std::path::PathBuf;
use std::process::Command;

use crate::config::TtsConfig;
use crate::{Error, Result};

/// Speaks text to the user
///
/// Calls block until the utterance finishes, so speech never overlaps.
pub trait Speaker {
    /// Speak `text` to completion
    ///
    /// # Errors
    ///
    /// Returns error if the synthesizer fails
    fn speak(&mut self, text: &str) -> Result<()>;
}

/// Synthesizer flavours with different argument conventions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Engine {
    /// macOS `say`
    Say,
    /// `espeak-ng` / `espeak`
    Espeak,
    /// Windows PowerShell with `System.Speech`
    PowerShell,
    /// User-supplied command, text appended as the last argument
    Custom,
}

/// Speaks through a locally installed synthesizer process
///
/// Every line is echoed to the console first. If the synthesizer fails for
/// one utterance the failure is logged and the echo stands in for speech.
pub struct SystemVoice {
    name: String,
    program: PathBuf,
    base_args: Vec<String>,
    engine: Engine,
    voice: Option<String>,
    rate: Option<u32>,
}

impl SystemVoice {
    /// Detect a synthesizer on this machine
    ///
    /// # Arguments
    ///
    /// * `name` - Assistant name used when echoing speech
    /// * `config` - Voice, rate, and optional explicit command
    ///
    /// # Errors
    ///
    /// Returns error if no synthesizer can be found
    pub fn detect(name: &str, config: &TtsConfig) -> Result<Self> {
        let (program, base_args, engine) = if let Some(command) = &config.command {
            let (program, args) = command
                .split_first()
                .ok_or_else(|| Error::Config("tts.command is empty".to_string()))?;
            let program = which::which(program)
                .map_err(|e| Error::Tts(format!("synthesizer {program} not found: {e}")))?;
            (program, args.to_vec(), Engine::Custom)
        } else {
            detect_engine()?
        };

        tracing::debug!(program = %program.display(), ?engine, "speech synthesizer selected");

        Ok(Self {
            name: name.to_string(),
            program,
            base_args,
            engine,
            voice: config.voice.clone(),
            rate: config.rate,
        })
    }

    fn command_for(&self, text: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args);

        match self.engine {
            Engine::Say => {
                if let Some(voice) = &self.voice {
                    cmd.args(["-v", voice.as_str()]);
                }
                if let Some(rate) = self.rate {
                    cmd.arg("-r").arg(rate.to_string());
                }
                cmd.arg(text);
            }
            Engine::Espeak => {
                if let Some(voice) = &self.voice {
                    cmd.args(["-v", voice.as_str()]);
                }
                if let Some(rate) = self.rate {
                    cmd.arg("-s").arg(rate.to_string());
                }
                cmd.arg(text);
            }
            Engine::PowerShell => {
                cmd.args(["-NoProfile", "-NonInteractive", "-Command"])
                    .arg(powershell_script(text, self.voice.as_deref()));
            }
            Engine::Custom => {
                cmd.arg(text);
            }
        }

        cmd
    }
}

impl Speaker for SystemVoice {
    fn speak(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        println!("{}: {text}", self.name);
        tracing::info!(text, "speaking");

        // Already echoed; a failed synthesizer leaves this line text-only
        match self.command_for(text).status() {
            Ok(status) if status.success() => {}
            Ok(status) => {
                tracing::warn!(%status, program = %self.program.display(), "synthesizer failed");
            }
            Err(e) => {
                tracing::warn!(error = %e, program = %self.program.display(), "failed to run synthesizer");
            }
        }
        Ok(())
    }
}

/// Prints speech to the console when no synthesizer is available
pub struct ConsoleSpeaker {
    name: String,
}

impl ConsoleSpeaker {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Speaker for ConsoleSpeaker {
    fn speak(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if !text.is_empty() {
            println!("{}: {text}", self.name);
            tracing::info!(text, "speaking (console only)");
        }
        Ok(())
    }
}

/// Build the best available speaker, falling back to console output
#[must_use]
pub fn system_speaker(name: &str, config: &TtsConfig) -> Box<dyn Speaker> {
    match SystemVoice::detect(name, config) {
        Ok(voice) => Box::new(voice),
        Err(e) => {
            tracing::warn!(error = %e, "no speech synthesizer, speaking to console only");
            Box::new(ConsoleSpeaker::new(name))
        }
    }
}

fn detect_engine() -> Result<(PathBuf, Vec<String>, Engine)> {
    if cfg!(target_os = "macos") {
        if let Ok(path) = which::which("say") {
            return Ok((path, Vec::new(), Engine::Say));
        }
    }

    if cfg!(target_os = "windows") {
        if let Ok(path) = which::which("powershell") {
            return Ok((path, Vec::new(), Engine::PowerShell));
        }
    }

    for bin in ["espeak-ng", "espeak"] {
        if let Ok(path) = which::which(bin) {
            return Ok((path, Vec::new(), Engine::Espeak));
        }
    }

    Err(Error::Tts("no speech synthesizer found".to_string()))
}

/// PowerShell snippet speaking `text` with `System.Speech`
fn powershell_script(text: &str, voice: Option<&str>) -> String {
    let quote = |s: &str| format!("'{}'", s.replace('\'', "''"));
    let select = voice
        .map(|v| format!("$s.SelectVoice({});", quote(v)))
        .unwrap_or_default();
    format!(
        "Add-Type -AssemblyName System.Speech; \
         $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; {select}$s.Speak({})",
        quote(text)
    )
}
