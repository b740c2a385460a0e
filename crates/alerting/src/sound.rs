//! Sound sources and playback backends

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::tone;
use crate::AlarmError;

/// Granularity of cancellable waits
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// One-shot stop signal shared between the controller and its sound loop
#[derive(Debug, Clone)]
pub struct CancelToken {
    keep_running: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            keep_running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn cancel(&self) {
        self.keep_running.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        !self.keep_running.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `false` if the wait was cut short.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Fallback tone: repeated beep followed by a pause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tone {
    pub frequency_hz: u32,
    pub duration: Duration,
    pub pause: Duration,
}

impl Default for Tone {
    fn default() -> Self {
        Self {
            frequency_hz: 2500,
            duration: Duration::from_millis(1000),
            pause: Duration::from_millis(500),
        }
    }
}

/// What the alarm plays, decided once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundSource {
    File(PathBuf),
    ToneFallback(Tone),
}

impl SoundSource {
    /// Use the asset if it exists, the tone otherwise
    pub fn resolve(path: Option<&Path>, tone: Tone) -> Self {
        match path {
            Some(path) if path.is_file() => SoundSource::File(path.to_path_buf()),
            Some(path) => {
                warn!(
                    "{} not found. Will use beep sound instead.",
                    path.display()
                );
                SoundSource::ToneFallback(tone)
            }
            None => SoundSource::ToneFallback(tone),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SoundSource::ToneFallback(_))
    }

    /// One pass of the sound loop
    pub(crate) fn play_once(
        &self,
        player: &dyn SoundPlayer,
        token: &CancelToken,
    ) -> Result<(), AlarmError> {
        match self {
            SoundSource::File(path) => player.play_file(path, token),
            SoundSource::ToneFallback(tone) => {
                player.beep(tone.frequency_hz, tone.duration, token)?;
                token.sleep(tone.pause);
                Ok(())
            }
        }
    }
}

/// OS-level sound playback.
///
/// Both calls block until playback finishes, and return early once `token`
/// is cancelled.
pub trait SoundPlayer: Send + Sync {
    /// Play a sound file to completion
    fn play_file(&self, path: &Path, token: &CancelToken) -> Result<(), AlarmError>;

    /// Emit a beep of the given pitch and length
    fn beep(&self, frequency_hz: u32, duration: Duration, token: &CancelToken) -> Result<(), AlarmError>;
}

/// Plays files through an external command line player and tones through
/// the default audio output
#[derive(Debug, Clone)]
pub struct SystemPlayer {
    command: String,
    args: Vec<String>,
}

impl SystemPlayer {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

impl SoundPlayer for SystemPlayer {
    fn play_file(&self, path: &Path, token: &CancelToken) -> Result<(), AlarmError> {
        if !path.is_file() {
            return Err(AlarmError::AssetNotFound(path.to_path_buf()));
        }

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AlarmError::Spawn(format!("{}: {}", self.command, e)))?;

        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => return Ok(()),
                Ok(Some(status)) => {
                    return Err(AlarmError::Playback(format!("{} exited with {}", self.command, status)))
                }
                Ok(None) if token.is_cancelled() => {
                    debug!("Cutting playback short");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok(());
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(AlarmError::Playback(e.to_string())),
            }
        }
    }

    fn beep(&self, frequency_hz: u32, duration: Duration, token: &CancelToken) -> Result<(), AlarmError> {
        tone::play_tone(frequency_hz, duration, token)
    }
}
