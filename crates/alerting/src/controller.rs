//! Alarm lifecycle controller
//!
//! Two states: `Idle` (no sound task) and `Sounding` (exactly one task). The
//! controller is the only writer of the task's stop signal, so at most one
//! sound loop is ever alive.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::AlarmConfig;
use crate::sound::{CancelToken, SoundPlayer, SoundSource, SystemPlayer};
use crate::AlarmError;

/// Alarm controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    Idle,
    Sounding,
}

struct AlarmTask {
    token: CancelToken,
    handle: JoinHandle<()>,
}

/// Owns the alarm's running state and its background sound loop
pub struct AlarmController {
    source: Arc<SoundSource>,
    player: Arc<dyn SoundPlayer>,
    stop_timeout: Duration,
    retry_pause: Duration,
    task: Option<AlarmTask>,
    /// Task that outlived its stop timeout
    lingering: Option<JoinHandle<()>>,
    tasks_spawned: u64,
}

impl AlarmController {
    /// Create a controller; the sound source is fixed for its lifetime
    pub fn new(source: SoundSource, player: Arc<dyn SoundPlayer>, stop_timeout: Duration) -> Self {
        Self {
            source: Arc::new(source),
            player,
            stop_timeout,
            retry_pause: Duration::from_millis(250),
            task: None,
            lingering: None,
            tasks_spawned: 0,
        }
    }

    /// Build from configuration, resolving the sound asset once
    pub fn from_config(config: &AlarmConfig) -> Self {
        let source = SoundSource::resolve(config.sound_path.as_deref(), config.tone());
        match &source {
            SoundSource::File(path) => info!("Alarm sound: {}", path.display()),
            SoundSource::ToneFallback(tone) => info!("Alarm sound: {} Hz beep", tone.frequency_hz),
        }

        let player = SystemPlayer::new(config.player_command.clone(), config.player_args.clone());
        Self::new(source, Arc::new(player), config.stop_timeout()).with_retry_pause(config.retry_pause())
    }

    /// Delay before retrying a failed playback
    pub fn with_retry_pause(mut self, retry_pause: Duration) -> Self {
        self.retry_pause = retry_pause;
        self
    }

    /// Start the sound loop; no-op when already sounding
    pub fn start(&mut self) -> Result<(), AlarmError> {
        if self.task.is_some() {
            return Ok(());
        }

        if let Some(handle) = self.lingering.take() {
            if !handle.is_finished() {
                self.lingering = Some(handle);
                return Err(AlarmError::TaskStillRunning);
            }
            reap(handle);
        }

        let token = CancelToken::new();
        let source = Arc::clone(&self.source);
        let player = Arc::clone(&self.player);
        let task_token = token.clone();
        let retry_pause = self.retry_pause;

        let handle = thread::Builder::new()
            .name("alarm".to_string())
            .spawn(move || run_sound_loop(&source, player.as_ref(), &task_token, retry_pause))
            .map_err(|e| AlarmError::Spawn(format!("alarm thread: {}", e)))?;

        self.task = Some(AlarmTask { token, handle });
        self.tasks_spawned += 1;
        info!("Alarm started");
        Ok(())
    }

    /// Stop the sound loop, waiting up to the stop timeout for it to exit.
    /// No-op when idle.
    pub fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        task.token.cancel();
        let deadline = Instant::now() + self.stop_timeout;
        while !task.handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(
                    "Alarm task did not exit within {:?}; it will be reaped later",
                    self.stop_timeout
                );
                self.lingering = Some(task.handle);
                info!("Alarm stopped");
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }

        reap(task.handle);
        info!("Alarm stopped");
    }

    pub fn state(&self) -> AlarmState {
        if self.task.is_some() {
            AlarmState::Sounding
        } else {
            AlarmState::Idle
        }
    }

    /// True from `start()` until the matching `stop()` completes
    pub fn alarm_active(&self) -> bool {
        self.state() == AlarmState::Sounding
    }

    pub fn source(&self) -> &SoundSource {
        &self.source
    }

    /// Sound loops spawned over the controller's lifetime
    pub fn tasks_spawned(&self) -> u64 {
        self.tasks_spawned
    }
}

impl Drop for AlarmController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn reap(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        warn!("Alarm task panicked");
    }
}

fn run_sound_loop(
    source: &SoundSource,
    player: &dyn SoundPlayer,
    token: &CancelToken,
    retry_pause: Duration,
) {
    debug!("Alarm sound loop running");
    while !token.is_cancelled() {
        if let Err(e) = source.play_once(player, token) {
            warn!("Alarm playback failed: {}", e);
            token.sleep(retry_pause);
        }
    }
    debug!("Alarm sound loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::Tone;
    use proptest::prelude::*;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Records concurrency and call counts; each play lasts `clip`
    #[derive(Default)]
    struct RecordingPlayer {
        live: AtomicUsize,
        max_live: AtomicUsize,
        files: AtomicUsize,
        beeps: AtomicUsize,
        fail: AtomicBool,
        ignore_cancel: AtomicBool,
        clip: Duration,
    }

    impl RecordingPlayer {
        fn new(clip: Duration) -> Arc<Self> {
            Arc::new(Self {
                clip,
                ..Default::default()
            })
        }

        fn play(&self, token: &CancelToken) -> Result<(), AlarmError> {
            let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_live.fetch_max(live, Ordering::SeqCst);
            if self.ignore_cancel.load(Ordering::SeqCst) {
                thread::sleep(self.clip);
            } else {
                token.sleep(self.clip);
            }
            self.live.fetch_sub(1, Ordering::SeqCst);

            if self.fail.load(Ordering::SeqCst) {
                Err(AlarmError::Playback("device busy".into()))
            } else {
                Ok(())
            }
        }
    }

    impl SoundPlayer for RecordingPlayer {
        fn play_file(&self, _path: &Path, token: &CancelToken) -> Result<(), AlarmError> {
            self.files.fetch_add(1, Ordering::SeqCst);
            self.play(token)
        }

        fn beep(&self, _hz: u32, _duration: Duration, token: &CancelToken) -> Result<(), AlarmError> {
            self.beeps.fetch_add(1, Ordering::SeqCst);
            self.play(token)
        }
    }

    fn file_controller(player: &Arc<RecordingPlayer>) -> AlarmController {
        AlarmController::new(
            SoundSource::File(PathBuf::from("alarm.wav")),
            player.clone(),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_start_is_idempotent() {
        let player = RecordingPlayer::new(Duration::from_millis(10));
        let mut alarm = file_controller(&player);

        alarm.start().unwrap();
        alarm.start().unwrap();
        thread::sleep(Duration::from_millis(50));

        assert_eq!(alarm.tasks_spawned(), 1);
        assert_eq!(player.max_live.load(Ordering::SeqCst), 1);
        alarm.stop();
    }

    #[test]
    fn test_stop_on_idle_returns_immediately() {
        let player = RecordingPlayer::new(Duration::from_millis(10));
        let mut alarm = file_controller(&player);

        let started = Instant::now();
        alarm.stop();
        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(alarm.state(), AlarmState::Idle);
        assert_eq!(player.files.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_active_until_stop_completes() {
        let player = RecordingPlayer::new(Duration::from_secs(10));
        let mut alarm = file_controller(&player);
        assert!(!alarm.alarm_active());

        alarm.start().unwrap();
        assert!(alarm.alarm_active());
        thread::sleep(Duration::from_millis(30));
        assert_eq!(player.live.load(Ordering::SeqCst), 1);

        // Long clip is cut short by the cancel token
        let started = Instant::now();
        alarm.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!alarm.alarm_active());
        assert_eq!(player.live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_sound_loop_repeats() {
        let player = RecordingPlayer::new(Duration::from_millis(5));
        let mut alarm = file_controller(&player);

        alarm.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        alarm.stop();

        assert!(player.files.load(Ordering::SeqCst) > 1);
    }

    #[test]
    fn test_restart_after_stop_spawns_new_task() {
        let player = RecordingPlayer::new(Duration::from_millis(5));
        let mut alarm = file_controller(&player);

        alarm.start().unwrap();
        alarm.stop();
        alarm.start().unwrap();
        assert_eq!(alarm.tasks_spawned(), 2);
        alarm.stop();
        assert_eq!(player.max_live.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_playback_failure_is_retried() {
        let player = RecordingPlayer::new(Duration::from_millis(1));
        player.fail.store(true, Ordering::SeqCst);
        let mut alarm = file_controller(&player).with_retry_pause(Duration::from_millis(5));

        alarm.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        assert!(alarm.alarm_active());
        alarm.stop();

        assert!(player.files.load(Ordering::SeqCst) > 1);
        assert!(!alarm.alarm_active());
    }

    #[test]
    fn test_tone_fallback_beeps() {
        let player = RecordingPlayer::new(Duration::from_millis(5));
        let tone = Tone {
            frequency_hz: 2500,
            duration: Duration::from_millis(5),
            pause: Duration::from_millis(5),
        };
        let mut alarm = AlarmController::new(
            SoundSource::ToneFallback(tone),
            player.clone(),
            Duration::from_secs(1),
        );

        alarm.start().unwrap();
        thread::sleep(Duration::from_millis(60));
        alarm.stop();

        assert!(player.beeps.load(Ordering::SeqCst) >= 1);
        assert_eq!(player.files.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_stops_alarm() {
        let player = RecordingPlayer::new(Duration::from_secs(10));
        {
            let mut alarm = file_controller(&player);
            alarm.start().unwrap();
            thread::sleep(Duration::from_millis(30));
        }
        assert_eq!(player.live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stuck_task_blocks_restart_until_it_exits() {
        let player = RecordingPlayer::new(Duration::from_millis(300));
        player.ignore_cancel.store(true, Ordering::SeqCst);
        let mut alarm = AlarmController::new(
            SoundSource::File(PathBuf::from("alarm.wav")),
            player.clone(),
            Duration::from_millis(20),
        );

        alarm.start().unwrap();
        thread::sleep(Duration::from_millis(30));

        let started = Instant::now();
        alarm.stop();
        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(!alarm.alarm_active());

        // The old task is still mid-clip
        assert!(matches!(alarm.start(), Err(AlarmError::TaskStillRunning)));
        assert!(!alarm.alarm_active());

        thread::sleep(Duration::from_millis(400));
        player.ignore_cancel.store(false, Ordering::SeqCst);
        alarm.start().unwrap();
        assert_eq!(alarm.tasks_spawned(), 2);
        alarm.stop();
        assert_eq!(player.max_live.load(Ordering::SeqCst), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn any_start_stop_sequence_keeps_one_task(ops in proptest::collection::vec(any::<bool>(), 1..12)) {
            let player = RecordingPlayer::new(Duration::from_millis(1));
            let mut alarm = file_controller(&player);
            let mut expected_spawns = 0;
            let mut sounding = false;

            for start in ops {
                if start {
                    alarm.start().unwrap();
                    if !sounding {
                        expected_spawns += 1;
                    }
                    sounding = true;
                } else {
                    alarm.stop();
                    sounding = false;
                }
                prop_assert_eq!(alarm.alarm_active(), sounding);
            }

            alarm.stop();
            prop_assert_eq!(alarm.tasks_spawned(), expected_spawns);
            prop_assert!(player.max_live.load(Ordering::SeqCst) <= 1);
            prop_assert_eq!(player.live.load(Ordering::SeqCst), 0);
        }
    }
}
