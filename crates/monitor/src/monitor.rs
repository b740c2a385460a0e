//! Detection loop
//!
//! One frame is processed fully before the next is fetched. The only
//! blocking call inside an iteration is the alarm's bounded stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use alerting::AlarmController;
use camera_capture::{FrameSource, VideoFrame, FRAME_HEIGHT, FRAME_WIDTH};
use dms::{DmsModule, EarReading, LandmarkDetector};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::overlay::{FrameSink, Overlay};
use crate::MonitorError;

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitReason {
    /// Quit signal from the user
    Quit,
    /// Capture source ran out of frames
    EndOfStream,
    /// Capture source failed to deliver a frame
    CaptureFailed,
}

/// Counters for one run of the loop
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub frames: u64,
    pub frames_with_face: u64,
    pub frames_skipped: u64,
    pub alarms_raised: u64,
    pub exit_reason: ExitReason,
}

/// What happened on one frame
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub sequence: u32,
    pub face_detected: bool,
    pub ear: Option<EarReading>,
    pub eyes_closed_for: Duration,
    pub alarm_active: bool,
}

#[derive(Debug, Default)]
struct Counters {
    frames: u64,
    frames_with_face: u64,
    frames_skipped: u64,
    alarms_raised: u64,
}

/// Drives capture, detection, closure tracking and the alarm
pub struct Monitor<S, D, K> {
    source: S,
    dms: DmsModule<D>,
    alarm: AlarmController,
    sink: K,
    overlay: Overlay,
    quit: Arc<AtomicBool>,
    width: u32,
    height: u32,
    counters: Counters,
}

impl<S, D, K> Monitor<S, D, K>
where
    S: FrameSource,
    D: LandmarkDetector,
    K: FrameSink,
{
    pub fn new(
        source: S,
        dms: DmsModule<D>,
        alarm: AlarmController,
        sink: K,
        quit: Arc<AtomicBool>,
    ) -> Self {
        let overlay = Overlay::new(dms.tracker().threshold());
        Self {
            source,
            dms,
            alarm,
            sink,
            overlay,
            quit,
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            counters: Counters::default(),
        }
    }

    /// Size frames are resized to before detection
    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Run until quit, end of stream or capture failure.
    ///
    /// The alarm is stopped and the source released on every exit path.
    pub fn run(&mut self) -> Result<RunSummary, MonitorError> {
        let outcome = self.run_frames();
        self.shutdown();

        let exit_reason = outcome?;
        let summary = RunSummary {
            frames: self.counters.frames,
            frames_with_face: self.counters.frames_with_face,
            frames_skipped: self.counters.frames_skipped,
            alarms_raised: self.counters.alarms_raised,
            exit_reason,
        };
        info!(
            "Monitor stopped ({:?}): {} frames, {} with a face, {} alarms",
            summary.exit_reason, summary.frames, summary.frames_with_face, summary.alarms_raised
        );
        Ok(summary)
    }

    fn run_frames(&mut self) -> Result<ExitReason, MonitorError> {
        loop {
            if self.quit.load(Ordering::SeqCst) {
                return Ok(ExitReason::Quit);
            }

            match self.source.next_frame() {
                Ok(Some(frame)) => {
                    self.process_frame(frame, Instant::now())?;
                }
                Ok(None) => {
                    info!("End of stream");
                    return Ok(ExitReason::EndOfStream);
                }
                Err(e) => {
                    error!("Failed to capture frame: {}", e);
                    return Ok(ExitReason::CaptureFailed);
                }
            }
        }
    }

    /// Process one captured frame sampled at `now`
    pub fn process_frame(&mut self, frame: VideoFrame, now: Instant) -> Result<FrameReport, MonitorError> {
        let frame = frame.resize(self.width, self.height)?;
        let gray = frame.to_grayscale();
        let analysis = self.dms.analyze(&gray, now)?;

        self.counters.frames += 1;
        if analysis.face_detected() {
            self.counters.frames_with_face += 1;
        }
        if analysis.skipped() {
            self.counters.frames_skipped += 1;
        }

        if analysis.should_alarm() && !self.alarm.alarm_active() {
            match self.alarm.start() {
                Ok(()) => {
                    self.counters.alarms_raised += 1;
                    warn!(
                        "Eyes closed for {:.1}s, wake up alert",
                        self.dms.tracker().closed_for(now).as_secs_f64()
                    );
                }
                Err(e) => warn!("Could not start alarm: {}", e),
            }
        } else if analysis.eyes_open() && self.alarm.alarm_active() {
            self.alarm.stop();
            info!("Eyes open again");
        }

        let report = FrameReport {
            sequence: frame.sequence,
            face_detected: analysis.face_detected(),
            ear: analysis.ear,
            eyes_closed_for: self.dms.tracker().closed_for(now),
            alarm_active: self.alarm.alarm_active(),
        };
        if let Some(ear) = &report.ear {
            debug!(
                "Frame {}: EAR {:.2}, closed {:.1}s",
                report.sequence,
                ear.average,
                report.eyes_closed_for.as_secs_f64()
            );
        }

        if self.sink.wants_frames() {
            let image = self.overlay.render(&frame, &analysis, report.alarm_active);
            if let Err(e) = self.sink.present(&image, frame.sequence) {
                warn!("Dropping annotated frame: {}", e);
            }
        }

        Ok(report)
    }

    pub fn alarm(&self) -> &AlarmController {
        &self.alarm
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn shutdown(&mut self) {
        self.alarm.stop();
        self.source.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::NullSink;
    use alerting::{CancelToken, SoundPlayer, SoundSource, Tone};
    use camera_capture::ScriptedSource;
    use dms::{DmsConfig, FaceBbox, FaceLandmarks, Point, ScriptedDetector, LEFT_EYE, NUM_LANDMARKS, RIGHT_EYE};
    use std::path::Path;

    struct SilentPlayer;

    impl SoundPlayer for SilentPlayer {
        fn play_file(&self, _path: &Path, token: &CancelToken) -> Result<(), alerting::AlarmError> {
            token.sleep(Duration::from_millis(50));
            Ok(())
        }

        fn beep(&self, _hz: u32, duration: Duration, token: &CancelToken) -> Result<(), alerting::AlarmError> {
            token.sleep(duration);
            Ok(())
        }
    }

    fn silent_alarm() -> AlarmController {
        AlarmController::new(
            SoundSource::ToneFallback(Tone::default()),
            Arc::new(SilentPlayer),
            Duration::from_secs(1),
        )
    }

    /// Face whose eyes both measure `ear`
    fn face_with_ear(ear: f64) -> FaceLandmarks {
        let mut points = vec![Point::new(320.0, 300.0); NUM_LANDMARKS];
        for (range, x0) in [(LEFT_EYE, 250.0), (RIGHT_EYE, 350.0)] {
            let half_gap = 20.0 * ear;
            let eye = [
                Point::new(x0, 200.0),
                Point::new(x0 + 10.0, 200.0 - half_gap),
                Point::new(x0 + 30.0, 200.0 - half_gap),
                Point::new(x0 + 40.0, 200.0),
                Point::new(x0 + 30.0, 200.0 + half_gap),
                Point::new(x0 + 10.0, 200.0 + half_gap),
            ];
            points[range].copy_from_slice(&eye);
        }
        FaceLandmarks::new(FaceBbox::default(), points).unwrap()
    }

    fn frame(sequence: u32) -> VideoFrame {
        VideoFrame::filled(FRAME_WIDTH, FRAME_HEIGHT, [40, 40, 40], sequence)
    }

    fn monitor(
        source: ScriptedSource,
        detector: ScriptedDetector,
        config: &DmsConfig,
    ) -> Monitor<ScriptedSource, ScriptedDetector, NullSink> {
        Monitor::new(
            source,
            DmsModule::new(config, detector),
            silent_alarm(),
            NullSink,
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[test]
    fn test_alarm_follows_ear_sequence() {
        let ears = [0.3, 0.2, 0.2, 0.2, 0.3];
        let mut detector = ScriptedDetector::new();
        for ear in ears {
            detector.push(vec![face_with_ear(ear)]);
        }
        let mut monitor = monitor(ScriptedSource::new(), detector, &DmsConfig::default());

        let base = Instant::now();
        let active: Vec<bool> = (0..ears.len())
            .map(|i| {
                let now = base + Duration::from_secs(i as u64);
                monitor.process_frame(frame(i as u32), now).unwrap().alarm_active
            })
            .collect();

        assert_eq!(active, vec![false, false, false, true, false]);
        assert_eq!(monitor.alarm().tasks_spawned(), 1);
    }

    #[test]
    fn test_missing_face_keeps_alarm_on() {
        let mut detector = ScriptedDetector::new();
        detector
            .push(vec![face_with_ear(0.1)])
            .push(vec![face_with_ear(0.1)])
            .push(Vec::new())
            .push(vec![face_with_ear(0.35)]);
        let mut monitor = monitor(ScriptedSource::new(), detector, &DmsConfig::default());

        let base = Instant::now();
        monitor.process_frame(frame(0), base).unwrap();
        let alarmed = monitor.process_frame(frame(1), base + Duration::from_secs(2)).unwrap();
        assert!(alarmed.alarm_active);

        let no_face = monitor.process_frame(frame(2), base + Duration::from_secs(3)).unwrap();
        assert!(!no_face.face_detected);
        assert!(no_face.alarm_active);
        assert_eq!(no_face.eyes_closed_for, Duration::from_secs(3));

        let open = monitor.process_frame(frame(3), base + Duration::from_secs(4)).unwrap();
        assert!(!open.alarm_active);
        assert_eq!(open.eyes_closed_for, Duration::ZERO);
    }

    #[test]
    fn test_run_stops_alarm_on_capture_failure() {
        let mut source = ScriptedSource::new();
        source.push_frame(frame(0)).push_frame(frame(1)).push_failure("device unplugged");
        let mut detector = ScriptedDetector::new();
        detector.push(vec![face_with_ear(0.1)]).push(vec![face_with_ear(0.1)]);
        let config = DmsConfig {
            hold_duration_secs: 0.0,
            ..Default::default()
        };
        let mut monitor = monitor(source, detector, &config);

        let summary = monitor.run().unwrap();
        assert_eq!(summary.exit_reason, ExitReason::CaptureFailed);
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.alarms_raised, 1);
        assert!(!monitor.alarm().alarm_active());
        assert!(monitor.source().is_released());
    }

    #[test]
    fn test_run_until_end_of_stream() {
        let mut source = ScriptedSource::new();
        source.push_frame(frame(0)).push_frame(frame(1)).push_frame(frame(2));
        let mut detector = ScriptedDetector::new();
        detector
            .push(vec![face_with_ear(0.3)])
            .push(Vec::new())
            .push(vec![face_with_ear(0.3), face_with_ear(0.1)]);
        let mut monitor = monitor(source, detector, &DmsConfig::default());

        let summary = monitor.run().unwrap();
        assert_eq!(summary.exit_reason, ExitReason::EndOfStream);
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.frames_with_face, 2);
        assert_eq!(summary.alarms_raised, 0);
    }

    #[test]
    fn test_quit_signal_ends_loop() {
        let mut source = ScriptedSource::new();
        source.push_frame(frame(0));
        let mut monitor = monitor(source, ScriptedDetector::new(), &DmsConfig::default());
        monitor.quit.store(true, Ordering::SeqCst);

        let summary = monitor.run().unwrap();
        assert_eq!(summary.exit_reason, ExitReason::Quit);
        assert_eq!(summary.frames, 0);
        assert!(monitor.source().is_released());
    }

    /// Raises the quit flag once `after` frames have been shown, like a window key press
    struct QuitAfter {
        after: u32,
        shown: u32,
        quit: Arc<AtomicBool>,
    }

    impl FrameSink for QuitAfter {
        fn present(&mut self, _image: &image::RgbImage, _sequence: u32) -> Result<(), MonitorError> {
            self.shown += 1;
            if self.shown >= self.after {
                self.quit.store(true, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    fn closed_eyes(frames: u32) -> (ScriptedSource, ScriptedDetector) {
        let mut source = ScriptedSource::new();
        let mut detector = ScriptedDetector::new();
        for i in 0..frames {
            source.push_frame(frame(i));
            detector.push(vec![face_with_ear(0.1)]);
        }
        (source, detector)
    }

    fn no_hold() -> DmsConfig {
        DmsConfig {
            hold_duration_secs: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_end_of_stream_stops_sounding_alarm() {
        let (source, detector) = closed_eyes(2);
        let mut monitor = monitor(source, detector, &no_hold());

        let summary = monitor.run().unwrap();
        assert_eq!(summary.exit_reason, ExitReason::EndOfStream);
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.alarms_raised, 1);
        assert_eq!(monitor.alarm().tasks_spawned(), 1);
        assert!(!monitor.alarm().alarm_active());
        assert!(monitor.source().is_released());
    }

    #[test]
    fn test_quit_mid_run_stops_sounding_alarm() {
        let (source, detector) = closed_eyes(5);
        let quit = Arc::new(AtomicBool::new(false));
        let sink = QuitAfter {
            after: 2,
            shown: 0,
            quit: Arc::clone(&quit),
        };
        let mut monitor = Monitor::new(source, DmsModule::new(&no_hold(), detector), silent_alarm(), sink, quit);

        let summary = monitor.run().unwrap();
        assert_eq!(summary.exit_reason, ExitReason::Quit);
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.alarms_raised, 1);
        assert!(!monitor.alarm().alarm_active());
        assert!(monitor.source().is_released());
    }

    #[test]
    fn test_degenerate_face_is_skipped() {
        let mut points = face_with_ear(0.3).points().to_vec();
        points[RIGHT_EYE.start + 3] = points[RIGHT_EYE.start];
        let flat = FaceLandmarks::new(FaceBbox::default(), points).unwrap();

        let mut detector = ScriptedDetector::new();
        detector.push(vec![flat]);
        let mut monitor = monitor(ScriptedSource::new(), detector, &DmsConfig::default());

        let report = monitor.process_frame(frame(0), Instant::now()).unwrap();
        assert!(report.face_detected);
        assert!(report.ear.is_none());
        assert_eq!(monitor.counters.frames_skipped, 1);
    }

    #[test]
    fn test_frames_are_resized() {
        let mut monitor = monitor(ScriptedSource::new(), ScriptedDetector::new(), &DmsConfig::default())
            .with_frame_size(320, 240);
        let big = VideoFrame::filled(1280, 720, [0, 0, 0], 9);
        let report = monitor.process_frame(big, Instant::now()).unwrap();
        assert_eq!(report.sequence, 9);
    }
}
