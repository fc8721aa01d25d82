//! Screen-sampling probe.
//!
//! Every few seconds the primary display is captured, reduced to a 32x32
//! grayscale thumbnail and compared with the thumbnail from the previous
//! check. Only gross changes register (a window switch, video playing);
//! the threshold is deliberately coarse. The full frame is dropped as soon
//! as the thumbnail exists, and only the latest thumbnail is kept.

use crate::activity::{SharedActivityMonitor, SignalSource};
use crate::platform::PlatformError;
use crate::probe::{sleep_while_running, ProbeError, ProbeHandle};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Width and height of a screen sample in pixels.
pub const SAMPLE_SIZE: u32 = 32;

/// Something that can capture the primary display.
pub trait FrameSource: Send {
    fn capture(&mut self) -> Result<DynamicImage, PlatformError>;
}

/// A downsampled single-channel view of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenSample {
    pixels: GrayImage,
}

impl ScreenSample {
    pub fn from_frame(frame: &DynamicImage) -> Result<Self, ProbeError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(ProbeError::InvalidFrame("empty frame".to_string()));
        }

        let gray = frame.to_luma8();
        let pixels = imageops::resize(&gray, SAMPLE_SIZE, SAMPLE_SIZE, FilterType::Triangle);
        Ok(Self { pixels })
    }

    /// Sum of absolute per-pixel differences, in units of one fully changed
    /// pixel. Ranges from 0 to `SAMPLE_SIZE²`.
    pub fn change_score(&self, previous: &ScreenSample) -> f64 {
        let total: u64 = self
            .pixels
            .as_raw()
            .iter()
            .zip(previous.pixels.as_raw())
            .map(|(a, b)| u64::from(a.abs_diff(*b)))
            .sum();
        total as f64 / 255.0
    }

    pub fn pixels(&self) -> &GrayImage {
        &self.pixels
    }
}

pub struct ScreenProbe<S> {
    source: S,
    monitor: SharedActivityMonitor,
    threshold: f64,
    previous: Option<ScreenSample>,
}

impl<S: FrameSource + 'static> ScreenProbe<S> {
    pub fn new(source: S, monitor: SharedActivityMonitor, threshold: f64) -> Self {
        Self {
            source,
            monitor,
            threshold,
            previous: None,
        }
    }

    /// Capture and compare once.
    ///
    /// Returns the change score against the previous sample, or `None` when
    /// nothing was compared (monitor paused, or no previous sample yet). The
    /// new sample replaces the previous one whether or not it crossed the
    /// threshold.
    pub fn sample_once(&mut self) -> Result<Option<f64>, ProbeError> {
        if self.monitor.is_paused() {
            return Ok(None);
        }

        let frame = self.source.capture()?;
        let sample = ScreenSample::from_frame(&frame)?;
        drop(frame);

        let score = self
            .previous
            .as_ref()
            .map(|previous| sample.change_score(previous));
        self.previous = Some(sample);

        if let Some(score) = score {
            debug!("Screen change score {score:.1}");
            if score > self.threshold {
                self.monitor.report_activity(SignalSource::Screen);
            }
        }
        Ok(score)
    }

    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }

    pub fn run(mut self, running: &AtomicBool, interval: Duration) {
        while running.load(Ordering::SeqCst) {
            if let Err(e) = self.sample_once() {
                warn!("Screen probe: {e}");
            }
            if !sleep_while_running(running, interval) {
                break;
            }
        }
    }

    /// Sample every `interval` on a dedicated thread.
    pub fn spawn(self, interval: Duration) -> Result<ProbeHandle, ProbeError> {
        ProbeHandle::spawn("screen", move |running| self.run(&running, interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityMonitor;
    use crate::clock::{Clock, ManualClock};
    use crate::transparency::SessionLog;
    use image::{Luma, RgbaImage};
    use std::collections::VecDeque;
    use std::sync::Arc;

    struct ScriptedFrames(VecDeque<Result<DynamicImage, PlatformError>>);

    impl FrameSource for ScriptedFrames {
        fn capture(&mut self) -> Result<DynamicImage, PlatformError> {
            self.0
                .pop_front()
                .unwrap_or(Err(PlatformError::CaptureFailed("script exhausted".into())))
        }
    }

    fn near(score: f64, expected: f64) -> bool {
        (score - expected).abs() < 8.0
    }

    fn solid(level: u8) -> DynamicImage {
        let pixel = image::Rgba([level, level, level, 255]);
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 48, pixel))
    }

    /// Left `columns` of 32 columns white, the rest black.
    fn striped(columns: u32) -> DynamicImage {
        let mut img = RgbaImage::from_pixel(32, 32, image::Rgba([0, 0, 0, 255]));
        for x in 0..columns {
            for y in 0..32 {
                img.put_pixel(x, y, image::Rgba([255, 255, 255, 255]));
            }
        }
        DynamicImage::ImageRgba8(img)
    }

    type Fixture = (Arc<ManualClock>, SharedActivityMonitor, ScreenProbe<ScriptedFrames>);

    fn probe_with(frames: Vec<DynamicImage>) -> Fixture {
        let clock = Arc::new(ManualClock::at_epoch());
        let monitor = ActivityMonitor::shared(clock.clone(), Arc::new(SessionLog::new()));
        let source = ScriptedFrames(frames.into_iter().map(Ok).collect());
        let probe = ScreenProbe::new(source, monitor.clone(), 100.0);
        (clock, monitor, probe)
    }

    #[test]
    fn test_sample_is_downsampled_gray() {
        let sample = ScreenSample::from_frame(&solid(200)).unwrap();
        assert_eq!(sample.pixels().dimensions(), (SAMPLE_SIZE, SAMPLE_SIZE));
        let Luma([level]) = *sample.pixels().get_pixel(5, 5);
        assert!(level.abs_diff(200) <= 1);
    }

    #[test]
    fn test_change_score() {
        let black = ScreenSample::from_frame(&solid(0)).unwrap();
        let white = ScreenSample::from_frame(&solid(255)).unwrap();

        assert_eq!(black.change_score(&black), 0.0);
        assert!(near(white.change_score(&black), 1024.0));
        assert_eq!(black.change_score(&white), white.change_score(&black));
    }

    #[test]
    fn test_first_sample_only_primes() {
        let (_, monitor, mut probe) = probe_with(vec![solid(0)]);
        assert_eq!(probe.sample_once(), Ok(None));
        assert!(probe.has_previous());
        assert_eq!(monitor.session_log().stats().screen_signals, 0);
    }

    #[test]
    fn test_large_change_reports_activity() {
        let (clock, monitor, mut probe) = probe_with(vec![solid(0), solid(255)]);
        probe.sample_once().unwrap();
        clock.advance_secs(15);

        assert!(near(probe.sample_once().unwrap().unwrap(), 1024.0));
        assert_eq!(monitor.last_activity_time(), clock.now());
        assert_eq!(monitor.session_log().stats().screen_signals, 1);
    }

    #[test]
    fn test_small_change_is_ignored() {
        // 3 of 32 columns flip: 96 fully changed pixels, under the threshold
        let (clock, monitor, mut probe) = probe_with(vec![striped(0), striped(3)]);
        let before = monitor.last_activity_time();
        probe.sample_once().unwrap();
        clock.advance_secs(15);

        let score = probe.sample_once().unwrap().unwrap();
        assert!(score > 0.0 && score < 100.0);
        assert_eq!(monitor.last_activity_time(), before);
    }

    #[test]
    fn test_compares_against_immediately_previous() {
        // Slow drift: each step is small, even though first vs last is large
        let frames = (0..=6).map(|i| striped(i * 3)).collect();
        let (_, monitor, mut probe) = probe_with(frames);

        probe.sample_once().unwrap();
        for _ in 0..6 {
            let score = probe.sample_once().unwrap().unwrap();
            assert!(score < 100.0);
        }
        assert_eq!(monitor.session_log().stats().screen_signals, 0);
    }

    #[test]
    fn test_paused_skips_capture() {
        let (_, monitor, mut probe) = probe_with(vec![solid(0), solid(255)]);
        monitor.set_paused(true);

        assert_eq!(probe.sample_once(), Ok(None));
        assert!(!probe.has_previous());

        // The frames were not consumed while paused
        monitor.set_paused(false);
        assert_eq!(probe.sample_once(), Ok(None));
        assert!(near(probe.sample_once().unwrap().unwrap(), 1024.0));
    }

    #[test]
    fn test_capture_error_keeps_previous() {
        let clock = Arc::new(ManualClock::at_epoch());
        let monitor = ActivityMonitor::shared(clock, Arc::new(SessionLog::new()));
        let source = ScriptedFrames(VecDeque::from(vec![
            Ok(solid(0)),
            Err(PlatformError::CaptureFailed("denied".into())),
            Ok(solid(255)),
        ]));
        let mut probe = ScreenProbe::new(source, monitor, 100.0);

        probe.sample_once().unwrap();
        assert!(probe.sample_once().is_err());
        assert!(near(probe.sample_once().unwrap().unwrap(), 1024.0));
    }
}
