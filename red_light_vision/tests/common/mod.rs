// Scripted devices for driving a `GameSession` without a camera.

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use red_light_vision::{
    BoundingBox, Detection, Devices, Display, DisplayEvent, Frame, FrameSource, GameConfig,
    GameError, GameSession, IdentityTracker, ManualClock, Overlay, PersonDetector, Player, Result,
    Standings, TickOutcome, TrackedPerson,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FRAME_WIDTH: u32 = 640;
pub const FRAME_HEIGHT: u32 = 480;

pub fn blank_frame() -> Frame {
    Frame::new(RgbImage::new(FRAME_WIDTH, FRAME_HEIGHT))
}

/// A black frame with a noisy texture inside `bbox`.
pub fn textured_frame(bbox: &BoundingBox) -> Frame {
    let mut image = RgbImage::new(FRAME_WIDTH, FRAME_HEIGHT);
    for y in bbox.y as u32..(bbox.y + bbox.height) as u32 {
        for x in bbox.x as u32..(bbox.x + bbox.width) as u32 {
            let h = (x / 2).wrapping_mul(2_654_435_761) ^ (y / 2).wrapping_mul(40_503);
            let v = (h >> 8) as u8;
            image.put_pixel(x, y, Rgb([v, v, v]));
        }
    }
    Frame::new(image)
}

/// Person box `index` in a row of evenly spaced players.
pub fn person_box(index: usize) -> BoundingBox {
    BoundingBox::new(50.0 + 200.0 * index as f32, 100.0, 100.0, 200.0)
}

#[derive(Clone, Default)]
pub struct SourceState {
    pub fail_open: bool,
    pub opened: Arc<AtomicBool>,
    pub released: Arc<AtomicBool>,
    /// `None` simulates a dropped frame.
    pub frame: Arc<Mutex<Option<Frame>>>,
}

pub struct ScriptedSource(pub SourceState);

impl FrameSource for ScriptedSource {
    fn open(&mut self) -> Result<()> {
        if self.0.fail_open {
            return Err(GameError::SourceUnavailable("camera 0".into()));
        }
        self.0.opened.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn read_frame(&mut self) -> Option<Frame> {
        self.0.frame.lock().unwrap().clone()
    }

    fn release(&mut self) {
        self.0.released.store(true, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
pub struct DetectorState {
    pub people: Arc<Mutex<Vec<BoundingBox>>>,
    pub fail: Arc<AtomicBool>,
}

pub struct ScriptedDetector(pub DetectorState);

impl PersonDetector for ScriptedDetector {
    fn detect_persons(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        if self.0.fail.load(Ordering::SeqCst) {
            return Err(GameError::Detection("inference failed".into()));
        }
        let people = self.0.people.lock().unwrap();
        // Falling confidences keep the order stable through suppression.
        Ok(people
            .iter()
            .enumerate()
            .map(|(i, bbox)| Detection::new(*bbox, 0.9 - i as f32 * 0.01))
            .collect())
    }
}

/// Identity `n` is always the n-th detection.
pub struct OrderTracker;

impl IdentityTracker for OrderTracker {
    fn track(&mut self, detections: &[Detection]) -> Vec<TrackedPerson> {
        detections
            .iter()
            .enumerate()
            .map(|(i, d)| TrackedPerson {
                id: i as u64 + 1,
                bbox: d.bbox,
            })
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct DisplayState {
    pub overlays: Arc<Mutex<Vec<Overlay>>>,
    pub end_on_next_present: Arc<AtomicBool>,
    pub standings_shown: Arc<AtomicBool>,
    /// (player number, reference patch size) per player on the standings card.
    pub portraits: Arc<Mutex<Vec<(u64, (u32, u32))>>>,
}

pub struct RecordingDisplay(pub DisplayState);

impl Display for RecordingDisplay {
    fn present(&mut self, _frame: &Frame, overlay: &Overlay) -> DisplayEvent {
        self.0.overlays.lock().unwrap().push(overlay.clone());
        if self.0.end_on_next_present.swap(false, Ordering::SeqCst) {
            DisplayEvent::EndRequested
        } else {
            DisplayEvent::None
        }
    }

    fn show_standings(&mut self, _standings: &Standings, players: &[Player]) {
        self.0.standings_shown.store(true, Ordering::SeqCst);
        let portraits = players
            .iter()
            .map(|p| (p.number(), p.reference_patch().dimensions()))
            .collect();
        *self.0.portraits.lock().unwrap() = portraits;
    }
}

/// Short, deterministic timings: 1 s countdown, 1 s green, 2 s red.
pub fn quick_config() -> GameConfig {
    GameConfig::from_yaml(
        r#"
countdown_secs: 1.0
seed: 7
green_light: { min_secs: 1.0, max_secs: 1.0 }
red_light: { min_secs: 2.0, max_secs: 2.0 }
"#,
    )
    .unwrap()
}

pub struct Harness {
    pub session: GameSession,
    pub clock: ManualClock,
    pub source: SourceState,
    pub detector: DetectorState,
    pub display: DisplayState,
}

impl Harness {
    pub fn new(config: GameConfig) -> Self {
        Self::with_source(config, SourceState::default())
    }

    pub fn with_source(config: GameConfig, source: SourceState) -> Self {
        *source.frame.lock().unwrap() = Some(blank_frame());
        let detector = DetectorState::default();
        let display = DisplayState::default();
        let clock = ManualClock::new();
        let devices = Devices {
            source: Box::new(ScriptedSource(source.clone())),
            detector: Box::new(ScriptedDetector(detector.clone())),
            tracker: Box::new(OrderTracker),
            display: Box::new(RecordingDisplay(display.clone())),
        };
        let session = GameSession::new(config, devices, Box::new(clock.clone()));
        Self {
            session,
            clock,
            source,
            detector,
            display,
        }
    }

    pub fn set_people(&self, people: &[BoundingBox]) {
        *self.detector.people.lock().unwrap() = people.to_vec();
    }

    pub fn set_frame(&self, frame: Option<Frame>) {
        *self.source.frame.lock().unwrap() = frame;
    }

    pub fn advance_secs(&self, secs: f64) {
        self.clock.advance(Duration::from_secs_f64(secs));
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.session.tick().expect("tick failed")
    }

    /// Connects, registers everyone currently detected and lets the
    /// countdown run out, leaving the game in its first green light.
    pub fn start_game(&mut self) {
        assert_eq!(self.tick(), TickOutcome::Continue);
        assert_eq!(self.tick(), TickOutcome::Continue);
        self.advance_secs(1.0);
        assert_eq!(self.tick(), TickOutcome::Continue);
    }

    pub fn last_overlay(&self) -> Overlay {
        self.display.overlays.lock().unwrap().last().cloned().expect("nothing presented")
    }
}
