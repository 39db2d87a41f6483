// THEORY:
// The hardware the game talks to, as traits. A cabinet provides a frame
// source (camera), a person detector, an identity tracker and a display;
// tests provide scripted fakes. The session owns all four through `Devices`
// and never learns what is behind them.
//
// Failure contract:
// - `FrameSource::open` failing is a setup failure and ends the game.
// - `FrameSource::read_frame` returning `None` is a dropped frame: the tick
//   is skipped and nothing changes.
// - `Display::present` never fails the game; a display that cannot draw
//   logs and carries on.

use crate::core_modules::bounding_box::BoundingBox;
use crate::core_modules::detection::{IdentityTracker, PersonDetector};
use crate::core_modules::frame::Frame;
use crate::core_modules::player::{Player, Standings};
use crate::error::Result;
use crate::game::phase::{Light, Phase};
use std::time::Duration;

pub trait FrameSource {
    fn open(&mut self) -> Result<()>;
    fn read_frame(&mut self) -> Option<Frame>;
    /// Returns the device. Safe to call more than once.
    fn release(&mut self);
}

/// Operator input picked up while presenting a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEvent {
    None,
    EndRequested,
}

pub trait Display {
    fn present(&mut self, frame: &Frame, overlay: &Overlay) -> DisplayEvent;

    /// Shown once when the game ends. `players` is every registered player,
    /// in registration order, with the patch captured at registration.
    fn show_standings(&mut self, _standings: &Standings, _players: &[Player]) {}
}

/// One tracked person as drawn on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersonMarker {
    pub id: u64,
    pub bbox: BoundingBox,
    /// Whether the identity is a registered player.
    pub is_player: bool,
    pub eliminated: bool,
}

/// Everything the display should draw on top of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub phase: Phase,
    pub border: Option<Light>,
    /// Time left in the start countdown.
    pub countdown: Option<Duration>,
    pub markers: Vec<PersonMarker>,
}

/// A display that draws nothing, for headless cabinets.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn present(&mut self, _frame: &Frame, _overlay: &Overlay) -> DisplayEvent {
        DisplayEvent::None
    }
}

pub struct Devices {
    pub source: Box<dyn FrameSource>,
    pub detector: Box<dyn PersonDetector>,
    pub tracker: Box<dyn IdentityTracker>,
    pub display: Box<dyn Display>,
}
