// THEORY:
// This file is the main entry point for the `red_light_vision` library crate.
// It exposes the red light / green light game engine to a front end (the
// `red-light-arcade` binary, or a test harness with scripted devices).
//
// The high-level interface is `GameSession` driven by `GameLoop`, configured
// by `GameConfig`. The devices the session needs (a frame source, a person
// detector, an identity tracker and a display) are traits, so the engine
// itself never links against a camera or a neural network. The vision
// building blocks (`core_modules`) stay public for front ends that want to
// reuse the geometry, the movement detector or the default tracker.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod game;

pub use config::{EmptyLobbyPolicy, GameConfig, ModelArtifacts};
pub use core_modules::bounding_box::BoundingBox;
pub use core_modules::detection::{Detection, IdentityTracker, PersonDetector, TrackedPerson};
pub use core_modules::frame::Frame;
pub use core_modules::player::{Player, Standings};
pub use core_modules::tracker::CentroidTracker;
pub use error::{GameError, Result};
pub use game::clock::{Clock, ManualClock, TokioClock};
pub use game::devices::{
    Devices, Display, DisplayEvent, FrameSource, NullDisplay, Overlay, PersonMarker,
};
pub use game::game_loop::{GameLoop, LoopControl, LoopExit};
pub use game::phase::{Light, Phase};
pub use game::session::{GameSession, TickOutcome};
