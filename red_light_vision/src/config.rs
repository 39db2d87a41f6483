// THEORY:
// `GameConfig` gathers every tunable of the game in one serde-deserializable
// tree. Every field has a default, so an empty (or missing) YAML file yields
// a playable game, and a partial file only overrides what it names.
//
// Loading is two-step: parse, then `validate`. Validation rejects values the
// state machine cannot honour (inverted duration ranges, a zero tick rate,
// seconds too large for a `Duration`, a downsample factor that would erase
// the patches) before any hardware is touched, so a bad file is a setup
// failure and never a mid-game crash.

use crate::core_modules::movement::MovementThresholds;
use crate::error::{GameError, Result};
use crate::game::phase::{DurationRange, checked_secs};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What happens when the start countdown ends and nobody was confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyLobbyPolicy {
    /// Run the countdown again, up to `max_countdown_attempts` times.
    Restart,
    /// Go straight to the end of the game with empty standings.
    End,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: f64,
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: f64,
    #[serde(default = "default_green_light")]
    pub green_light: DurationRange,
    #[serde(default = "default_red_light")]
    pub red_light: DurationRange,
    /// Number of red-light phases to play before the game ends. Zero plays
    /// until everyone is eliminated or the operator ends the game.
    #[serde(default)]
    pub rounds: u32,
    #[serde(default = "default_empty_lobby")]
    pub empty_lobby: EmptyLobbyPolicy,
    #[serde(default = "default_max_countdown_attempts")]
    pub max_countdown_attempts: u32,
    /// Fixed RNG seed for reproducible phase durations.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub movement: MovementThresholds,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default = "default_nms_threshold")]
    pub nms_threshold: f32,
    /// Overlap ratio for the post-detection suppression pass. 1.0 keeps all.
    #[serde(default = "default_max_bbox_overlap")]
    pub max_bbox_overlap: f32,
    #[serde(default = "default_input_size")]
    pub input_size: i32,
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TrackingConfig {
    /// Consecutive hits before a track is confirmed.
    #[serde(default = "default_n_init")]
    pub n_init: u32,
    /// Ticks a confirmed track may go unseen before it is dropped.
    #[serde(default = "default_max_age")]
    pub max_age: u32,
    /// Match gate: centre distance as a fraction of the predicted box height.
    #[serde(default = "default_gate_ratio")]
    pub gate_ratio: f32,
    #[serde(default = "default_max_cosine_distance")]
    pub max_cosine_distance: f32,
}

fn default_tick_rate_hz() -> f64 {
    30.0
}

fn default_countdown_secs() -> f64 {
    10.0
}

fn default_green_light() -> DurationRange {
    DurationRange::new(2.0, 5.0)
}

fn default_red_light() -> DurationRange {
    DurationRange::new(3.0, 6.0)
}

fn default_empty_lobby() -> EmptyLobbyPolicy {
    EmptyLobbyPolicy::Restart
}

fn default_max_countdown_attempts() -> u32 {
    3
}

fn default_confidence_threshold() -> f32 {
    0.65
}

fn default_nms_threshold() -> f32 {
    0.4
}

fn default_max_bbox_overlap() -> f32 {
    1.0
}

fn default_input_size() -> i32 {
    320
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_n_init() -> u32 {
    3
}

fn default_max_age() -> u32 {
    30
}

fn default_gate_ratio() -> f32 {
    0.75
}

fn default_max_cosine_distance() -> f32 {
    0.2
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            countdown_secs: default_countdown_secs(),
            green_light: default_green_light(),
            red_light: default_red_light(),
            rounds: 0,
            empty_lobby: default_empty_lobby(),
            max_countdown_attempts: default_max_countdown_attempts(),
            seed: None,
            detection: DetectionConfig::default(),
            tracking: TrackingConfig::default(),
            movement: MovementThresholds::default(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            nms_threshold: default_nms_threshold(),
            max_bbox_overlap: default_max_bbox_overlap(),
            input_size: default_input_size(),
            model_dir: default_model_dir(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            n_init: default_n_init(),
            max_age: default_max_age(),
            gate_ratio: default_gate_ratio(),
            max_cosine_distance: default_max_cosine_distance(),
        }
    }
}

impl GameConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Loads `path` if it exists, otherwise returns the defaults. A file that
    /// exists but does not parse or validate is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document is YAML null, not an empty mapping.
        let config: GameConfig = if content.trim().is_empty() {
            GameConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.tick_rate_hz.is_finite() && self.tick_rate_hz > 0.0) {
            return Err(GameError::InvalidConfig(format!(
                "tick_rate_hz must be positive, got {}",
                self.tick_rate_hz
            )));
        }
        if checked_secs("tick interval", 1.0 / self.tick_rate_hz)?.is_zero() {
            return Err(GameError::InvalidConfig(format!(
                "tick_rate_hz {} leaves no time between ticks",
                self.tick_rate_hz
            )));
        }
        checked_secs("countdown_secs", self.countdown_secs)?;
        self.green_light.validate("green_light")?;
        self.red_light.validate("red_light")?;
        self.movement.validate()?;
        if self.tracking.n_init == 0 {
            return Err(GameError::InvalidConfig("tracking.n_init must be at least 1".into()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz)
    }

    pub fn countdown(&self) -> Duration {
        Duration::from_secs_f64(self.countdown_secs)
    }
}

const MODEL_CONFIG_FILE: &str = "yolov4-tiny.cfg";
const MODEL_WEIGHTS_FILE: &str = "yolov4-tiny.weights";
const CLASS_NAMES_FILE: &str = "coco.names.txt";
const APPEARANCE_MODEL_FILE: &str = "mars-small128.pb";

/// Paths of the detector resources inside the configured model directory.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub model_config: PathBuf,
    pub weights: PathBuf,
    pub class_names: PathBuf,
    /// The appearance-embedding model, if shipped. Nothing in the game
    /// requires it.
    pub appearance_model: Option<PathBuf>,
}

impl ModelArtifacts {
    /// Resolves every required artifact, failing on the first missing one.
    pub fn locate<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let require = |name: &str| -> Result<PathBuf> {
            let path = dir.join(name);
            if path.is_file() {
                Ok(path)
            } else {
                Err(GameError::MissingArtifact(path))
            }
        };

        let appearance = dir.join(APPEARANCE_MODEL_FILE);
        Ok(Self {
            model_config: require(MODEL_CONFIG_FILE)?,
            weights: require(MODEL_WEIGHTS_FILE)?,
            class_names: require(CLASS_NAMES_FILE)?,
            appearance_model: appearance.is_file().then_some(appearance),
        })
    }

    /// One class name per line, in the detector's class-id order.
    pub fn read_class_names(&self) -> Result<Vec<String>> {
        let content = fs::read_to_string(&self.class_names)?;
        Ok(content.lines().map(|line| line.trim().to_string()).collect())
    }
}
