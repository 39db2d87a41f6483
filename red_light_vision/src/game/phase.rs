// THEORY:
// The phase state machine, kept free of I/O. `transition` is a pure function
// from (current phase, trigger) to the next phase plus the effects the
// session must apply on entry. The session decides *when* a trigger fires
// (timers, countdowns, operator input); this module only decides *what* the
// trigger means in the current phase. That split makes every rule below
// testable without a camera or a clock.
//
//   Connecting --SourceOpened--> GameStart
//   GameStart  --CountdownElapsed(players > 0)--> GreenLight
//   GameStart  --CountdownElapsed(no players, retry)--> GameStart
//   GameStart  --CountdownElapsed(no players, no retry)--> GameEnd
//   GreenLight --TimerExpired--> RedLight
//   RedLight   --TimerExpired--> GreenLight
//   RedLight   --RoundLimitReached--> GameEnd
//   GreenLight | RedLight --AllEliminated--> GameEnd
//   any but GameEnd --EndRequested--> GameEnd
//
// `RedLightLaser` is reserved: nothing transitions into it.

use crate::error::{GameError, Result};
use rand::Rng;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Connecting,
    GameStart,
    GreenLight,
    RedLight,
    /// Reserved for a red-light enforcement stage. Never entered.
    RedLightLaser,
    GameEnd,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::GameEnd)
    }

    /// The light shown during a timed gameplay phase.
    pub fn light(&self) -> Option<Light> {
        match self {
            Phase::GreenLight => Some(Light::Green),
            Phase::RedLight => Some(Light::Red),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Connecting => "CONNECTING",
            Phase::GameStart => "GAME START",
            Phase::GreenLight => "GREEN LIGHT",
            Phase::RedLight => "RED LIGHT",
            Phase::RedLightLaser => "RED LIGHT LASER",
            Phase::GameEnd => "GAME END",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Light {
    Green,
    Red,
}

/// Inclusive range of phase lengths, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DurationRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DurationRange {
    pub fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        checked_secs(&format!("{name}.min_secs"), self.min_secs)?;
        checked_secs(&format!("{name}.max_secs"), self.max_secs)?;
        if self.min_secs <= self.max_secs {
            Ok(())
        } else {
            Err(GameError::InvalidConfig(format!(
                "{name} must satisfy 0 <= min_secs <= max_secs, got [{}, {}]",
                self.min_secs, self.max_secs
            )))
        }
    }

    /// Draws a duration uniformly from the range.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let secs = if self.min_secs < self.max_secs {
            rng.gen_range(self.min_secs..=self.max_secs)
        } else {
            self.min_secs
        };
        Duration::from_secs_f64(secs)
    }
}

/// Seconds as a `Duration`, or `InvalidConfig` naming `field` when the value
/// is negative, NaN or too large to represent.
pub(crate) fn checked_secs(field: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|e| {
        let reason = format!("{field} must be a representable duration, got {secs}: {e}");
        GameError::InvalidConfig(reason)
    })
}

/// Something that happened which may move the game to another phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    SourceOpened,
    CountdownElapsed { players: usize, retry: bool },
    TimerExpired,
    RoundLimitReached,
    AllEliminated,
    EndRequested,
}

/// Work the session performs when entering the next phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    SampleDuration(Light),
    StartCountdown,
    ClearAnchors,
    ReportStandings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn new(from: Phase, to: Phase, effects: Vec<Effect>) -> Self {
        Self { from, to, effects }
    }
}

/// Decides what `trigger` does in `phase`. `None` means the trigger is
/// ignored there.
pub fn transition(phase: Phase, trigger: Trigger) -> Option<Transition> {
    use Phase::*;
    use Trigger::*;

    let end = |from| Some(Transition::new(from, GameEnd, vec![Effect::ReportStandings]));

    match (phase, trigger) {
        (GameEnd, _) => None,
        (RedLightLaser, EndRequested) => end(phase),
        (RedLightLaser, _) => None,
        (_, EndRequested) => end(phase),

        (Connecting, SourceOpened) => Some(Transition::new(
            Connecting,
            GameStart,
            vec![Effect::StartCountdown],
        )),

        (GameStart, CountdownElapsed { players, .. }) if players > 0 => Some(Transition::new(
            GameStart,
            GreenLight,
            vec![Effect::SampleDuration(Light::Green)],
        )),
        (GameStart, CountdownElapsed { retry: true, .. }) => {
            Some(Transition::new(GameStart, GameStart, vec![Effect::StartCountdown]))
        }
        (GameStart, CountdownElapsed { retry: false, .. }) => end(GameStart),

        (GreenLight, TimerExpired) => Some(Transition::new(
            GreenLight,
            RedLight,
            vec![Effect::SampleDuration(Light::Red), Effect::ClearAnchors],
        )),
        (RedLight, TimerExpired) => Some(Transition::new(
            RedLight,
            GreenLight,
            vec![Effect::SampleDuration(Light::Green)],
        )),
        (RedLight, RoundLimitReached) => end(RedLight),
        (GreenLight | RedLight, AllEliminated) => end(phase),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn connecting_opens_into_countdown() {
        let t = transition(Phase::Connecting, Trigger::SourceOpened).unwrap();
        assert_eq!(t.to, Phase::GameStart);
        assert_eq!(t.effects, vec![Effect::StartCountdown]);
    }

    #[test]
    fn lights_alternate_and_resample() {
        let to_red = transition(Phase::GreenLight, Trigger::TimerExpired).unwrap();
        assert_eq!(to_red.to, Phase::RedLight);
        assert!(to_red.effects.contains(&Effect::SampleDuration(Light::Red)));
        assert!(to_red.effects.contains(&Effect::ClearAnchors));

        let to_green = transition(Phase::RedLight, Trigger::TimerExpired).unwrap();
        assert_eq!(to_green.to, Phase::GreenLight);
        assert_eq!(to_green.effects, vec![Effect::SampleDuration(Light::Green)]);
    }

    #[test]
    fn countdown_outcomes() {
        let start = |players, retry| {
            transition(Phase::GameStart, Trigger::CountdownElapsed { players, retry })
        };
        assert_eq!(start(2, false).unwrap().to, Phase::GreenLight);
        assert_eq!(start(0, true).unwrap().to, Phase::GameStart);
        assert_eq!(start(0, false).unwrap().to, Phase::GameEnd);
    }

    #[test]
    fn end_is_reachable_from_every_live_phase_and_final() {
        for phase in [Phase::Connecting, Phase::GameStart, Phase::GreenLight, Phase::RedLight] {
            let t = transition(phase, Trigger::EndRequested).unwrap();
            assert_eq!(t.to, Phase::GameEnd);
            assert_eq!(t.effects, vec![Effect::ReportStandings]);
        }
        assert!(transition(Phase::GameEnd, Trigger::EndRequested).is_none());
        assert!(transition(Phase::GameEnd, Trigger::TimerExpired).is_none());
    }

    #[test]
    fn irrelevant_triggers_are_ignored() {
        assert!(transition(Phase::Connecting, Trigger::TimerExpired).is_none());
        assert!(transition(Phase::GameStart, Trigger::TimerExpired).is_none());
        assert!(transition(Phase::GreenLight, Trigger::RoundLimitReached).is_none());
        assert!(transition(Phase::GameStart, Trigger::AllEliminated).is_none());
        assert!(transition(Phase::RedLightLaser, Trigger::TimerExpired).is_none());
    }

    #[test]
    fn nothing_leads_into_the_laser_phase() {
        let phases = [Phase::Connecting, Phase::GameStart, Phase::GreenLight, Phase::RedLight];
        let triggers = [
            Trigger::SourceOpened,
            Trigger::CountdownElapsed { players: 1, retry: false },
            Trigger::CountdownElapsed { players: 0, retry: true },
            Trigger::TimerExpired,
            Trigger::RoundLimitReached,
            Trigger::AllEliminated,
            Trigger::EndRequested,
        ];
        for phase in phases {
            for trigger in triggers {
                if let Some(t) = transition(phase, trigger) {
                    assert_ne!(t.to, Phase::RedLightLaser);
                }
            }
        }
    }

    #[test]
    fn degenerate_range_samples_its_single_value() {
        let mut rng = StdRng::seed_from_u64(1);
        let range = DurationRange::new(2.5, 2.5);
        assert_eq!(range.sample(&mut rng), Duration::from_secs_f64(2.5));
    }

    #[test]
    fn range_validation() {
        assert!(DurationRange::new(1.0, 2.0).validate("r").is_ok());
        assert!(DurationRange::new(2.0, 1.0).validate("r").is_err());
        assert!(DurationRange::new(-1.0, 1.0).validate("r").is_err());
        assert!(DurationRange::new(0.0, f64::NAN).validate("r").is_err());
        assert!(DurationRange::new(1.0, 1.0e20).validate("r").is_err());
    }

    proptest! {
        #[test]
        fn sampled_duration_stays_in_range(
            lo in 0.0f64..60.0,
            span in 0.0f64..60.0,
            seed in any::<u64>(),
        ) {
            let hi = lo + span;
            let range = DurationRange::new(lo, hi);
            let mut rng = StdRng::seed_from_u64(seed);
            let d = range.sample(&mut rng).as_secs_f64();
            // Duration keeps nanosecond precision.
            prop_assert!(d >= lo - 1e-9 && d <= hi + 1e-9, "{} not in [{}, {}]", d, lo, hi);
        }
    }
}
