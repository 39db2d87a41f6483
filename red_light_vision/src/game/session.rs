// THEORY:
// `GameSession` is the top-level API of the engine: one value that owns the
// devices, the player registry and the phase state machine, advanced one
// `tick` at a time. A tick has two halves, always in this order:
//
// 1.  **Triggers**: look at the clock and the registry and decide whether
//     something happened (timer expired, countdown over, everyone out, the
//     operator asked to stop). At most one trigger fires per tick. The pure
//     `transition` function turns it into the next phase and its effects,
//     which are applied here (sample a new duration, restart the countdown,
//     clear red-light anchors).
// 2.  **Handler**: run the current phase once. Gameplay phases read one
//     frame, detect, suppress duplicates, track, then do the phase's work
//     and present the frame.
//
// Red light compares each player against an *anchor*: the first observation
// of that player in the current red-light phase. Anchors are cleared every
// time red light is entered, so moving during green light never counts.
//
// A dropped frame or a failed detection skips the rest of the tick. Nothing
// about the players changes on a skipped tick.

use crate::config::{EmptyLobbyPolicy, GameConfig};
use crate::core_modules::detection::{TrackedPerson, non_max_suppression};
use crate::core_modules::frame::Frame;
use crate::core_modules::movement::{Observation, check_movement};
use crate::core_modules::player::{Anchor, Player, PlayerRegistry, Standings};
use crate::error::Result;
use crate::game::clock::Clock;
use crate::game::devices::{Devices, DisplayEvent, Overlay, PersonMarker};
use crate::game::phase::{Effect, Light, Phase, Transition, Trigger, transition};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// No frame, or the detector failed. Nothing changed.
    Skipped,
    Finished(Standings),
}

pub struct GameSession {
    config: GameConfig,
    devices: Devices,
    clock: Box<dyn Clock>,
    rng: StdRng,
    registry: PlayerRegistry,
    phase: Phase,
    phase_entered: Duration,
    phase_duration: Duration,
    countdown_attempts: u32,
    completed_rounds: u32,
    end_requested: bool,
    history: Vec<Transition>,
    standings: Option<Standings>,
}

impl GameSession {
    pub fn new(config: GameConfig, devices: Devices, clock: Box<dyn Clock>) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let now = clock.now();
        Self {
            config,
            devices,
            clock,
            rng,
            registry: PlayerRegistry::new(),
            phase: Phase::Connecting,
            phase_entered: now,
            phase_duration: Duration::ZERO,
            countdown_attempts: 0,
            completed_rounds: 0,
            end_requested: false,
            history: Vec::new(),
            standings: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    /// Every phase change so far, oldest first.
    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    /// Length of the current timed phase (countdown, green or red).
    pub fn phase_duration(&self) -> Duration {
        self.phase_duration
    }

    pub fn completed_rounds(&self) -> u32 {
        self.completed_rounds
    }

    /// Asks the game to end at the start of the next tick.
    pub fn request_end(&mut self) {
        if !self.phase.is_terminal() {
            self.end_requested = true;
        }
    }

    /// Releases the frame source. Called once the loop stops for any reason.
    pub fn release(&mut self) {
        self.devices.source.release();
    }

    pub fn tick(&mut self) -> Result<TickOutcome> {
        if let Some(trigger) = self.pending_trigger() {
            self.fire(trigger);
        }

        match self.phase {
            Phase::Connecting => self.connect(),
            Phase::GameStart => self.run_countdown(),
            Phase::GreenLight => self.green_light(),
            Phase::RedLight => self.red_light(),
            Phase::RedLightLaser => Ok(TickOutcome::Continue),
            Phase::GameEnd => Ok(self.finish()),
        }
    }

    fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.phase_entered)
    }

    fn pending_trigger(&mut self) -> Option<Trigger> {
        if self.phase.is_terminal() {
            return None;
        }
        if self.end_requested {
            self.end_requested = false;
            return Some(Trigger::EndRequested);
        }

        let expired = self.elapsed() >= self.phase_duration;
        match self.phase {
            Phase::GameStart if expired => {
                let retry = self.config.empty_lobby == EmptyLobbyPolicy::Restart
                    && self.countdown_attempts < self.config.max_countdown_attempts;
                Some(Trigger::CountdownElapsed {
                    players: self.registry.len(),
                    retry,
                })
            }
            Phase::GreenLight | Phase::RedLight if self.registry.all_eliminated() => {
                Some(Trigger::AllEliminated)
            }
            Phase::GreenLight if expired => Some(Trigger::TimerExpired),
            Phase::RedLight if expired => {
                let limit = self.config.rounds;
                if limit > 0 && self.completed_rounds + 1 >= limit {
                    Some(Trigger::RoundLimitReached)
                } else {
                    Some(Trigger::TimerExpired)
                }
            }
            _ => None,
        }
    }

    fn fire(&mut self, trigger: Trigger) {
        let Some(next) = transition(self.phase, trigger) else {
            trace!(phase = %self.phase, ?trigger, "trigger ignored");
            return;
        };

        let round_over = matches!(trigger, Trigger::TimerExpired | Trigger::RoundLimitReached);
        if next.from == Phase::RedLight && round_over {
            self.completed_rounds += 1;
        }

        self.phase = next.to;
        self.phase_entered = self.clock.now();
        for effect in &next.effects {
            match effect {
                Effect::SampleDuration(light) => {
                    let range = match light {
                        Light::Green => self.config.green_light,
                        Light::Red => self.config.red_light,
                    };
                    self.phase_duration = range.sample(&mut self.rng);
                }
                Effect::StartCountdown => {
                    self.countdown_attempts += 1;
                    self.phase_duration = self.config.countdown();
                }
                Effect::ClearAnchors => self.registry.clear_anchors(),
                Effect::ReportStandings => self.phase_duration = Duration::ZERO,
            }
        }

        info!(
            from = %next.from,
            to = %next.to,
            ?trigger,
            duration_secs = self.phase_duration.as_secs_f64(),
            "Current State: {}",
            next.to
        );
        self.history.push(next);
    }

    // --- Phase handlers ---

    fn connect(&mut self) -> Result<TickOutcome> {
        self.devices.source.open()?;
        info!("frame source opened");
        self.fire(Trigger::SourceOpened);
        Ok(TickOutcome::Continue)
    }

    fn run_countdown(&mut self) -> Result<TickOutcome> {
        let Some((frame, tracked)) = self.observe()? else {
            return Ok(TickOutcome::Skipped);
        };

        for person in &tracked {
            if let Some(player) = self.registry.get_mut(person.id) {
                player.update_bbox(person.bbox);
                continue;
            }
            let Some(patch) = frame.grayscale_patch(&person.bbox) else {
                debug!(id = person.id, "box outside the frame, registration deferred");
                continue;
            };
            let player = Player::new(person.id, patch, person.bbox, self.config.movement);
            if self.registry.register(player) {
                info!(player = person.id, "player registered");
            }
        }

        let remaining = self.phase_duration.saturating_sub(self.elapsed());
        self.present(&frame, &tracked, Some(remaining));
        Ok(TickOutcome::Continue)
    }

    fn green_light(&mut self) -> Result<TickOutcome> {
        let Some((frame, tracked)) = self.observe()? else {
            return Ok(TickOutcome::Skipped);
        };
        for person in &tracked {
            if let Some(player) = self.registry.get_mut(person.id) {
                player.update_bbox(person.bbox);
            }
        }
        self.present(&frame, &tracked, None);
        Ok(TickOutcome::Continue)
    }

    fn red_light(&mut self) -> Result<TickOutcome> {
        let Some((frame, tracked)) = self.observe()? else {
            return Ok(TickOutcome::Skipped);
        };

        for person in &tracked {
            let Some(player) = self.registry.get_mut(person.id) else {
                continue;
            };
            player.update_bbox(person.bbox);
            if player.is_eliminated() {
                continue;
            }
            let Some(patch) = frame.grayscale_patch(&person.bbox) else {
                continue;
            };

            let verdict = player.anchor().map(|anchor| {
                let current = Observation {
                    bbox: &person.bbox,
                    patch: &patch,
                };
                check_movement(player.thresholds(), anchor.observation(), current)
            });
            let verdict = match verdict.transpose() {
                Ok(verdict) => verdict,
                Err(e) => {
                    warn!(player = person.id, error = %e, "movement check failed, player skipped");
                    continue;
                }
            };

            match verdict {
                None => player.set_anchor(Anchor {
                    bbox: person.bbox,
                    patch,
                }),
                Some(verdict) if verdict.is_movement() => {
                    player.eliminate();
                    info!(player = person.id, ?verdict, "movement detected, player eliminated");
                }
                Some(verdict) => trace!(player = person.id, ?verdict, "player still"),
            }
        }

        self.present(&frame, &tracked, None);
        Ok(TickOutcome::Continue)
    }

    fn finish(&mut self) -> TickOutcome {
        if let Some(standings) = &self.standings {
            return TickOutcome::Finished(standings.clone());
        }
        let standings = self.registry.standings();
        info!(winners = ?standings.winners, losers = ?standings.losers, "game over");
        self.devices.display.show_standings(&standings, self.registry.players());
        self.standings = Some(standings.clone());
        TickOutcome::Finished(standings)
    }

    // --- Per-tick plumbing ---

    /// Reads, detects and tracks. `None` means the tick should be skipped.
    fn observe(&mut self) -> Result<Option<(Frame, Vec<TrackedPerson>)>> {
        let Some(frame) = self.devices.source.read_frame() else {
            trace!(phase = %self.phase, "no frame, tick skipped");
            return Ok(None);
        };

        let detections = match self.devices.detector.detect_persons(&frame) {
            Ok(detections) => detections,
            Err(e) if !e.is_fatal() => {
                warn!(error = %e, "detection failed, tick skipped");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if detections.is_empty() {
            debug!("no person detected");
        }

        let detections = non_max_suppression(detections, self.config.detection.max_bbox_overlap);
        let tracked = self.devices.tracker.track(&detections);
        Ok(Some((frame, tracked)))
    }

    fn present(&mut self, frame: &Frame, tracked: &[TrackedPerson], countdown: Option<Duration>) {
        let markers = tracked
            .iter()
            .map(|person| {
                let player = self.registry.get(person.id);
                PersonMarker {
                    id: person.id,
                    bbox: person.bbox,
                    is_player: player.is_some(),
                    eliminated: player.is_some_and(|p| p.is_eliminated()),
                }
            })
            .collect();
        let overlay = Overlay {
            phase: self.phase,
            border: self.phase.light(),
            countdown,
            markers,
        };

        if self.devices.display.present(frame, &overlay) == DisplayEvent::EndRequested {
            info!("operator requested the end of the game");
            self.request_end();
        }
    }
}
