// THEORY:
// `GameLoop` drives a `GameSession` at a fixed tick rate. Ticks come from a
// tokio interval with `MissedTickBehavior::Delay`: a slow tick (a heavy
// detection) pushes the schedule back instead of firing a burst of catch-up
// ticks with stale timing.
//
// The loop is controlled through a `watch` channel. The control value is
// checked before every tick and raced against the interval, with control
// first, so a stop request is honoured before the next tick runs:
//
// - `Run`: keep ticking.
// - `End`: ask the session to finish the game normally. Standings are still
//   reported.
// - `Stop`: leave immediately without another tick.
//
// Whatever the exit, the frame source is released before `run` returns.

use crate::config::GameConfig;
use crate::core_modules::player::Standings;
use crate::error::Result;
use crate::game::session::{GameSession, TickOutcome};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Run,
    End,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    Finished(Standings),
    Stopped,
}

pub struct GameLoop {
    tick_interval: Duration,
}

impl GameLoop {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub async fn run(
        &self,
        session: &mut GameSession,
        mut control: watch::Receiver<LoopControl>,
    ) -> Result<LoopExit> {
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut control_open = true;

        let exit = loop {
            match *control.borrow_and_update() {
                LoopControl::Stop => break Ok(LoopExit::Stopped),
                LoopControl::End => session.request_end(),
                LoopControl::Run => {}
            }

            if control_open {
                tokio::select! {
                    biased;
                    changed = control.changed() => {
                        if changed.is_err() {
                            debug!("control channel closed, running to completion");
                            control_open = false;
                        }
                        continue;
                    }
                    _ = ticker.tick() => {}
                }
            } else {
                ticker.tick().await;
            }

            match session.tick() {
                Ok(TickOutcome::Finished(standings)) => break Ok(LoopExit::Finished(standings)),
                Ok(_) => {}
                Err(e) => break Err(e),
            }
        };

        session.release();
        match &exit {
            Ok(LoopExit::Finished(standings)) => info!("game finished\n{standings}"),
            Ok(LoopExit::Stopped) => info!(phase = %session.phase(), "game stopped"),
            Err(_) => {}
        }
        exit
    }
}
