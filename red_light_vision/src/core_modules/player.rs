// THEORY:
// The player registry is the game's memory of who is playing. A `Player` is
// created once, during the start countdown, the first time the tracker
// confirms a new identity. From then on the registry only ever:
//
// - refreshes a player's current box when the tracker reports them,
// - captures or clears the red-light anchor (the observation a red-light
//   phase compares against), and
// - eliminates players. Elimination is one-way: there is no method that
//   clears the flag, and eliminated players stay in the registry so the end
//   of the game can report them.

use crate::core_modules::bounding_box::BoundingBox;
use crate::core_modules::movement::{MovementThresholds, Observation};
use image::GrayImage;
use std::fmt;

/// A snapshot of a player taken the first time they are seen in a red-light
/// phase.
#[derive(Debug, Clone)]
pub struct Anchor {
    pub bbox: BoundingBox,
    pub patch: GrayImage,
}

impl Anchor {
    pub fn observation(&self) -> Observation<'_> {
        Observation {
            bbox: &self.bbox,
            patch: &self.patch,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    number: u64,
    reference_patch: GrayImage,
    bbox: BoundingBox,
    eliminated: bool,
    thresholds: MovementThresholds,
    anchor: Option<Anchor>,
}

impl Player {
    pub fn new(
        number: u64,
        reference_patch: GrayImage,
        bbox: BoundingBox,
        thresholds: MovementThresholds,
    ) -> Self {
        Self {
            number,
            reference_patch,
            bbox,
            eliminated: false,
            thresholds,
            anchor: None,
        }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    /// Appearance captured when the player was first confirmed.
    pub fn reference_patch(&self) -> &GrayImage {
        &self.reference_patch
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn is_eliminated(&self) -> bool {
        self.eliminated
    }

    pub fn thresholds(&self) -> &MovementThresholds {
        &self.thresholds
    }

    pub fn anchor(&self) -> Option<&Anchor> {
        self.anchor.as_ref()
    }

    pub fn update_bbox(&mut self, bbox: BoundingBox) {
        self.bbox = bbox;
    }

    pub fn set_anchor(&mut self, anchor: Anchor) {
        self.anchor = Some(anchor);
    }

    pub fn clear_anchor(&mut self) {
        self.anchor = None;
    }

    pub fn eliminate(&mut self) {
        self.eliminated = true;
    }
}

/// Players in registration order.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: Vec<Player>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new identity. Returns `false` if it was already known.
    pub fn register(&mut self, player: Player) -> bool {
        if self.contains(player.number()) {
            return false;
        }
        self.players.push(player);
        true
    }

    pub fn contains(&self, number: u64) -> bool {
        self.players.iter().any(|p| p.number == number)
    }

    pub fn get(&self, number: u64) -> Option<&Player> {
        self.players.iter().find(|p| p.number == number)
    }

    pub fn get_mut(&mut self, number: u64) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.number == number)
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn eliminated(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.eliminated)
    }

    /// True when there is at least one player and none is left standing.
    pub fn all_eliminated(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.eliminated)
    }

    pub fn clear_anchors(&mut self) {
        for player in &mut self.players {
            player.clear_anchor();
        }
    }

    /// Splits every registered player into winners and losers.
    pub fn standings(&self) -> Standings {
        let (mut losers, mut winners): (Vec<u64>, Vec<u64>) = (Vec::new(), Vec::new());
        for player in &self.players {
            if player.eliminated {
                losers.push(player.number);
            } else {
                winners.push(player.number);
            }
        }
        winners.sort_unstable();
        losers.sort_unstable();
        Standings { winners, losers }
    }
}

/// End-of-game result: player numbers, each list ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Standings {
    pub winners: Vec<u64>,
    pub losers: Vec<u64>,
}

impl fmt::Display for Standings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Winners:")?;
        for number in &self.winners {
            write!(f, " Player {number} ")?;
        }
        write!(f, "\nLosers:")?;
        for number in &self.losers {
            write!(f, " Player {number} ")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(number: u64) -> Player {
        Player::new(
            number,
            GrayImage::new(4, 4),
            BoundingBox::new(0.0, 0.0, 4.0, 4.0),
            MovementThresholds::default(),
        )
    }

    #[test]
    fn duplicate_identity_is_not_registered_twice() {
        let mut registry = PlayerRegistry::new();
        assert!(registry.register(player(4)));
        assert!(!registry.register(player(4)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn standings_partition_every_player() {
        let mut registry = PlayerRegistry::new();
        for n in [3, 1, 2] {
            registry.register(player(n));
        }
        registry.get_mut(2).unwrap().eliminate();
        let standings = registry.standings();
        assert_eq!(standings.winners, vec![1, 3]);
        assert_eq!(standings.losers, vec![2]);
        assert_eq!(
            standings.to_string(),
            "Winners: Player 1  Player 3 \nLosers: Player 2 "
        );
    }

    #[test]
    fn elimination_sticks() {
        let mut p = player(1);
        p.eliminate();
        p.update_bbox(BoundingBox::new(1.0, 1.0, 4.0, 4.0));
        p.clear_anchor();
        p.eliminate();
        assert!(p.is_eliminated());
    }

    #[test]
    fn all_eliminated_needs_players() {
        let mut registry = PlayerRegistry::new();
        assert!(!registry.all_eliminated());
        registry.register(player(1));
        registry.register(player(2));
        registry.get_mut(1).unwrap().eliminate();
        assert!(!registry.all_eliminated());
        registry.get_mut(2).unwrap().eliminate();
        assert!(registry.all_eliminated());
        assert_eq!(registry.eliminated().count(), 2);
    }

    #[test]
    fn anchors_are_cleared_for_everyone() {
        let mut registry = PlayerRegistry::new();
        registry.register(player(1));
        let anchor = Anchor {
            bbox: BoundingBox::new(0.0, 0.0, 4.0, 4.0),
            patch: GrayImage::new(4, 4),
        };
        registry.get_mut(1).unwrap().set_anchor(anchor);
        assert!(registry.get(1).unwrap().anchor().is_some());
        registry.clear_anchors();
        assert!(registry.get(1).unwrap().anchor().is_none());
    }
}
