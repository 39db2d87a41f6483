pub mod clock;
pub mod devices;
pub mod game_loop;
pub mod phase;
pub mod session;
