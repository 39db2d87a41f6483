pub mod bounding_box;
pub mod detection;
pub mod frame;
pub mod movement;
pub mod patch;
pub mod player;
pub mod ssim;
pub mod tracker;
