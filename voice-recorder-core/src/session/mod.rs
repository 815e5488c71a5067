pub mod clock;
pub mod delegates;
pub mod facade;
pub mod player;
pub mod recorder;
