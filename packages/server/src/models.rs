pub mod config;
pub mod event;
pub mod night;
pub mod player;
pub mod role;
pub mod rule;
pub mod session;
pub mod snapshot;
