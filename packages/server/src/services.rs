pub mod phase_engine;
pub mod random;
pub mod resolution;
pub mod role_assignment;
pub mod session_service;
pub mod win;
