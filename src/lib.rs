//! Single-session WireGuard control surface
//!
//! Translates WireGuard configuration text into engine directives and drives
//! one tunnel session at a time through start, status and stop.
pub mod config;
pub mod control;
pub mod engine;
pub mod network;
pub mod session;
pub mod translate;

pub use session::{SessionManager, SessionStatus, StartError};
pub use translate::{translate, DirectiveList};
