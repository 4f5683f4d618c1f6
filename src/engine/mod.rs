//! Tunnel engine abstraction
//!
//! The engine does the actual WireGuard work (handshakes, crypto, packet
//! forwarding). This crate only drives it: create it on top of a virtual
//! interface, push a directive list, bring it up, query it, close it.
pub mod uapi;

use crate::network::InterfaceError;
use crate::translate::DirectiveList;
use std::fmt::Display;
use std::io;
use thiserror::Error;
use tracing::{debug, error};

pub use uapi::UapiEngine;

/// Errors reported by a tunnel engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("engine rejected the request (errno={errno})")]
    Rejected { errno: i32 },
    #[error("engine protocol error: {0}")]
    Protocol(String),
    #[error(transparent)]
    Interface(#[from] InterfaceError),
}

/// How the engine binds its UDP sockets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BindStrategy {
    /// Platform default bind on all addresses
    #[default]
    Default,
}

/// Engine log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Silent,
    Error,
    Verbose,
}

/// Logger handed to the engine; messages go out as tracing events
#[derive(Debug, Clone)]
pub struct EngineLogger {
    level: LogLevel,
    prefix: String,
}

impl EngineLogger {
    pub fn new(level: LogLevel, prefix: impl Into<String>) -> Self {
        EngineLogger {
            level,
            prefix: prefix.into(),
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn verbose(&self, msg: impl Display) {
        if self.level >= LogLevel::Verbose {
            debug!("{}{}", self.prefix, msg);
        }
    }

    pub fn error(&self, msg: impl Display) {
        if self.level >= LogLevel::Error {
            error!("{}{}", self.prefix, msg);
        }
    }
}

/// A live engine instance
pub trait EngineHandle: Send {
    /// Apply a directive list as one configuration transaction
    fn apply_config(&mut self, directives: &DirectiveList) -> Result<(), EngineError>;

    /// Bring the device up
    fn activate(&mut self) -> Result<(), EngineError>;

    /// Current device state in the engine's own text format
    fn query_status(&mut self) -> Result<String, EngineError>;

    /// Release the engine together with the interface it owns
    fn close(self);
}

/// Factory for engine instances on top of an interface link `L` and its
/// packet transport `T`
pub trait TunnelEngine<L, T> {
    type Handle: EngineHandle;

    fn create(
        &self,
        link: L,
        transport: T,
        bind: BindStrategy,
        logger: EngineLogger,
    ) -> Result<Self::Handle, EngineError>;
}
