//! Single tunnel session lifecycle
//!
//! [`SessionManager`] owns the one active engine (if any). `start` builds a
//! complete new session before touching the active slot, so a failed start
//! leaves whatever was running untouched, and a successful one closes the
//! previous engine only after its replacement is up.
use crate::engine::{
    BindStrategy, EngineError, EngineHandle, EngineLogger, LogLevel, TunnelEngine,
};
use crate::network::{DualStack, InterfaceError, InterfaceLink, InterfaceSpec, VirtualInterface};
use crate::translate::translate;
use parking_lot::Mutex;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Address of the local end of the tunnel
pub const LOCAL_ADDRS: DualStack = DualStack {
    v4: Ipv4Addr::new(10, 8, 0, 1),
    v6: Ipv6Addr::new(0xfd15, 0x53b6, 0xdead, 0, 0, 0, 0, 1),
};

/// Upstream DNS resolvers
pub const RESOLVER_ADDRS: DualStack = DualStack {
    v4: Ipv4Addr::new(8, 8, 8, 8),
    v6: Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888),
};

/// Link MTU of the tunnel interface
pub const TUNNEL_MTU: u16 = 1420;

/// Prefix on engine log lines
pub const ENGINE_LOG_PREFIX: &str = "WG: ";

/// Status text reported while no session is active
pub const STOPPED: &str = "stopped";

/// Interface addressing used for every session
pub fn interface_policy() -> InterfaceSpec {
    InterfaceSpec {
        local: LOCAL_ADDRS,
        resolvers: RESOLVER_ADDRS,
        mtu: TUNNEL_MTU,
    }
}

/// Failure creating the interface or the engine on top of it
#[derive(Debug, Error)]
pub enum CreateError {
    #[error(transparent)]
    Interface(#[from] InterfaceError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Why a session could not be started
#[derive(Debug, Error)]
pub enum StartError {
    #[error("configuration is empty")]
    EmptyConfig,
    #[error("failed to create network interface: {0}")]
    InterfaceCreationFailed(#[source] CreateError),
    #[error("invalid WireGuard configuration: {0}")]
    ConfigApplyFailed(#[source] EngineError),
    #[error("failed to start network interface: {0}")]
    ActivationFailed(#[source] EngineError),
}

impl StartError {
    /// What the user should look at
    pub fn hint(&self) -> &'static str {
        match self {
            StartError::EmptyConfig => "Provide a WireGuard configuration",
            StartError::InterfaceCreationFailed(_) => "Check VPN permission",
            StartError::ConfigApplyFailed(_) => "Check key format",
            StartError::ActivationFailed(_) => "Port/network conflict",
        }
    }
}

/// Result of a status query
#[derive(Debug)]
pub enum SessionStatus {
    /// No session is active
    Stopped,
    /// Engine status text, verbatim
    Running(String),
    /// The engine failed to answer
    QueryFailed(EngineError),
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Stopped => f.write_str(STOPPED),
            SessionStatus::Running(text) => f.write_str(text),
            SessionStatus::QueryFailed(e) => write!(f, "error: {}", e),
        }
    }
}

struct Session<H> {
    engine: H,
    interface: String,
}

/// Owner of the single active tunnel session
pub struct SessionManager<I, E>
where
    I: VirtualInterface,
    E: TunnelEngine<I::Link, I::Transport>,
{
    interfaces: I,
    engine: E,
    active: Mutex<Option<Session<E::Handle>>>,
}

impl<I, E> SessionManager<I, E>
where
    I: VirtualInterface,
    E: TunnelEngine<I::Link, I::Transport>,
{
    pub fn new(interfaces: I, engine: E) -> Self {
        SessionManager {
            interfaces,
            engine,
            active: Mutex::new(None),
        }
    }

    /// Start a session from WireGuard config text, replacing any active one.
    ///
    /// `is_exit_node` is recorded in the logs only.
    pub fn start(&self, config: &str, is_exit_node: bool) -> Result<(), StartError> {
        if config.trim().is_empty() {
            warn!("Refusing to start: configuration is empty");
            return Err(StartError::EmptyConfig);
        }

        info!(
            "Starting tunnel session ({} config bytes, exit node: {})",
            config.len(),
            is_exit_node
        );

        let mut active = self.active.lock();
        let session = self.build(config)?;
        let interface = session.interface.clone();

        if let Some(previous) = active.replace(session) {
            info!("Replacing session on {}", previous.interface);
            previous.engine.close();
        }

        info!("Tunnel session started on {} (exit node: {})", interface, is_exit_node);
        Ok(())
    }

    /// Create, configure and activate a new engine. Everything acquired here
    /// is released again on failure.
    fn build(&self, config: &str) -> Result<Session<E::Handle>, StartError> {
        let (link, transport) = self
            .interfaces
            .create_dual_stack(&interface_policy())
            .map_err(|e| {
                error!("Interface creation failed: {}", e);
                StartError::InterfaceCreationFailed(e.into())
            })?;
        let interface = link.name().to_string();

        let logger = EngineLogger::new(LogLevel::Verbose, ENGINE_LOG_PREFIX);
        let mut engine = self
            .engine
            .create(link, transport, BindStrategy::default(), logger)
            .map_err(|e| {
                error!("Engine creation on {} failed: {}", interface, e);
                StartError::InterfaceCreationFailed(e.into())
            })?;

        let directives = translate(config);
        debug!("UAPI config:\n{}", directives.redacted());

        if let Err(e) = engine.apply_config(&directives) {
            error!("Config apply failed: {}", e);
            engine.close();
            return Err(StartError::ConfigApplyFailed(e));
        }

        if let Err(e) = engine.activate() {
            error!("Device up failed: {}", e);
            engine.close();
            return Err(StartError::ActivationFailed(e));
        }

        Ok(Session { engine, interface })
    }

    /// Stop the active session. Does nothing when none is active.
    pub fn stop(&self) {
        if let Some(session) = self.active.lock().take() {
            info!("Stopping tunnel session on {}", session.interface);
            session.engine.close();
        } else {
            debug!("Stop requested with no active session");
        }
    }

    pub fn status(&self) -> SessionStatus {
        match self.active.lock().as_mut() {
            None => SessionStatus::Stopped,
            Some(session) => match session.engine.query_status() {
                Ok(text) => SessionStatus::Running(text),
                Err(e) => {
                    warn!("Status query on {} failed: {}", session.interface, e);
                    SessionStatus::QueryFailed(e)
                }
            },
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }
}

impl<I, E> Drop for SessionManager<I, E>
where
    I: VirtualInterface,
    E: TunnelEngine<I::Link, I::Transport>,
{
    fn drop(&mut self) {
        if let Some(session) = self.active.get_mut().take() {
            session.engine.close();
        }
    }
}
