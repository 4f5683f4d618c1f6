//! Integer-coded control surface for foreign callers
//!
//! Mirrors [`SessionManager`] with plain return values: start yields `0` or a
//! negative code naming the failed stage, status always yields text.
use crate::engine::TunnelEngine;
use crate::network::VirtualInterface;
use crate::session::{SessionManager, StartError};
use tracing::error;

pub const SUCCESS: i64 = 0;
pub const INTERFACE_CREATION_FAILED: i64 = -1;
pub const CONFIG_APPLY_FAILED: i64 = -2;
pub const ACTIVATION_FAILED: i64 = -3;
pub const EMPTY_CONFIG: i64 = -4;

/// Code reported for a start failure
pub fn error_code(err: &StartError) -> i64 {
    match err {
        StartError::EmptyConfig => EMPTY_CONFIG,
        StartError::InterfaceCreationFailed(_) => INTERFACE_CREATION_FAILED,
        StartError::ConfigApplyFailed(_) => CONFIG_APPLY_FAILED,
        StartError::ActivationFailed(_) => ACTIVATION_FAILED,
    }
}

pub fn start_session<I, E>(manager: &SessionManager<I, E>, config: &str, is_exit_node: bool) -> i64
where
    I: VirtualInterface,
    E: TunnelEngine<I::Link, I::Transport>,
{
    match manager.start(config, is_exit_node) {
        Ok(()) => SUCCESS,
        Err(e) => {
            let code = error_code(&e);
            error!("ERROR CODE {}: {} - {}", code, e, e.hint());
            code
        }
    }
}

pub fn stop_session<I, E>(manager: &SessionManager<I, E>)
where
    I: VirtualInterface,
    E: TunnelEngine<I::Link, I::Transport>,
{
    manager.stop();
}

pub fn get_session_status<I, E>(manager: &SessionManager<I, E>) -> String
where
    I: VirtualInterface,
    E: TunnelEngine<I::Link, I::Transport>,
{
    manager.status().to_string()
}
