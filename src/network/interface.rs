//! Virtual network interface for the tunnel engine
use std::net::{Ipv4Addr, Ipv6Addr};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors related to network interface operations
#[derive(Debug, Error)]
pub enum InterfaceError {
    #[error("Interface {0} does not exist")]
    NotFound(String),
    #[error("Failed to configure interface: {0}")]
    ConfigurationFailed(String),
}

/// An IPv4 and an IPv6 address used together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DualStack {
    pub v4: Ipv4Addr,
    pub v6: Ipv6Addr,
}

/// Addressing applied to the tunnel interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceSpec {
    /// Addresses assigned to the interface itself
    pub local: DualStack,
    /// Upstream DNS resolvers for traffic entering the tunnel
    pub resolvers: DualStack,
    /// Link MTU
    pub mtu: u16,
}

/// Control over a configured interface's link
pub trait InterfaceLink {
    /// Kernel name of the interface
    fn name(&self) -> &str;

    /// Bring the link up
    fn set_up(&self) -> Result<(), InterfaceError>;

    /// Whether no other live link refers to the same interface. Device-wide
    /// teardown is only safe for an exclusive link.
    fn is_exclusive(&self) -> bool {
        true
    }
}

/// Provider of dual-stack virtual interfaces.
///
/// The returned link handle and packet transport are owned by the tunnel
/// engine that gets created on top of them; dropping both releases the
/// interface.
pub trait VirtualInterface {
    type Link: InterfaceLink + Send;
    type Transport: Send;

    fn create_dual_stack(
        &self,
        spec: &InterfaceSpec,
    ) -> Result<(Self::Link, Self::Transport), InterfaceError>;
}

/// Interface provider for an engine that owns its own TUN device.
///
/// The userspace engine creates the device and moves packets on it, so this
/// provider only addresses the existing link; there is no separate packet
/// transport to hand over. Links handed out for a replacement session share
/// the device with the session they replace, so the device is released only
/// when the last of them is dropped.
#[derive(Debug, Clone)]
pub struct KernelInterface {
    name: String,
    holders: Arc<AtomicUsize>,
}

impl KernelInterface {
    pub fn new(name: impl Into<String>) -> Self {
        KernelInterface {
            name: name.into(),
            holders: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn lease(&self) -> KernelLink {
        self.holders.fetch_add(1, Ordering::SeqCst);
        KernelLink {
            name: self.name.clone(),
            holders: Arc::clone(&self.holders),
        }
    }
}

impl VirtualInterface for KernelInterface {
    type Link = KernelLink;
    type Transport = ();

    fn create_dual_stack(&self, spec: &InterfaceSpec) -> Result<(KernelLink, ()), InterfaceError> {
        if !link_exists(&self.name) {
            return Err(InterfaceError::NotFound(self.name.clone()));
        }

        // From here on the link is ours to clean up, even if a step fails
        let link = self.lease();
        configure_interface(&link.name, spec)?;

        info!(
            "Configured interface {} with {} / {}, MTU {}, resolvers {} / {}",
            link.name, spec.local.v4, spec.local.v6, spec.mtu, spec.resolvers.v4, spec.resolvers.v6
        );
        Ok((link, ()))
    }
}

/// Configured link; the last one dropped flushes addresses and takes the
/// link down
#[derive(Debug)]
pub struct KernelLink {
    name: String,
    holders: Arc<AtomicUsize>,
}

impl InterfaceLink for KernelLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_up(&self) -> Result<(), InterfaceError> {
        run(&["ip", "link", "set", "dev", &self.name, "up"])?;
        info!("Interface {} is up", self.name);
        Ok(())
    }

    fn is_exclusive(&self) -> bool {
        self.holders.load(Ordering::SeqCst) == 1
    }
}

impl Drop for KernelLink {
    fn drop(&mut self) {
        if self.holders.fetch_sub(1, Ordering::SeqCst) > 1 {
            debug!("Interface {} still in use", self.name);
            return;
        }
        for command in release_commands(&self.name) {
            let args: Vec<&str> = command.iter().map(String::as_str).collect();
            if let Err(e) = run(&args) {
                warn!("Releasing {}: {}", self.name, e);
            }
        }
        debug!("Released interface {}", self.name);
    }
}

/// Commands assigning addresses, MTU and resolvers. Host prefixes keep the
/// kernel from installing subnet routes for the tunnel; `replace` makes a
/// second run on an already configured link succeed.
fn configure_commands(name: &str, spec: &InterfaceSpec) -> Vec<Vec<String>> {
    let args = |a: &[&str]| a.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    vec![
        args(&["ip", "addr", "replace", format!("{}/32", spec.local.v4).as_str(), "dev", name]),
        args(&["ip", "-6", "addr", "replace", format!("{}/128", spec.local.v6).as_str(), "dev", name]),
        args(&["ip", "link", "set", "dev", name, "mtu", spec.mtu.to_string().as_str()]),
        args(&[
            "resolvectl",
            "dns",
            name,
            spec.resolvers.v4.to_string().as_str(),
            spec.resolvers.v6.to_string().as_str(),
        ]),
    ]
}

fn release_commands(name: &str) -> Vec<Vec<String>> {
    vec![
        vec!["ip".into(), "link".into(), "set".into(), "dev".into(), name.into(), "down".into()],
        vec!["ip".into(), "addr".into(), "flush".into(), "dev".into(), name.into()],
    ]
}

fn link_exists(name: &str) -> bool {
    run(&["ip", "link", "show", "dev", name]).is_ok()
}

#[cfg(target_os = "linux")]
fn configure_interface(name: &str, spec: &InterfaceSpec) -> Result<(), InterfaceError> {
    for command in configure_commands(name, spec) {
        let args: Vec<&str> = command.iter().map(String::as_str).collect();
        run(&args)?;
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn configure_interface(_name: &str, _spec: &InterfaceSpec) -> Result<(), InterfaceError> {
    Err(InterfaceError::ConfigurationFailed(
        "interface configuration is not supported on this platform".to_string(),
    ))
}

/// Run `command[0]` with the remaining arguments
fn run(command: &[&str]) -> Result<(), InterfaceError> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| InterfaceError::ConfigurationFailed("empty command".to_string()))?;
    debug!("Running {}", command.join(" "));

    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| InterfaceError::ConfigurationFailed(format!("{}: {}", program, e)))?;

    if !status.success() {
        return Err(InterfaceError::ConfigurationFailed(format!(
            "`{}` exited with {}",
            command.join(" "),
            status
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> InterfaceSpec {
        InterfaceSpec {
            local: DualStack {
                v4: Ipv4Addr::new(10, 8, 0, 1),
                v6: "fd15:53b6:dead::1".parse().unwrap(),
            },
            resolvers: DualStack {
                v4: Ipv4Addr::new(8, 8, 8, 8),
                v6: "2001:4860:4860::8888".parse().unwrap(),
            },
            mtu: 1420,
        }
    }

    #[test]
    fn configure_applies_addresses_mtu_and_resolvers() {
        let commands: Vec<String> = configure_commands("wg0", &spec())
            .iter()
            .map(|c| c.join(" "))
            .collect();

        assert_eq!(
            commands,
            vec![
                "ip addr replace 10.8.0.1/32 dev wg0",
                "ip -6 addr replace fd15:53b6:dead::1/128 dev wg0",
                "ip link set dev wg0 mtu 1420",
                "resolvectl dns wg0 8.8.8.8 2001:4860:4860::8888",
            ]
        );
    }

    #[test]
    fn release_takes_link_down_and_flushes() {
        let commands: Vec<String> = release_commands("wg0").iter().map(|c| c.join(" ")).collect();
        assert_eq!(commands, vec!["ip link set dev wg0 down", "ip addr flush dev wg0"]);
    }

    #[test]
    fn links_to_one_interface_share_ownership() {
        let provider = KernelInterface::new("netstack-test-0");
        let first = provider.lease();
        assert!(first.is_exclusive());

        let second = provider.lease();
        assert!(!first.is_exclusive());
        assert!(!second.is_exclusive());

        drop(first);
        assert!(second.is_exclusive());
        drop(second);
        assert_eq!(provider.holders.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_tool_is_a_configuration_error() {
        let err = run(&["netstack-vpn-no-such-tool", "x"]).unwrap_err();
        assert!(matches!(err, InterfaceError::ConfigurationFailed(msg) if msg.contains("no-such-tool")));
    }

    #[test]
    fn failing_tool_reports_command_line() {
        let err = run(&["false", "--flag"]).unwrap_err();
        assert!(err.to_string().contains("`false --flag` exited with"));
    }

    #[test]
    fn missing_interface_is_not_found() {
        let provider = KernelInterface::new("netstack-absent-link-0");
        let err = provider.create_dual_stack(&spec()).unwrap_err();
        assert!(matches!(err, InterfaceError::NotFound(name) if name == "netstack-absent-link-0"));
    }
}
