//! Network handling functionality
pub mod interface;

pub use interface::{
    DualStack, InterfaceError, InterfaceLink, InterfaceSpec, KernelInterface, KernelLink,
    VirtualInterface,
};
