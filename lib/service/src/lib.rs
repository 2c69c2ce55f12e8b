//! Host service for forgebot.
//!
//! This crate wires the timeline scheduler and the ritual chain executor to a
//! host-supplied ceremony handler:
//!
//! - **Catalog**: the static tables of timeline triggers and ritual chains
//! - **Ceremony Bridge**: forwards invocations to the configured handler
//! - **Chain Routing**: lets timeline triggers fire whole ritual chains
//! - **Service**: the facade a host owns and drives
//! - **Config**: environment-driven service settings

pub mod bridge;
pub mod catalog;
pub mod config;
pub mod error;
pub mod routing;
pub mod service;

pub use bridge::CeremonyBridge;
pub use catalog::Catalog;
pub use config::ServiceConfig;
pub use error::{CatalogError, ServiceError};
pub use routing::{CHAIN_KEY_PREFIX, ChainRoutingInvoker};
pub use service::ForgebotService;
