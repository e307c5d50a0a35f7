//! Katara client core: configuration, local state and host capabilities

pub mod capability;
pub mod config;
pub mod error;
pub mod geo;
pub mod persist;
pub mod route;
pub mod state_dir;

pub use capability::{
    CapabilityBridge, CapabilityOutcome, CapabilitySlot, HostShell, ImageAttachment,
    PendingCapability,
};
pub use config::ClientConfig;
pub use error::{CoreError, CoreResult};
pub use geo::{Coordinates, GeocodeCache};
pub use route::Route;
pub use state_dir::StateDir;
