//! rsperm-engine: engine orchestration
//!
//! Ties the domain core to its collaborators: the resident holder
//! registry, per-holder mutation serialization, the
//! load -> mutate -> save -> invalidate -> publish pipeline, incoming-message
//! handling, the periodic resync backstop, configuration and logging.

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod registry;

pub use config::EngineConfig;
pub use engine::PermissionEngine;
pub use error::{EngineError, EngineResult};
pub use registry::ResidentRegistry;
