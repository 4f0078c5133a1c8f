//! rsperm-domain: core permission resolution logic
//!
//! This crate contains the engine's pure core:
//! - Data model: context sets, nodes, holders, audit entries
//! - Inheritance resolver: the graph walk producing precedence-ordered
//!   node lists
//! - Permission calculator: context filtering and first-write-wins
//!   flattening
//! - Resolution cache: version-stamped, precisely invalidated
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               rsperm-domain                 │
//! ├─────────────────────────────────────────────┤
//! │  model/      - Contexts, nodes, holders     │
//! │  resolver/   - Inheritance graph walk       │
//! │  calculator/ - First-write-wins flattening  │
//! │  cache/      - Resolved-permission cache    │
//! │  validation/ - Mutation-boundary checks     │
//! └─────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod calculator;
pub mod error;
pub mod model;
pub mod resolver;
pub mod validation;

// Re-export commonly used types at the crate root
pub use cache::{CacheKey, CachedResolution, ResolutionCache, ResolutionCacheConfig};
pub use calculator::{PermissionCalculator, ResolvedPermissions, Tristate};
pub use error::{DomainError, DomainResult};
pub use model::{ContextSet, Holder, HolderId, LogEntry, Node, NodeKind};
pub use resolver::{HolderIndex, InheritanceResolver, ResolverConfig};
