//! Inheritance resolution: the graph walk that flattens a holder's
//! inheritance closure into a precedence-ordered node list.

mod config;
mod inheritance;
mod traits;

#[cfg(test)]
mod tests;

pub use config::ResolverConfig;
pub use inheritance::{InheritanceList, InheritanceResolver, ResolvedNode};
pub use traits::HolderIndex;
