//! # Command Tree
//!
//! The registration and aliasing engine behind every samosa command.
//!
//! ## Structure
//!
//! ```text
//! CommandRegistry (samosa)
//!  ├── git (g)          Group
//!  │    ├── status       Leaf
//!  │    └── backup (b)   Group
//!  ├── local (l)        Lazy   (built from .samosa/commands on first use)
//!  └── hello            Leaf
//! ```
//!
//! ## Key Types
//!
//! - [`AliasTable`] - Alias to canonical name lookup
//! - [`CommandRegistry`] - Ordered commands plus aliases, help rendering
//! - [`CommandNode`] / [`NodeKind`] - Tagged tree node: leaf, group or lazy group
//! - [`LeafCommand`] - Argument surface plus handler
//! - [`Invocation`] - What a handler receives when it runs

mod alias;
mod command;
mod registry;

pub use alias::{AliasInsert, AliasTable};
pub use command::{CommandNode, Invocation, LazyGroup, LeafCommand, NodeKind, UsageError};
pub use registry::{CommandRegistry, HelpEntry, RegistryError, ResolveError};
