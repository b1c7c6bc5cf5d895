//! A hierarchical, scope-aware option tree.
//!
//! Nodes form a tree rooted at a single global node. Each node owns a set of
//! locally-overridden, string-keyed, dynamically-typed values; anything not
//! overridden is inherited live from its ancestors, falling through to the
//! defaults declared by an external [`DefinitionCatalog`]. Writes on an
//! ancestor fan out as synchronous change notifications to every descendant
//! that does not shadow the written option, and nodes can be re-parented at
//! runtime (with cycle rejection), re-evaluating whatever the move made
//! visible.
//!
//! ```
//! use optree::{OptionDefinition, OptionKey, OptionNode, StaticCatalog};
//! use std::sync::Arc;
//!
//! const TAB_SIZE: OptionKey<i64> = OptionKey::new("tab_size");
//!
//! let catalog = Arc::new(
//!     StaticCatalog::new().register(OptionDefinition::new("tab_size", 4i64)),
//! );
//! let global = OptionNode::global(catalog);
//! let view = global.derive(None);
//!
//! assert_eq!(view.get_by(&TAB_SIZE).unwrap(), 4);
//! global.set_by(&TAB_SIZE, 8).unwrap();
//! assert_eq!(view.get_by(&TAB_SIZE).unwrap(), 8);
//! ```

pub mod core;
pub mod error;
pub mod models;

pub use crate::core::catalog::{DefinitionCatalog, OptionDefinition, StaticCatalog};
pub use crate::core::events::{SubscriberSet, SubscriptionId};
pub use crate::core::node::OptionNode;
pub use crate::error::{OptionsError, OptionsResult};
pub use crate::models::{OptionChanged, OptionKey, Scope, Value};
