//! # Fluent traversal API
//!
//! Every view wraps an immutable [`TraversalContext`]. Navigation methods
//! only compose queries; nothing touches the backend until a terminal
//! operation such as [`Single::entity`] or [`ReadWrite::create`] runs.
//!
//! ```text
//! inventory.tenants()                         ReadWrite<Tenant>
//!     .get("acme")                            Single<Tenant>
//!     .environments()                         ReadWrite<Environment>
//!     .get("prod")                            Single<Environment>
//!     .feedless_resources()                   ReadWrite<Resource>
//!     .all()                                  Multiple<Resource>
//!     .entities(&Pager::unlimited())          Page<Resource>
//! ```
//!
//! | View | Reads | Writes |
//! |------|-------|--------|
//! | [`Read`] | `get`, `get_all`, `all` | |
//! | [`ReadWrite`] | as `Read` | `create`, `update`, `delete` |
//! | [`ReadAssociate`] | as `Read`, `association` | `associate`, `disassociate` |
//! | [`Single`] | `entity`, `exists` | via `relationships` |
//! | [`Multiple`] | `entities` | |
//! | [`Relationships`] | `all`, `named`, `get` | `link_with`, `update`, `delete` |

mod associator;
mod context;
mod fetcher;
mod mutator;
mod relationships;

pub use associator::ReadAssociate;
pub use context::{ContextBuilder, TraversalContext};
pub use fetcher::{Multiple, Read, Single};
pub use mutator::ReadWrite;
pub use relationships::Relationships;
