//! OData request → CQN translation.
//!
//! The dispatcher picks one per-verb translator; the clause translators
//! (`$orderby`, `$select`, paging) build the fragments of a `SELECT`. Payload
//! helpers convert binary elements and project request bodies onto what an
//! entity declares. Everything here is synchronous and free of shared state.

mod action;
mod context;
mod deep_filter;
mod dispatch;
mod error;
mod read;
mod write;

pub mod binary;
pub mod expr;
pub mod keys;
pub mod order_by;
pub mod pagination;
pub mod select;

pub use action::bound_action_to_cqn;
pub use binary::{decode_binaries, encode_binaries};
pub use context::TranslationContext;
pub use deep_filter::filter_payload;
pub use dispatch::{odata_to_cqn, OperationKind};
pub use error::{Error, Result};
pub use expr::filter_to_tokens;
pub use keys::{key_predicate_to_where, resolve_keys};
pub use order_by::{default_order, order_by_to_cqn};
pub use pagination::{next_skip_token, page_limit};
pub use read::read_to_cqn;
pub use select::select_to_cqn;
pub use write::{create_to_cqn, delete_to_cqn, update_to_cqn};

#[cfg(test)]
mod tests;
