//! CQN: the uniform query object handed to query executors.
//!
//! A query is a verb (`SELECT`, `INSERT`, `UPDATE`, `DELETE`) with a target
//! entity and clause fragments. Expressions are flat token lists of
//! references, values, operators and nested expressions, serialized the
//! same way CAP runtimes exchange them.

mod query;
mod token;
mod value;

pub use query::{
    Column, Delete, EntityRef, Insert, Limit, OrderBy, Query, Select, Sort, Update, COUNT_ALIAS,
};
pub use token::{conjunction, Operator, Token};
pub use value::DataValue;

#[cfg(test)]
mod tests;
