//! Problem+JSON responses and the catalog of error codes the service emits.

pub mod catalog;
mod problem;

pub use catalog::ErrDef;
pub use problem::{
    bad_request, internal_error, not_found, Problem, ProblemResponse, APPLICATION_PROBLEM_JSON,
};
