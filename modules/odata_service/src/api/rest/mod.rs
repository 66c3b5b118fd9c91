pub mod auth;
pub mod handlers;
pub mod index;
pub mod routes;
pub mod v2;

mod reply;
