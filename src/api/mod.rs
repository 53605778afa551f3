//! JSON procedures grouped as `todo.*`, `auth.*` and `admin.*`.

pub mod admin;
pub mod auth;
pub mod todo;
