//! API route handlers

pub mod health;
pub mod remote_write;
