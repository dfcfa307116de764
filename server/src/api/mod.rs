//! HTTP ingestion server and routes

pub mod routes;
mod server;

pub use server::{Collaborators, IngestServer, ServerState};
