//! Storage layer for the matching engine.
//!
//! Three backends, three concerns: Redis keeps short-lived presence and
//! location state, Qdrant holds capability embeddings for similarity
//! retrieval, and Postgres is the durable provider directory.

pub mod db;
pub mod directory;
pub mod models;
pub mod presence;
pub mod schema;
pub mod vector;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
