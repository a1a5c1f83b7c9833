//! Retrieval-augmented context for judging: an in-memory vector store, the
//! owner-filtered retrieval query and startup seeding.

mod retrieval;
mod seeder;
pub mod vector_store;

pub use retrieval::{RetrievalResult, RetrievalService};
pub use seeder::{SeedReport, VectorSeeder};
pub use vector_store::VectorStore;
