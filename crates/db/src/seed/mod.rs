//! SQL seed scripts.
//!
//! Seeds are `.sql` files executed in filename order on every run. Nothing
//! records that a seed ran, so seed SQL must be idempotent on its own, e.g.
//! `INSERT ... ON CONFLICT DO NOTHING`.

pub mod definition;
pub mod seeder;

pub use definition::{SeedDefinition, load_seeds, split_statements};
pub use seeder::{SeedReport, Seeder};
