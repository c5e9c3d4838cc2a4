//! Database access for lyra-gen
//!
//! Query functions are generic over the sqlx executor so the same code runs
//! against the pool or inside a transaction (`&mut *tx`).

pub mod settings;
pub mod songs;
pub mod variants;
