//! Service layer for the preference store.
//! - `preferences`: create-or-replace user preference documents, lookup and containment search.
//! - `selections`: raw checkbox submissions per challenge.
//! - Store handles are injected; SeaORM and in-memory implementations are provided.

pub mod errors;
pub mod context;
pub mod metrics;
pub mod preferences;
pub mod selections;
pub mod runtime;
#[cfg(test)]
pub mod test_support;
