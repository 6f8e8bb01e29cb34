//! Relational store access: schema catalog, query construction, the
//! content-addressed result cache, and the cache-first connector.

pub mod cache;
pub mod connector;
pub mod query;
pub mod schema;
