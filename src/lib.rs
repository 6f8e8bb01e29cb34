//! refpredict - Labelled dataset assembly for refactoring prediction
//!
//! Prepares labelled training data for classifiers that predict whether a
//! code refactoring occurred: metric rows are pulled from a relational
//! store of mined refactoring history, merged into positive (refactored)
//! and negative (stable) examples, and conditioned for a learning
//! algorithm.
//!
//! # Architecture
//!
//! ```text
//! Descriptor → Query Builder → Cache Connector → Assembler → (x, y, ids, scaler)
//!     ↓             ↓               ↓                ↓
//!  level ×      schema        sha1-keyed        merge, sample,
//!  threshold    catalog       bincode files     balance, scale
//! ```
//!
//! Every query string is deterministic down to the byte, because the
//! result cache keys on the exact string. The assembler is seeded, so a
//! whole batch run is reproducible from its configuration file.

pub mod config;
pub mod dataset;
pub mod db;
pub mod refactoring;
pub mod types;

// Re-export the surface a batch driver needs
pub use config::{Config, DbConfig};
pub use dataset::assemble::{
    assemble_labelled_instances, reduce_features, retrieve_labelled_instances, LabelledInstances,
};
pub use dataset::balancing::BalanceStrategy;
pub use dataset::features::{perform_feature_reduction, Estimator, LinearRegressor};
pub use dataset::scaling::MinMaxScaler;
pub use dataset::table::{Column, DataTable};
pub use db::cache::QueryCache;
pub use db::connector::{CancelToken, Connector, Interrupted, MySqlStore, Store};
pub use refactoring::{build_refactorings, Refactoring};
pub use types::{FileType, Level};
