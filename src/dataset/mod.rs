//! Dataset assembly: the columnar table type and the preprocessing steps
//! (sampling, balancing, scaling, feature reduction) that turn raw query
//! results into model-ready feature/label pairs.

pub mod assemble;
pub mod balancing;
pub mod features;
pub mod sampling;
pub mod scaling;
pub mod table;
