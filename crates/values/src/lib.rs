//! Value formation: turning clusters of experiences into stored values.
//!
//! A value is a short statement an agent proposes for a cluster. It is
//! accepted only when its embedding lies as close to the cluster centroid
//! as the members themselves do.

pub mod store;
pub mod types;
pub mod validator;

pub use store::{VALUES_COLLECTION, ValueStore};
pub use types::{AxisCluster, Experience, ValidationProvenance, ValidationResult, Value};
pub use validator::{evaluate_candidate, evaluate_distances};
