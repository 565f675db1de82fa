//! Common utilities for integration tests

pub mod test_helpers;

// Re-export commonly used items
#[allow(unused_imports)]
pub use test_helpers::{
    argmax,
    centroid_x,
    channel_domain,
    discharge_params,
    impulse_params,
    reach_domain,
    relative_error,
    total_mass,
};
