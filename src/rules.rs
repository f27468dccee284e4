//! Built-in construction tables.
//!
//! - `np.rs`: the default noun-phrase grammar used for chunk reduction.

#[path = "rules/np.rs"]
pub mod np;
