//! Analysis of Monte Carlo sampled protonation and conformation microstates.
//!
//! A [`MicrostateStore`] is parsed once from a microstate file and then
//! analyzed with pure functions: sorting and energy statistics ([`stats`]),
//! count-weighted sampling ([`sampling`]), partitions ([`grouping`]),
//! occupancies and charges ([`occupancy`]) and group comparisons
//! ([`comparison`]). Conformer ids and charges come from an explicit
//! [`ConformerRegistry`].

pub mod analysis;
pub mod comparison;
pub mod config;
pub mod conformer;
pub mod error;
pub mod grouping;
pub mod manager;
pub mod model;
pub mod occupancy;
pub mod sampling;
pub mod stats;
pub mod store;

pub use conformer::{Conformer, ConformerRegistry};
pub use error::{Error, Result};
pub use model::Microstate;
pub use store::MicrostateStore;
