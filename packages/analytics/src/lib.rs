#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Quantile classification of regional incidence.
//!
//! Computes class breaks over the incidence values of the joined region
//! fragments, assigns each fragment to a labelled class, and summarizes the
//! result for the legend and the command line.

pub mod classify;
pub mod quantile;
pub mod ranking;

pub use classify::{break_values, classify, summarize};
pub use quantile::{compute_breaks, quantile};
pub use ranking::rank_regions;
