//! Vector, quaternion and dense-matrix helpers the state estimator is built on.
//!
//! Storage comes from nalgebra; everything here keeps IEEE semantics, a NaN
//! input yields a NaN output and nothing panics.

pub mod matrix;
pub mod quaternion;
pub mod vector;

pub use matrix::{MatrixError, fill_diagonal, invert, scan_nan, valid_indices};
