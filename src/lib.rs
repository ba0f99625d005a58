//! tde - a terminal tabular data editor.
//!
//! The binary wires these modules together, the library exposes them
//! for integration tests.

pub mod columns;
pub mod controller;
pub mod csv;
pub mod domain;
pub mod inputter;
pub mod model;
pub mod persist;
pub mod rows;
pub mod seed;
pub mod ui;
pub mod view;
