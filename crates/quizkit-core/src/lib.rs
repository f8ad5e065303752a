//! quizkit-core — Quiz answering engine.
//!
//! This crate holds the gap and formula parsers, the answer model for the
//! seven question types, the session state machine and the grading logic
//! that the rest of quizkit builds on.

pub mod answer;
pub mod engine;
pub mod error;
pub mod formula;
pub mod gaps;
pub mod grading;
pub mod model;
pub mod parser;
pub mod render;
pub mod report;
pub mod session;
pub mod shuffle;
pub mod traits;
