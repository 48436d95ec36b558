//! Use cases - User story orchestration.
//!
//! Each module contains use cases for one stage of the content pipeline.

pub mod content;
pub mod generation;
pub mod publishing;
pub mod scheduling;
