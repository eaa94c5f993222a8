//! Core data types for the delay scoring pipeline
//!
//! Contains flight record and decision data structures.

pub mod decision;
pub mod flight;
