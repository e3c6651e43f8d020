//! Utility functions and types

pub mod frame;
