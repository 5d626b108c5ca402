//! Execution state shared with expression evaluation
//!
//! Expressions never own a session; they borrow the execution context that
//! carries the session settings and the current statement's warnings.

pub mod context;

pub use context::*;
