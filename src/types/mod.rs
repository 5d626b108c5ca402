//! Type system module
//!
//! This module contains the value-level type system used by expressions:
//! - LogicalType / FieldType: SQL type codes and full type descriptors
//! - Value: Single nullable datum with its temporal and JSON payloads
//! - codec: Order-preserving binary encoding of values

pub mod codec;
pub mod logical_type;
pub mod value;

// Re-export main types for convenience
pub use codec::{decode_value, encode_to_vec, encode_value};
pub use logical_type::{EvalType, FieldType, LogicalType, TypeClass, TypeFlags, TypeUtils};
pub use value::{format_duration, parse_duration, Time, Value};
