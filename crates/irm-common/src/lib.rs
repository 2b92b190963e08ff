//! IRM Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the IRM platform.
//!
//! # Overview
//!
//! This crate provides common functionality used across all IRM workspace
//! members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Attribute Values**: The tagged scalar value model used by the change
//!   tracker (`value`)
//! - **JSON-Safe Serialization**: Lossless conversion of attribute values
//!   into JSON column payloads (`jsonsafe`)
//! - **Logging**: Centralized tracing configuration
//!
//! # Example
//!
//! ```
//! use irm_common::value::AttrValue;
//! use irm_common::jsonsafe::to_json_safe;
//!
//! let value = AttrValue::Text("hello".to_string());
//! let json = to_json_safe(&value).unwrap();
//! assert_eq!(json, serde_json::json!("hello"));
//! ```

pub mod error;
pub mod jsonsafe;
pub mod logging;
pub mod value;

// Re-export commonly used types
pub use error::{IrmError, Result};
pub use value::{AttrKind, AttrMap, AttrValue};
