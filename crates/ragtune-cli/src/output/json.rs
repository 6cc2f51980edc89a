//! JSON output formatting.

use serde::Serialize;
use serde_json::{Value, json};

/// Trait for types that can be serialized to JSON output.
pub trait JsonOutput: Send + Sync {
    fn to_json(&self) -> Value;
}

impl<T: Serialize + Send + Sync> JsonOutput for T {
    fn to_json(&self) -> Value {
        json!(self)
    }
}
