//! Method identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one method of one service interface.
///
/// Overloads share a name but differ in `parameter_types`, so the full
/// signature participates in equality and in cache fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodId {
    pub interface: String,
    pub name: String,
    pub parameter_types: Vec<String>,
}

impl MethodId {
    pub fn new(interface: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            name: name.into(),
            parameter_types: Vec::new(),
        }
    }

    /// Add one parameter type to the signature
    #[must_use]
    pub fn param(mut self, type_name: impl Into<String>) -> Self {
        self.parameter_types.push(type_name.into());
        self
    }

    /// Number of declared parameters
    pub fn arity(&self) -> usize {
        self.parameter_types.len()
    }

    /// Method name followed by its parameter list, e.g. `add(i32, i32)`
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.parameter_types.join(", "))
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.interface, self.signature())
    }
}
