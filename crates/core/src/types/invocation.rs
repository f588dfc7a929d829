//! A single intercepted call.

use super::{MethodId, Value};
use std::sync::Arc;

/// The method being called and the arguments it was called with.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub method: Arc<MethodId>,
    pub args: Vec<Value>,
}

/// Identity of a call for in-process coalescing: two invocations with the
/// same key are the same request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallKey {
    pub method: Arc<MethodId>,
    pub args: Vec<Value>,
}

impl Invocation {
    pub fn new(method: impl Into<Arc<MethodId>>, args: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }

    pub fn key(&self) -> CallKey {
        CallKey {
            method: Arc::clone(&self.method),
            args: self.args.clone(),
        }
    }
}
