//! The call model shared by the lookup engine and its collaborators.
//!
//! ## Organization
//!
//! - **`value`**: Argument values with structural equality, ordering for
//!   range predicates, and the canonical text form used for fingerprints
//! - **`method`**: Method identity, distinguishing overloads by signature
//! - **`invocation`**: A single intercepted call and its coalescing key

pub mod invocation;
pub mod method;
pub mod value;

pub use invocation::{CallKey, Invocation};
pub use method::MethodId;
pub use value::Value;
