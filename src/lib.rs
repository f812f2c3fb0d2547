//! **skills-rs**: expose plain Rust functions to an LLM.
//!
//! Parameter types describe themselves as JSON Schema through [`Describe`],
//! functions are declared with [`function`] or [`FunctionDescriptor::builder`],
//! and a [`Skill`] dispatches the model's calls by name.
//!
//! ```ignore
//! use skills_rs::prelude::*;
//!
//! /// Add two integers.
//! #[function]
//! fn add(a: i64, b: i64) -> i64 {
//!     a + b
//! }
//!
//! let skill = Skill::collect()?;
//! let outcome = skill.run_function(&FunctionCall::new("add", r#"{"a": 1, "b": 2}"#))?;
//! assert_eq!(outcome.content.as_deref(), Some("3"));
//! ```

extern crate self as skills_rs;

pub use skills_core::*;
pub use skills_macros::{Describe, function};

pub mod prelude;
