//! Convenient re-exports for common usage patterns.
//!
//! ```rust
//! use skills_rs::prelude::*;
//! ```

// Registries
pub use crate::{FunctionSet, Skill, TogglableSkill, UnionSkill};

// Essential types
pub use crate::{
    Arguments, CallId, Describe, FunctionCall, FunctionDescriptor, FunctionOptions,
    InvocationOutcome, SkillError, TypeDescriptor,
};

// Macros
pub use crate::function;

// Commonly used external types
pub use serde_json::{Value, json};

// Re-export commonly needed traits for doc examples
pub use serde::{Deserialize, Serialize};
