//! Core of **skills-rs**: turns Rust types and functions into JSON Schema
//! function definitions for LLM function calling, decodes the model's JSON
//! arguments back into typed values, and dispatches calls by name.
#![deny(unsafe_code)]

extern crate self as skills_core;

pub mod decode;
pub mod describe;
pub mod descriptor;
pub mod docs;
pub mod error;
pub mod function;
pub mod models;
pub mod skill;

pub use decode::{decode, encode};
pub use describe::{Describe, Introspector, describe};
pub use descriptor::{
    EnumType, ObjectType, PrimitiveKind, Property, TypeDescriptor, Variant, build_schema,
};
pub use docs::ParsedDocs;
pub use error::{
    DecodeError, DecodeErrorKind, ErrorKind, PathSegment, SerializationError, SkillError,
    UnsupportedKind, UnsupportedTypeError,
};
pub use function::{
    Arguments, FunctionBuilder, FunctionDescriptor, FunctionOptions, FunctionRegistration,
    ParameterSpec, registered, registrations,
};
pub use models::{CallId, FunctionCall, InvocationOutcome};
pub use skill::{FunctionSet, Skill, TogglableSkill, UnionSkill};

/// Support code for the derive and attribute macros. Not public API.
#[doc(hidden)]
pub mod __private {
    use serde::Serialize;
    use serde_json::Value;

    use crate::error::{UnsupportedKind, UnsupportedTypeError};

    pub use inventory;
    pub use serde_json;

    /// Encode a declared default value, blaming `type_name` on failure.
    pub fn default_value<T: Serialize>(
        value: T,
        type_name: &'static str,
        field: &str,
    ) -> Result<Value, UnsupportedTypeError> {
        serde_json::to_value(value).map_err(|e| {
            UnsupportedTypeError::new(type_name, UnsupportedKind::InvalidDefault(e.to_string()))
                .for_parameter(field)
        })
    }

    /// The serde representation of an enum member.
    pub fn enum_value<T: Serialize>(
        member: &T,
        type_name: &'static str,
    ) -> Result<Value, UnsupportedTypeError> {
        serde_json::to_value(member).map_err(|e| {
            UnsupportedTypeError::new(type_name, UnsupportedKind::InvalidDefault(e.to_string()))
        })
    }
}
