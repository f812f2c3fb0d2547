//! Error types for the skills-rs library
//!
//! Build-time failures (a type that cannot be described) abort the whole
//! registration. Call-time failures abort a single invocation and leave the
//! registry untouched. Every variant maps to an [`ErrorKind`] so a caller can
//! format an error-shaped function result for the model.

use std::{borrow::Cow, fmt};

use serde_json::Value;

/// Coarse classification of a [`SkillError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedType,
    Decode,
    InvalidJson,
    BrokenSchema,
    FunctionNotFound,
    DuplicateFunctionName,
    Serialization,
}

/// Errors that can occur while describing, registering or calling functions
#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    #[error(transparent)]
    UnsupportedType(#[from] UnsupportedTypeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Function arguments are not valid JSON: {source}")]
    InvalidJson {
        arguments: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Arguments {arguments} do not match the function schema: {reason}")]
    BrokenSchema { arguments: Value, reason: String },

    #[error("Function '{name}' not found")]
    FunctionNotFound { name: Cow<'static, str> },

    #[error("Function '{name}' is already registered")]
    DuplicateFunctionName { name: String },

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

impl SkillError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SkillError::UnsupportedType(_) => ErrorKind::UnsupportedType,
            SkillError::Decode(_) => ErrorKind::Decode,
            SkillError::InvalidJson { .. } => ErrorKind::InvalidJson,
            SkillError::BrokenSchema { .. } => ErrorKind::BrokenSchema,
            SkillError::FunctionNotFound { .. } => ErrorKind::FunctionNotFound,
            SkillError::DuplicateFunctionName { .. } => ErrorKind::DuplicateFunctionName,
            SkillError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    pub(crate) fn not_found(name: impl Into<String>) -> Self {
        SkillError::FunctionNotFound {
            name: Cow::Owned(name.into()),
        }
    }

    pub(crate) fn duplicate(name: impl Into<String>) -> Self {
        SkillError::DuplicateFunctionName { name: name.into() }
    }
}

// ============================================================================
// UNSUPPORTED TYPES
// ============================================================================

/// Why a type could not be turned into a [`TypeDescriptor`](crate::TypeDescriptor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsupportedKind {
    /// The type carries no declared structure (e.g. `serde_json::Value`).
    Untyped,
    /// The type refers to itself, directly or through other types.
    RecursiveType,
    /// Two properties or parameters share a name.
    DuplicateProperty(String),
    /// Two enum members share a name.
    DuplicateEnumMember(String),
    /// A record type was expected but the type is not described as an object.
    NotAnObject,
    /// A default value could not be converted to JSON.
    InvalidDefault(String),
}

impl fmt::Display for UnsupportedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsupportedKind::Untyped => f.write_str("the type has no declared structure"),
            UnsupportedKind::RecursiveType => f.write_str("recursive types cannot be described"),
            UnsupportedKind::DuplicateProperty(name) => write!(f, "duplicate property `{name}`"),
            UnsupportedKind::DuplicateEnumMember(name) => {
                write!(f, "duplicate enum member `{name}`")
            }
            UnsupportedKind::NotAnObject => f.write_str("expected a record type"),
            UnsupportedKind::InvalidDefault(reason) => write!(f, "invalid default value: {reason}"),
        }
    }
}

/// A declared type has no JSON Schema mapping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct UnsupportedTypeError {
    pub type_name: Cow<'static, str>,
    pub parameter: Option<String>,
    pub kind: UnsupportedKind,
}

impl UnsupportedTypeError {
    pub fn new(type_name: impl Into<Cow<'static, str>>, kind: UnsupportedKind) -> Self {
        Self {
            type_name: type_name.into(),
            parameter: None,
            kind,
        }
    }

    /// Attach the parameter whose type failed. The innermost parameter wins.
    pub fn for_parameter(mut self, parameter: impl Into<String>) -> Self {
        if self.parameter.is_none() {
            self.parameter = Some(parameter.into());
        }
        self
    }
}

impl fmt::Display for UnsupportedTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cannot describe type `{}`", self.type_name)?;
        if let Some(parameter) = &self.parameter {
            write!(f, " of parameter `{parameter}`")?;
        }
        write!(f, ": {}", self.kind)
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// One step into a JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// What went wrong while decoding a raw JSON value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    MissingField {
        field: String,
    },
    TypeMismatch {
        expected: String,
        found: &'static str,
    },
    UnknownEnumMember {
        value: String,
        members: Vec<String>,
    },
    NoMatchingAlternative {
        attempted: Vec<String>,
    },
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::MissingField { field } => {
                write!(f, "missing required field `{field}`")
            }
            DecodeErrorKind::TypeMismatch { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            DecodeErrorKind::UnknownEnumMember { value, members } => {
                write!(f, "`{value}` is not one of [{}]", members.join(", "))
            }
            DecodeErrorKind::NoMatchingAlternative { attempted } => {
                write!(f, "value matches none of [{}]", attempted.join(", "))
            }
        }
    }
}

/// A raw JSON value does not fit its [`TypeDescriptor`](crate::TypeDescriptor).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at {}", render_path(.path))]
pub struct DecodeError {
    pub path: Vec<PathSegment>,
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind) -> Self {
        Self {
            path: Vec::new(),
            kind,
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::new(DecodeErrorKind::MissingField {
            field: field.into(),
        })
    }

    pub fn type_mismatch(expected: impl Into<String>, found: &Value) -> Self {
        Self::new(DecodeErrorKind::TypeMismatch {
            expected: expected.into(),
            found: json_kind(found),
        })
    }

    /// Prefix the error location with an object field.
    pub fn at_field(mut self, field: impl Into<String>) -> Self {
        self.path.insert(0, PathSegment::Field(field.into()));
        self
    }

    /// Prefix the error location with an array index.
    pub fn at_index(mut self, index: usize) -> Self {
        self.path.insert(0, PathSegment::Index(index));
        self
    }

    pub fn path_string(&self) -> String {
        render_path(&self.path)
    }
}

fn render_path(path: &[PathSegment]) -> String {
    let mut out = String::from("$");
    for segment in path {
        match segment {
            PathSegment::Field(name) => {
                out.push('.');
                out.push_str(name);
            }
            PathSegment::Index(index) => {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            }
        }
    }
    out
}

/// The JSON kind of a value, as used in error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// RETURN VALUES
// ============================================================================

/// The return value of a function breaks its serialize contract.
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("The return value of '{function}' is not JSON-serializable: {source}")]
    NotSerializable {
        function: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "The return value of '{function}' is {found}, not a string; set serialize = true to encode it as JSON"
    )]
    NotAString { function: String, found: &'static str },
}
