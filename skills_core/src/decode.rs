//! Decoding raw JSON against a [`TypeDescriptor`].
//!
//! Decoding validates the raw value and normalises it: enum member names are
//! replaced by their underlying values and absent optional properties are
//! filled with their defaults. The result can then be handed to serde.
//!
//! [`TypeDescriptor::encode`] goes the other way, from the serde form of a
//! value back to the JSON a model would send for it.

use serde_json::{Map, Value};

use crate::{
    descriptor::{ObjectType, TypeDescriptor},
    error::{DecodeError, DecodeErrorKind, json_kind},
};

impl TypeDescriptor {
    pub fn decode(&self, raw: &Value) -> Result<Value, DecodeError> {
        match self {
            TypeDescriptor::Primitive(kind) => {
                if kind.accepts(raw) {
                    Ok(raw.clone())
                } else {
                    Err(DecodeError::type_mismatch(kind.json_type(), raw))
                }
            }
            TypeDescriptor::Null => match raw {
                Value::Null => Ok(Value::Null),
                other => Err(DecodeError::type_mismatch("null", other)),
            },
            TypeDescriptor::Enum(e) => {
                let Value::String(member) = raw else {
                    return Err(DecodeError::type_mismatch(
                        format!("{} member name", e.name),
                        raw,
                    ));
                };
                e.value_of(member).cloned().ok_or_else(|| {
                    DecodeError::new(DecodeErrorKind::UnknownEnumMember {
                        value: member.clone(),
                        members: e.member_names().map(str::to_owned).collect(),
                    })
                })
            }
            TypeDescriptor::Array(element) => {
                let Value::Array(items) = raw else {
                    return Err(DecodeError::type_mismatch("array", raw));
                };
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| element.decode(item).map_err(|e| e.at_index(i)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            TypeDescriptor::Tuple(types) => {
                let Value::Array(items) = raw else {
                    return Err(DecodeError::type_mismatch("array", raw));
                };
                if items.len() != types.len() {
                    return Err(DecodeError::new(DecodeErrorKind::TypeMismatch {
                        expected: format!("array of {} items", types.len()),
                        found: "array of a different length",
                    }));
                }
                types
                    .iter()
                    .zip(items)
                    .enumerate()
                    .map(|(i, (ty, item))| ty.decode(item).map_err(|e| e.at_index(i)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            TypeDescriptor::Map(values) => {
                let Value::Object(entries) = raw else {
                    return Err(DecodeError::type_mismatch("object", raw));
                };
                entries
                    .iter()
                    .map(|(key, value)| {
                        values
                            .decode(value)
                            .map(|decoded| (key.clone(), decoded))
                            .map_err(|e| e.at_field(key.as_str()))
                    })
                    .collect::<Result<Map<_, _>, _>>()
                    .map(Value::Object)
            }
            TypeDescriptor::Object(object) => object.decode(raw),
            TypeDescriptor::Union(alternatives) => {
                // First match wins, in declaration order.
                for alternative in alternatives {
                    if let Ok(decoded) = alternative.decode(raw) {
                        return Ok(decoded);
                    }
                }
                Err(DecodeError::new(DecodeErrorKind::NoMatchingAlternative {
                    attempted: alternatives.iter().map(TypeDescriptor::label).collect(),
                }))
            }
            TypeDescriptor::Variants(variants) => {
                for variant in variants {
                    if let Ok(decoded) = variant.ty.decode(raw) {
                        let mut tagged = Map::new();
                        tagged.insert(variant.name.clone(), decoded);
                        return Ok(Value::Object(tagged));
                    }
                }
                Err(DecodeError::new(DecodeErrorKind::NoMatchingAlternative {
                    attempted: variants.iter().map(|v| v.name.clone()).collect(),
                }))
            }
            TypeDescriptor::Optional(inner) => match raw {
                Value::Null => Ok(Value::Null),
                other => inner.decode(other),
            },
        }
    }

    /// Turn the serde form of a value into the JSON a model would send,
    /// so that `decode(encode(v)) == v` for every unambiguous `v`.
    pub fn encode(&self, value: &Value) -> Result<Value, DecodeError> {
        match self {
            TypeDescriptor::Primitive(_) | TypeDescriptor::Null => self.decode(value),
            TypeDescriptor::Enum(e) => e
                .member_of(value)
                .map(|name| Value::String(name.to_owned()))
                .ok_or_else(|| {
                    DecodeError::new(DecodeErrorKind::UnknownEnumMember {
                        value: value.to_string(),
                        members: e.member_names().map(str::to_owned).collect(),
                    })
                }),
            TypeDescriptor::Array(element) => {
                let Value::Array(items) = value else {
                    return Err(DecodeError::type_mismatch("array", value));
                };
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| element.encode(item).map_err(|e| e.at_index(i)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            TypeDescriptor::Tuple(types) => {
                let Value::Array(items) = value else {
                    return Err(DecodeError::type_mismatch("array", value));
                };
                if items.len() != types.len() {
                    return Err(DecodeError::new(DecodeErrorKind::TypeMismatch {
                        expected: format!("array of {} items", types.len()),
                        found: "array of a different length",
                    }));
                }
                types
                    .iter()
                    .zip(items)
                    .enumerate()
                    .map(|(i, (ty, item))| ty.encode(item).map_err(|e| e.at_index(i)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            TypeDescriptor::Map(values) => {
                let Value::Object(entries) = value else {
                    return Err(DecodeError::type_mismatch("object", value));
                };
                entries
                    .iter()
                    .map(|(key, v)| {
                        values
                            .encode(v)
                            .map(|encoded| (key.clone(), encoded))
                            .map_err(|e| e.at_field(key.as_str()))
                    })
                    .collect::<Result<Map<_, _>, _>>()
                    .map(Value::Object)
            }
            TypeDescriptor::Object(object) => object.encode(value),
            TypeDescriptor::Union(alternatives) => alternatives
                .iter()
                .find_map(|alternative| alternative.encode(value).ok())
                .ok_or_else(|| {
                    DecodeError::new(DecodeErrorKind::NoMatchingAlternative {
                        attempted: alternatives.iter().map(TypeDescriptor::label).collect(),
                    })
                }),
            TypeDescriptor::Variants(variants) => {
                let tagged = match value {
                    Value::Object(map) if map.len() == 1 => map.iter().next(),
                    _ => None,
                };
                let Some((tag, inner)) = tagged else {
                    return Err(DecodeError::new(DecodeErrorKind::TypeMismatch {
                        expected: "object with a single variant key".into(),
                        found: json_kind(value),
                    }));
                };
                match variants.iter().find(|v| v.name == *tag) {
                    Some(variant) => variant
                        .ty
                        .encode(inner)
                        .map_err(|e| e.at_field(tag.as_str())),
                    None => Err(DecodeError::new(DecodeErrorKind::UnknownEnumMember {
                        value: tag.clone(),
                        members: variants.iter().map(|v| v.name.clone()).collect(),
                    })),
                }
            }
            TypeDescriptor::Optional(inner) => match value {
                Value::Null => Ok(Value::Null),
                other => inner.encode(other),
            },
        }
    }
}

impl ObjectType {
    pub fn decode(&self, raw: &Value) -> Result<Value, DecodeError> {
        let Value::Object(fields) = raw else {
            return Err(DecodeError::type_mismatch("object", raw));
        };
        self.decode_fields(fields).map(Value::Object)
    }

    /// Encode declared properties. Absent optional properties stay absent.
    pub fn encode(&self, value: &Value) -> Result<Value, DecodeError> {
        let Value::Object(fields) = value else {
            return Err(DecodeError::type_mismatch("object", value));
        };
        let mut out = Map::new();
        for (name, property) in self.properties() {
            match fields.get(name) {
                Some(v) => {
                    let encoded = property.ty.encode(v).map_err(|e| e.at_field(name))?;
                    out.insert(name.to_owned(), encoded);
                }
                None if property.required => return Err(DecodeError::missing_field(name)),
                None => {}
            }
        }
        Ok(Value::Object(out))
    }

    /// Decode declared properties out of `fields`. Unknown keys are ignored.
    pub fn decode_fields(&self, fields: &Map<String, Value>) -> Result<Map<String, Value>, DecodeError> {
        let mut out = Map::new();
        for (name, property) in self.properties() {
            match fields.get(name) {
                Some(value) => {
                    let decoded = property.ty.decode(value).map_err(|e| e.at_field(name))?;
                    out.insert(name.to_owned(), decoded);
                }
                None if property.required => return Err(DecodeError::missing_field(name)),
                None => {
                    if let Some(default) = property.resolved_default() {
                        out.insert(name.to_owned(), default);
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Free-function form of [`TypeDescriptor::decode`].
pub fn decode(descriptor: &TypeDescriptor, raw: &Value) -> Result<Value, DecodeError> {
    descriptor.decode(raw)
}

/// Free-function form of [`TypeDescriptor::encode`].
pub fn encode(descriptor: &TypeDescriptor, value: &Value) -> Result<Value, DecodeError> {
    descriptor.encode(value)
}
