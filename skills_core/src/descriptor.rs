//! The type descriptor model and its JSON Schema rendering.

use indexmap::IndexMap;
use serde_json::{Map, Value, json};

use crate::error::{UnsupportedKind, UnsupportedTypeError};

/// JSON primitive kinds a value can be declared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl PrimitiveKind {
    pub fn json_type(self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Boolean => "boolean",
        }
    }

    /// Whether `value` is already of this kind. Any JSON number is a `number`.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            PrimitiveKind::String => value.is_string(),
            PrimitiveKind::Integer => value.is_i64() || value.is_u64(),
            PrimitiveKind::Number => value.is_number(),
            PrimitiveKind::Boolean => value.is_boolean(),
        }
    }
}

/// Structured description of a value's shape, used both to emit JSON Schema
/// and to decode raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Primitive(PrimitiveKind),
    Null,
    Enum(EnumType),
    Array(Box<TypeDescriptor>),
    /// Fixed-length heterogeneous array.
    Tuple(Vec<TypeDescriptor>),
    /// Object with arbitrary string keys and uniform values.
    Map(Box<TypeDescriptor>),
    Object(ObjectType),
    /// Alternatives in decode priority order.
    Union(Vec<TypeDescriptor>),
    /// Union over the newtype variants of a Rust enum. Decoding picks the
    /// first matching alternative, like `Union`, and reports the match in
    /// serde's externally tagged form `{"Variant": value}`.
    Variants(Vec<Variant>),
    Optional(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    pub fn string() -> Self {
        TypeDescriptor::Primitive(PrimitiveKind::String)
    }

    pub fn integer() -> Self {
        TypeDescriptor::Primitive(PrimitiveKind::Integer)
    }

    pub fn number() -> Self {
        TypeDescriptor::Primitive(PrimitiveKind::Number)
    }

    pub fn boolean() -> Self {
        TypeDescriptor::Primitive(PrimitiveKind::Boolean)
    }

    pub fn array(element: TypeDescriptor) -> Self {
        TypeDescriptor::Array(Box::new(element))
    }

    pub fn map(values: TypeDescriptor) -> Self {
        TypeDescriptor::Map(Box::new(values))
    }

    pub fn optional(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Optional(Box::new(inner))
    }

    pub fn union(alternatives: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        TypeDescriptor::Union(alternatives.into_iter().collect())
    }

    pub fn variants<N: Into<String>>(
        variants: impl IntoIterator<Item = (N, TypeDescriptor)>,
    ) -> Self {
        TypeDescriptor::Variants(
            variants
                .into_iter()
                .map(|(name, ty)| Variant {
                    name: name.into(),
                    ty,
                })
                .collect(),
        )
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, TypeDescriptor::Optional(_))
    }

    /// Short human-readable name used in error messages.
    pub fn label(&self) -> String {
        match self {
            TypeDescriptor::Primitive(kind) => kind.json_type().to_owned(),
            TypeDescriptor::Null => "null".to_owned(),
            TypeDescriptor::Enum(e) => e.name.clone(),
            TypeDescriptor::Array(element) => format!("array<{}>", element.label()),
            TypeDescriptor::Tuple(items) => {
                let labels: Vec<_> = items.iter().map(TypeDescriptor::label).collect();
                format!("({})", labels.join(", "))
            }
            TypeDescriptor::Map(values) => format!("map<{}>", values.label()),
            TypeDescriptor::Object(o) => o.name.clone(),
            TypeDescriptor::Union(alternatives) => {
                let labels: Vec<_> = alternatives.iter().map(TypeDescriptor::label).collect();
                labels.join(" | ")
            }
            TypeDescriptor::Variants(variants) => {
                let labels: Vec<_> = variants.iter().map(|v| v.name.as_str()).collect();
                labels.join(" | ")
            }
            TypeDescriptor::Optional(inner) => format!("{} | null", inner.label()),
        }
    }

    /// Render this descriptor as a JSON Schema node.
    pub fn to_schema(&self) -> Value {
        match self {
            TypeDescriptor::Primitive(kind) => json!({ "type": kind.json_type() }),
            TypeDescriptor::Null => json!({ "type": "null" }),
            TypeDescriptor::Enum(e) => e.to_schema(),
            TypeDescriptor::Array(element) => json!({
                "type": "array",
                "items": element.to_schema()
            }),
            TypeDescriptor::Tuple(items) => json!({
                "type": "array",
                "prefixItems": items.iter().map(TypeDescriptor::to_schema).collect::<Vec<_>>(),
                "minItems": items.len(),
                "maxItems": items.len()
            }),
            TypeDescriptor::Map(values) => json!({
                "type": "object",
                "additionalProperties": values.to_schema()
            }),
            TypeDescriptor::Object(o) => o.to_schema(),
            TypeDescriptor::Union(alternatives) => json!({
                "anyOf": alternatives.iter().map(TypeDescriptor::to_schema).collect::<Vec<_>>()
            }),
            TypeDescriptor::Variants(variants) => json!({
                "anyOf": variants.iter().map(|v| v.ty.to_schema()).collect::<Vec<_>>()
            }),
            TypeDescriptor::Optional(inner) => json!({
                "anyOf": [inner.to_schema(), { "type": "null" }]
            }),
        }
    }
}

/// One alternative of [`TypeDescriptor::Variants`], under the name serde
/// knows the variant by.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub name: String,
    pub ty: TypeDescriptor,
}

/// Free-function form of [`TypeDescriptor::to_schema`].
pub fn build_schema(descriptor: &TypeDescriptor) -> Value {
    descriptor.to_schema()
}

/// Insert `description` into a schema node, replacing any existing one.
pub(crate) fn with_description(mut schema: Value, description: Option<&str>) -> Value {
    if let (Some(description), Value::Object(map)) = (description, &mut schema) {
        map.insert("description".to_owned(), Value::String(description.to_owned()));
    }
    schema
}

fn non_empty(doc: &str) -> Option<String> {
    let doc = doc.trim();
    (!doc.is_empty()).then(|| doc.to_owned())
}

// ============================================================================
// ENUMS
// ============================================================================

/// Closed set of named members, each standing for an underlying value.
///
/// The schema lists member *names*; decoding maps a name back to its value.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    pub description: Option<String>,
    members: IndexMap<String, Value>,
}

impl EnumType {
    pub fn new<N: Into<String>>(
        name: impl Into<String>,
        members: impl IntoIterator<Item = (N, Value)>,
    ) -> Result<Self, UnsupportedTypeError> {
        let name = name.into();
        let mut map = IndexMap::new();
        for (member, value) in members {
            let member = member.into();
            if map.contains_key(&member) {
                return Err(UnsupportedTypeError::new(
                    name,
                    UnsupportedKind::DuplicateEnumMember(member),
                ));
            }
            map.insert(member, value);
        }
        Ok(Self {
            name,
            description: None,
            members: map,
        })
    }

    pub fn with_doc(mut self, doc: &str) -> Self {
        self.description = non_empty(doc);
        self
    }

    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn value_of(&self, member: &str) -> Option<&Value> {
        self.members.get(member)
    }

    /// The member name standing for `value`.
    pub fn member_of(&self, value: &Value) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| name.as_str())
    }

    pub fn to_schema(&self) -> Value {
        let schema = json!({
            "type": "string",
            "enum": self.member_names().collect::<Vec<_>>()
        });
        with_description(schema, self.description.as_deref())
    }
}

// ============================================================================
// OBJECTS
// ============================================================================

/// One property of an [`ObjectType`].
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub ty: TypeDescriptor,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl Property {
    pub fn required(ty: TypeDescriptor) -> Self {
        Self {
            ty,
            required: true,
            default: None,
            description: None,
        }
    }

    pub fn optional(ty: TypeDescriptor, default: Option<Value>) -> Self {
        Self {
            ty,
            required: false,
            default,
            description: None,
        }
    }

    pub fn with_doc(mut self, doc: &str) -> Self {
        self.description = non_empty(doc);
        self
    }

    /// Value used when the property is absent: the declared default, or
    /// `null` for optional types.
    pub fn resolved_default(&self) -> Option<Value> {
        self.default
            .clone()
            .or_else(|| self.ty.is_optional().then_some(Value::Null))
    }
}

/// A structured record whose fields are JSON object properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectType {
    pub name: String,
    pub description: Option<String>,
    properties: IndexMap<String, Property>,
}

impl ObjectType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            properties: IndexMap::new(),
        }
    }

    pub fn with_doc(mut self, doc: &str) -> Self {
        self.description = non_empty(doc);
        self
    }

    /// Add a property, rejecting duplicate names.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        property: Property,
    ) -> Result<(), UnsupportedTypeError> {
        let name = name.into();
        if self.properties.contains_key(&name) {
            return Err(UnsupportedTypeError::new(
                self.name.clone(),
                UnsupportedKind::DuplicateProperty(name),
            ));
        }
        self.properties.insert(name, property);
        Ok(())
    }

    pub fn property(
        mut self,
        name: impl Into<String>,
        property: Property,
    ) -> Result<Self, UnsupportedTypeError> {
        self.insert(name, property)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_properties(self) -> impl Iterator<Item = (String, Property)> {
        self.properties.into_iter()
    }

    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .filter(|(_, p)| p.required)
            .map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn to_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".to_owned(), json!("object"));
        if let Some(description) = &self.description {
            schema.insert("description".to_owned(), json!(description));
        }
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, p)| {
                let node = with_description(p.ty.to_schema(), p.description.as_deref());
                (name.clone(), node)
            })
            .collect();
        schema.insert("properties".to_owned(), Value::Object(properties));
        schema.insert(
            "required".to_owned(),
            json!(self.required().collect::<Vec<_>>()),
        );
        Value::Object(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temperature_unit() -> EnumType {
        EnumType::new(
            "TemperatureUnit",
            [
                ("CELSIUS", json!("celsius")),
                ("FAHRENHEIT", json!("fahrenheit")),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_primitive_schemas() {
        assert_eq!(TypeDescriptor::boolean().to_schema(), json!({ "type": "boolean" }));
        assert_eq!(TypeDescriptor::integer().to_schema(), json!({ "type": "integer" }));
        assert_eq!(TypeDescriptor::number().to_schema(), json!({ "type": "number" }));
        assert_eq!(TypeDescriptor::string().to_schema(), json!({ "type": "string" }));
        assert_eq!(TypeDescriptor::Null.to_schema(), json!({ "type": "null" }));
    }

    #[test]
    fn test_enum_schema_lists_names() {
        let schema = TypeDescriptor::Enum(temperature_unit().with_doc("Unit of temperature"))
            .to_schema();
        assert_eq!(
            schema,
            json!({
                "type": "string",
                "enum": ["CELSIUS", "FAHRENHEIT"],
                "description": "Unit of temperature"
            })
        );
    }

    #[test]
    fn test_enum_rejects_duplicate_members() {
        let err = EnumType::new("Dup", [("A", json!(1)), ("A", json!(2))]).unwrap_err();
        assert_eq!(err.kind, UnsupportedKind::DuplicateEnumMember("A".into()));
    }

    #[test]
    fn test_option_schema() {
        assert_eq!(
            TypeDescriptor::optional(TypeDescriptor::string()).to_schema(),
            json!({ "anyOf": [{ "type": "string" }, { "type": "null" }] })
        );
    }

    #[test]
    fn test_union_schema_preserves_order() {
        let union = TypeDescriptor::union([TypeDescriptor::integer(), TypeDescriptor::boolean()]);
        assert_eq!(
            union.to_schema(),
            json!({ "anyOf": [{ "type": "integer" }, { "type": "boolean" }] })
        );
        assert_eq!(union.label(), "integer | boolean");
    }

    #[test]
    fn test_variants_schema_matches_plain_union() {
        let variants = TypeDescriptor::variants([
            ("Unit", TypeDescriptor::Enum(temperature_unit())),
            ("Text", TypeDescriptor::string()),
        ]);
        assert_eq!(
            variants.to_schema(),
            json!({
                "anyOf": [
                    { "type": "string", "enum": ["CELSIUS", "FAHRENHEIT"] },
                    { "type": "string" }
                ]
            })
        );
        assert_eq!(variants.label(), "Unit | Text");
    }

    #[test]
    fn test_enum_member_lookup_by_value() {
        let unit = temperature_unit();
        assert_eq!(unit.member_of(&json!("celsius")), Some("CELSIUS"));
        assert_eq!(unit.member_of(&json!("CELSIUS")), None);
    }

    #[test]
    fn test_collection_schemas() {
        assert_eq!(
            TypeDescriptor::array(TypeDescriptor::integer()).to_schema(),
            json!({ "type": "array", "items": { "type": "integer" } })
        );
        assert_eq!(
            TypeDescriptor::map(TypeDescriptor::integer()).to_schema(),
            json!({ "type": "object", "additionalProperties": { "type": "integer" } })
        );
        assert_eq!(
            TypeDescriptor::Tuple(vec![TypeDescriptor::integer(), TypeDescriptor::boolean()])
                .to_schema(),
            json!({
                "type": "array",
                "prefixItems": [{ "type": "integer" }, { "type": "boolean" }],
                "minItems": 2,
                "maxItems": 2
            })
        );
    }

    #[test]
    fn test_object_schema_keeps_declaration_order() {
        let object = ObjectType::new("Location")
            .with_doc("A point on the map")
            .property(
                "lng",
                Property::required(TypeDescriptor::number()).with_doc("Longitude"),
            )
            .unwrap()
            .property("lat", Property::required(TypeDescriptor::number()))
            .unwrap()
            .property(
                "label",
                Property::optional(TypeDescriptor::optional(TypeDescriptor::string()), None),
            )
            .unwrap();

        let schema = object.to_schema();
        assert_eq!(
            schema,
            json!({
                "type": "object",
                "description": "A point on the map",
                "properties": {
                    "lng": { "type": "number", "description": "Longitude" },
                    "lat": { "type": "number" },
                    "label": { "anyOf": [{ "type": "string" }, { "type": "null" }] }
                },
                "required": ["lng", "lat"]
            })
        );
        let keys: Vec<_> = schema["properties"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["lng", "lat", "label"]);
    }

    #[test]
    fn test_object_rejects_duplicate_properties() {
        let err = ObjectType::new("Point")
            .property("x", Property::required(TypeDescriptor::integer()))
            .unwrap()
            .property("x", Property::required(TypeDescriptor::integer()))
            .unwrap_err();
        assert_eq!(err.kind, UnsupportedKind::DuplicateProperty("x".into()));
        assert_eq!(err.type_name, "Point");
    }

    #[test]
    fn test_optional_property_defaults_to_null() {
        let property = Property::optional(TypeDescriptor::optional(TypeDescriptor::integer()), None);
        assert_eq!(property.resolved_default(), Some(Value::Null));

        let property = Property::optional(TypeDescriptor::integer(), Some(json!(3)));
        assert_eq!(property.resolved_default(), Some(json!(3)));
    }
}
