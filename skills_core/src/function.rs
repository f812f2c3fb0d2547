//! Function descriptors: one callable together with its parameter list,
//! JSON Schema and post-call policy.

use std::{any::type_name, fmt, sync::Arc};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};

use crate::{
    describe::{Describe, describe},
    descriptor::{TypeDescriptor, with_description},
    docs,
    error::{
        DecodeError, SerializationError, SkillError, UnsupportedKind, UnsupportedTypeError,
        json_kind,
    },
    models::{CallId, FunctionCall, InvocationOutcome},
};

// ============================================================================
// OPTIONS
// ============================================================================

/// Name/description overrides and the post-call policy of a function.
///
/// Deserializable so the policy can live in the caller's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Report the return value back at all.
    pub save_return: bool,
    /// Encode the return value as JSON; otherwise it must be a string.
    pub serialize: bool,
    /// Treat the return value as the final answer.
    pub interpret_as_response: bool,
}

impl Default for FunctionOptions {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            save_return: true,
            serialize: true,
            interpret_as_response: false,
        }
    }
}

impl FunctionOptions {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn save_return(mut self, save_return: bool) -> Self {
        self.save_return = save_return;
        self
    }

    pub fn serialize(mut self, serialize: bool) -> Self {
        self.serialize = serialize;
        self
    }

    pub fn interpret_as_response(mut self, interpret_as_response: bool) -> Self {
        self.interpret_as_response = interpret_as_response;
        self
    }
}

// ============================================================================
// PARAMETERS
// ============================================================================

/// One declared parameter. A parameter without a default is required,
/// unless it is marked [`omittable`](ParameterSpec::omittable).
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub ty: TypeDescriptor,
    pub default: Option<Value>,
    pub description: Option<String>,
    omittable: bool,
}

impl ParameterSpec {
    /// Optional types default to `null`.
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        let default = ty.is_optional().then_some(Value::Null);
        Self {
            name: name.into(),
            ty,
            default,
            description: None,
            omittable: false,
        }
    }

    /// Not required, and left out of the arguments when not sent.
    pub fn omittable(mut self) -> Self {
        self.omittable = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none() && !self.omittable
    }

    pub fn schema(&self) -> Value {
        with_description(self.ty.to_schema(), self.description.as_deref())
    }
}

/// Decoded arguments of one call, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Map<String, Value>,
}

impl Arguments {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Remove an argument and deserialize it. Absent arguments read as `null`.
    pub fn take<T: DeserializeOwned>(&mut self, name: &str) -> Result<T, SkillError> {
        let value = self.values.remove(name).unwrap_or(Value::Null);
        T::deserialize(&value).map_err(|e| SkillError::BrokenSchema {
            reason: format!("argument `{name}`: {e}"),
            arguments: value,
        })
    }

    /// Deserialize all arguments as one record.
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T, SkillError> {
        let value = Value::Object(self.values);
        T::deserialize(&value).map_err(|e| SkillError::BrokenSchema {
            reason: e.to_string(),
            arguments: value,
        })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}

// ============================================================================
// DESCRIPTOR
// ============================================================================

/// Type-erased callable: decoded arguments in, JSON return value out.
pub type FunctionImpl = dyn Fn(Arguments) -> Result<Value, SkillError> + Send + Sync;

/// Schema, invocation and post-call policy for one callable.
#[derive(Clone)]
pub struct FunctionDescriptor {
    name: String,
    description: Option<String>,
    parameters: Vec<ParameterSpec>,
    save_return: bool,
    serialize: bool,
    interpret_as_response: bool,
    func: Arc<FunctionImpl>,
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .field("save_return", &self.save_return)
            .field("serialize", &self.serialize)
            .field("interpret_as_response", &self.interpret_as_response)
            .finish_non_exhaustive()
    }
}

impl FunctionDescriptor {
    pub fn builder(name: impl Into<String>) -> FunctionBuilder {
        FunctionBuilder::new(name)
    }

    /// Wrap a callable taking one record type whose fields are the parameters.
    pub fn from_record<I, O, F>(
        name: impl Into<String>,
        options: FunctionOptions,
        func: F,
    ) -> Result<Self, SkillError>
    where
        I: Describe + DeserializeOwned + 'static,
        O: Serialize + 'static,
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        let TypeDescriptor::Object(record) = describe::<I>()? else {
            return Err(UnsupportedTypeError::new(type_name::<I>(), UnsupportedKind::NotAnObject).into());
        };

        let mut builder = FunctionBuilder::new(name).options(options);
        builder.description = record.description.clone();
        for (param, property) in record.into_properties() {
            let default = property.resolved_default();
            let mut spec = ParameterSpec::new(param, property.ty);
            if !property.required {
                spec = spec.omittable();
            }
            spec.default = default;
            spec.description = property.description;
            builder = builder.param_spec(spec);
        }
        builder.build(move |args: Arguments| args.deserialize::<I>().map(&func))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn save_return(&self) -> bool {
        self.save_return
    }

    pub fn serialize(&self) -> bool {
        self.serialize
    }

    pub fn interpret_as_response(&self) -> bool {
        self.interpret_as_response
    }

    pub fn options(&self) -> FunctionOptions {
        FunctionOptions {
            name: Some(self.name.clone()),
            description: self.description.clone(),
            save_return: self.save_return,
            serialize: self.serialize,
            interpret_as_response: self.interpret_as_response,
        }
    }

    /// The function schema as sent to the model.
    pub fn schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("name".to_owned(), json!(self.name));
        if let Some(description) = &self.description {
            schema.insert("description".to_owned(), json!(description));
        }
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.schema()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.is_required())
            .map(|p| p.name.as_str())
            .collect();
        schema.insert(
            "parameters".to_owned(),
            json!({
                "type": "object",
                "properties": properties,
                "required": required
            }),
        );
        Value::Object(schema)
    }

    /// Decode `raw_arguments` against the parameter list, then call the
    /// function and return its raw JSON result.
    pub fn invoke(&self, raw_arguments: &Value) -> Result<Value, SkillError> {
        let Value::Object(raw) = raw_arguments else {
            return Err(SkillError::BrokenSchema {
                arguments: raw_arguments.clone(),
                reason: format!("expected an object, found {}", json_kind(raw_arguments)),
            });
        };

        let mut decoded = Map::new();
        for param in &self.parameters {
            let value = match raw.get(&param.name) {
                Some(value) => param.ty.decode(value).map_err(|e| e.at_field(param.name.as_str())),
                None => match &param.default {
                    Some(default) => Ok(default.clone()),
                    None if param.omittable => continue,
                    None => Err(DecodeError::missing_field(param.name.as_str())),
                },
            };
            let value = value.inspect_err(|err| {
                tracing::debug!(function = %self.name, error = %err, "argument decoding failed");
            })?;
            decoded.insert(param.name.clone(), value);
        }
        if raw.keys().any(|k| !decoded.contains_key(k)) {
            tracing::debug!(function = %self.name, "ignoring undeclared arguments");
        }

        tracing::debug!(function = %self.name, "invoking function");
        (self.func)(Arguments::new(decoded))
    }

    /// Apply the post-call policy to a raw return value.
    pub fn outcome(&self, id: Option<CallId>, result: Value) -> Result<InvocationOutcome, SkillError> {
        let content = if !self.save_return {
            None
        } else if self.serialize {
            Some(result.to_string())
        } else {
            match result {
                Value::String(text) => Some(text),
                other => {
                    return Err(SerializationError::NotAString {
                        function: self.name.clone(),
                        found: json_kind(&other),
                    }
                    .into());
                }
            }
        };
        tracing::trace!(
            function = %self.name,
            saved = content.is_some(),
            is_final = self.interpret_as_response,
            "applied post-call policy"
        );
        Ok(InvocationOutcome {
            id,
            name: self.name.clone(),
            content,
            interpret_as_response: self.interpret_as_response,
        })
    }

    /// Parse, invoke and apply the post-call policy for one call request.
    pub fn run(&self, call: &FunctionCall) -> Result<InvocationOutcome, SkillError> {
        let arguments = call.parse_arguments()?;
        let result = self.invoke(&arguments)?;
        self.outcome(call.id, result)
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Declarative construction of a [`FunctionDescriptor`].
///
/// Errors are recorded as parameters are added and reported by
/// [`build`](FunctionBuilder::build); the first one wins.
pub struct FunctionBuilder {
    name: String,
    description: Option<String>,
    param_docs: IndexMap<String, String>,
    options: FunctionOptions,
    parameters: Vec<ParameterSpec>,
    error: Option<SkillError>,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            param_docs: IndexMap::new(),
            options: FunctionOptions::default(),
            parameters: Vec::new(),
            error: None,
        }
    }

    /// Take the description and parameter docs from a doc comment.
    pub fn doc(mut self, doc: &str) -> Self {
        let parsed = docs::parse(doc);
        self.description = parsed.short_description;
        self.param_docs = parsed.params;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn options(mut self, options: FunctionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn param<T: Describe + ?Sized>(self, name: &str) -> Self {
        match describe::<T>() {
            Ok(ty) => self.param_spec(ParameterSpec::new(name, ty)),
            Err(e) => self.fail(e.for_parameter(name).into()),
        }
    }

    pub fn param_with_default<T: Describe + Serialize>(self, name: &str, default: T) -> Self {
        let ty = match describe::<T>() {
            Ok(ty) => ty,
            Err(e) => return self.fail(e.for_parameter(name).into()),
        };
        match serde_json::to_value(&default) {
            Ok(value) => self.param_spec(ParameterSpec::new(name, ty).with_default(value)),
            Err(e) => self.fail(
                UnsupportedTypeError::new(type_name::<T>(), UnsupportedKind::InvalidDefault(e.to_string()))
                    .for_parameter(name)
                    .into(),
            ),
        }
    }

    pub fn param_spec(mut self, spec: ParameterSpec) -> Self {
        if self.parameters.iter().any(|p| p.name == spec.name) {
            let err = UnsupportedTypeError::new(
                self.name.clone(),
                UnsupportedKind::DuplicateProperty(spec.name.clone()),
            )
            .for_parameter(spec.name);
            return self.fail(err.into());
        }
        self.parameters.push(spec);
        self
    }

    fn fail(mut self, error: SkillError) -> Self {
        self.error.get_or_insert(error);
        self
    }

    pub fn build<O, F>(self, func: F) -> Result<FunctionDescriptor, SkillError>
    where
        O: Serialize,
        F: Fn(Arguments) -> Result<O, SkillError> + Send + Sync + 'static,
    {
        if let Some(error) = self.error {
            return Err(error);
        }

        let FunctionOptions {
            name,
            description,
            save_return,
            serialize,
            interpret_as_response,
        } = self.options;
        let name = name.unwrap_or(self.name);
        let description = description.or(self.description);

        let mut parameters = self.parameters;
        for param in &mut parameters {
            if param.description.is_none() {
                param.description = self.param_docs.get(&param.name).cloned();
            }
        }

        let function = name.clone();
        let func: Arc<FunctionImpl> = Arc::new(move |args: Arguments| -> Result<Value, SkillError> {
            let output = func(args)?;
            serde_json::to_value(output).map_err(|source| {
                SerializationError::NotSerializable {
                    function: function.clone(),
                    source,
                }
                .into()
            })
        });

        tracing::debug!(function = %name, parameters = parameters.len(), "built function descriptor");
        Ok(FunctionDescriptor {
            name,
            description,
            parameters,
            save_return,
            serialize,
            interpret_as_response,
            func,
        })
    }
}

// ============================================================================
// REGISTRATION
// ============================================================================

/// Registration submitted by the `#[function]` attribute.
pub struct FunctionRegistration {
    /// Name the function is exposed under
    pub name: &'static str,
    /// Builds the descriptor; fails if a parameter type cannot be described
    pub build: fn() -> Result<FunctionDescriptor, SkillError>,
}

impl FunctionRegistration {
    pub const fn new(
        name: &'static str,
        build: fn() -> Result<FunctionDescriptor, SkillError>,
    ) -> Self {
        Self { name, build }
    }
}

inventory::collect!(FunctionRegistration);

/// Every function registered with `#[function]` in the binary.
pub fn registrations() -> impl Iterator<Item = &'static FunctionRegistration> {
    inventory::iter::<FunctionRegistration>.into_iter()
}

/// Build the descriptor of a `#[function]` by name.
pub fn registered(name: &str) -> Result<FunctionDescriptor, SkillError> {
    let registration = registrations()
        .find(|reg| reg.name == name)
        .ok_or_else(|| SkillError::not_found(name))?;
    (registration.build)()
}
