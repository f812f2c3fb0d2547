//! Function registries ("skills") and name-based dispatch.

use std::{
    collections::HashSet,
    sync::atomic::{AtomicBool, Ordering},
};

use indexmap::IndexMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};

use crate::{
    describe::Describe,
    error::SkillError,
    function::{FunctionDescriptor, FunctionOptions, registrations},
    models::{FunctionCall, InvocationOutcome},
};

/// Anything that exposes function schemas and dispatches calls by name.
pub trait FunctionSet {
    /// Schemas of the functions currently offered to the model.
    fn functions_schema(&self) -> Vec<Value>;

    /// Every name this set answers to, offered or not.
    fn function_names(&self) -> Vec<String>;

    fn contains(&self, name: &str) -> bool {
        self.function_names().iter().any(|n| n == name)
    }

    fn run_function(&self, call: &FunctionCall) -> Result<InvocationOutcome, SkillError>;
}

// ============================================================================
// SKILL
// ============================================================================

/// Flat name-to-descriptor table, in registration order.
#[derive(Debug, Default, Clone)]
pub struct Skill {
    functions: IndexMap<String, FunctionDescriptor>,
}

impl Skill {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, function: FunctionDescriptor) -> Result<&mut Self, SkillError> {
        if self.functions.contains_key(function.name()) {
            return Err(SkillError::duplicate(function.name()));
        }
        tracing::debug!(function = %function.name(), "registered function");
        self.functions.insert(function.name().to_owned(), function);
        Ok(self)
    }

    /// Register a closure taking a record whose fields are the parameters.
    pub fn register<I, O, F>(
        &mut self,
        name: &str,
        options: FunctionOptions,
        func: F,
    ) -> Result<&mut Self, SkillError>
    where
        I: Describe + DeserializeOwned + 'static,
        O: Serialize + 'static,
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        let function = FunctionDescriptor::from_record(name, options, func)?;
        self.add(function)
    }

    pub fn remove(&mut self, name: &str) -> Result<FunctionDescriptor, SkillError> {
        self.functions
            .shift_remove(name)
            .ok_or_else(|| SkillError::not_found(name))
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.get(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionDescriptor> {
        self.functions.values()
    }

    /// The schema list as one JSON array.
    pub fn json(&self) -> Value {
        Value::Array(self.functions_schema())
    }

    pub fn from_functions(
        functions: impl IntoIterator<Item = FunctionDescriptor>,
    ) -> Result<Self, SkillError> {
        let mut skill = Self::new();
        for function in functions {
            skill.add(function)?;
        }
        Ok(skill)
    }

    /// Collect every `#[function]` linked into the binary.
    pub fn collect() -> Result<Self, SkillError> {
        let mut skill = Self::new();
        for registration in registrations() {
            if skill.functions.contains_key(registration.name) {
                tracing::warn!(function = registration.name, "function registered twice");
                return Err(SkillError::duplicate(registration.name));
            }
            skill.add((registration.build)()?)?;
        }
        Ok(skill)
    }

    /// Collect the named `#[function]`s, in the order given.
    pub fn collect_named<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self, SkillError> {
        let mut skill = Self::new();
        for name in names {
            skill.add(crate::function::registered(name)?)?;
        }
        Ok(skill)
    }
}

impl FunctionSet for Skill {
    fn functions_schema(&self) -> Vec<Value> {
        self.functions.values().map(FunctionDescriptor::schema).collect()
    }

    fn function_names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    fn run_function(&self, call: &FunctionCall) -> Result<InvocationOutcome, SkillError> {
        let function = self
            .functions
            .get(&call.name)
            .ok_or_else(|| SkillError::not_found(call.name.as_str()))?;
        tracing::debug!(function = %call.name, id = ?call.id, "dispatching call");
        function.run(call)
    }
}

// ============================================================================
// TOGGLABLE
// ============================================================================

/// A skill hidden behind a single enable function.
///
/// While disabled only the enable function is offered; calling it switches
/// the set on and from then on the inner functions are offered instead. The
/// enable function is gone once the set is enabled.
#[derive(Debug)]
pub struct TogglableSkill {
    skill: Skill,
    enable_name: String,
    enable_description: Option<String>,
    enabled: AtomicBool,
}

impl TogglableSkill {
    /// Fails if `skill` already has a function called `enable_name`.
    pub fn new(enable_name: impl Into<String>, skill: Skill) -> Result<Self, SkillError> {
        let enable_name = enable_name.into();
        if skill.contains(&enable_name) {
            return Err(SkillError::duplicate(enable_name));
        }
        Ok(Self {
            skill,
            enable_name,
            enable_description: None,
            enabled: AtomicBool::new(false),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.enable_description = Some(description.into());
        self
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn skill(&self) -> &Skill {
        &self.skill
    }

    pub fn add(&mut self, function: FunctionDescriptor) -> Result<&mut Self, SkillError> {
        if function.name() == self.enable_name {
            return Err(SkillError::duplicate(function.name()));
        }
        self.skill.add(function)?;
        Ok(self)
    }

    fn enable_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("name".to_owned(), json!(self.enable_name));
        if let Some(description) = &self.enable_description {
            schema.insert("description".to_owned(), json!(description));
        }
        schema.insert(
            "parameters".to_owned(),
            json!({ "type": "object", "properties": {} }),
        );
        Value::Object(schema)
    }
}

impl FunctionSet for TogglableSkill {
    fn functions_schema(&self) -> Vec<Value> {
        if self.is_enabled() {
            self.skill.functions_schema()
        } else {
            vec![self.enable_schema()]
        }
    }

    fn function_names(&self) -> Vec<String> {
        let mut names = vec![self.enable_name.clone()];
        names.extend(self.skill.function_names());
        names
    }

    fn run_function(&self, call: &FunctionCall) -> Result<InvocationOutcome, SkillError> {
        if self.is_enabled() {
            return self.skill.run_function(call);
        }
        if call.name != self.enable_name {
            return Err(SkillError::not_found(call.name.as_str()));
        }
        self.enable();
        tracing::debug!(function = %call.name, "enabled function set");
        Ok(InvocationOutcome {
            id: call.id,
            name: call.name.clone(),
            content: None,
            interpret_as_response: false,
        })
    }
}

// ============================================================================
// UNION
// ============================================================================

/// A skill of its own plus any number of other function sets.
///
/// Names must be unique across every member, and within each added set;
/// registration fails on the first collision.
#[derive(Default)]
pub struct UnionSkill {
    own: Skill,
    sets: Vec<Box<dyn FunctionSet + Send + Sync>>,
}

impl UnionSkill {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_free<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<(), SkillError> {
        for name in names {
            if self.contains(name) {
                return Err(SkillError::duplicate(name));
            }
        }
        Ok(())
    }

    pub fn add(&mut self, function: FunctionDescriptor) -> Result<&mut Self, SkillError> {
        self.check_free([function.name()])?;
        self.own.add(function)?;
        Ok(self)
    }

    pub fn register<I, O, F>(
        &mut self,
        name: &str,
        options: FunctionOptions,
        func: F,
    ) -> Result<&mut Self, SkillError>
    where
        I: Describe + DeserializeOwned + 'static,
        O: Serialize + 'static,
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        self.add(FunctionDescriptor::from_record(name, options, func)?)
    }

    pub fn add_set<S>(&mut self, set: S) -> Result<&mut Self, SkillError>
    where
        S: FunctionSet + Send + Sync + 'static,
    {
        let names = set.function_names();
        let mut seen = HashSet::with_capacity(names.len());
        if let Some(repeated) = names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(SkillError::duplicate(repeated.as_str()));
        }
        self.check_free(names.iter().map(String::as_str))?;
        tracing::debug!(functions = names.len(), "added function set");
        self.sets.push(Box::new(set));
        Ok(self)
    }

    /// Remove one of the union's own functions. Functions that came in
    /// through [`add_set`](UnionSkill::add_set) cannot be removed.
    pub fn remove(&mut self, name: &str) -> Result<FunctionDescriptor, SkillError> {
        self.own.remove(name)
    }

    pub fn own(&self) -> &Skill {
        &self.own
    }
}

impl std::fmt::Debug for UnionSkill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnionSkill")
            .field("own", &self.own)
            .field("sets", &self.sets.len())
            .finish()
    }
}

impl FunctionSet for UnionSkill {
    fn functions_schema(&self) -> Vec<Value> {
        let mut schemas = self.own.functions_schema();
        for set in &self.sets {
            schemas.extend(set.functions_schema());
        }
        schemas
    }

    fn function_names(&self) -> Vec<String> {
        let mut names = self.own.function_names();
        for set in &self.sets {
            names.extend(set.function_names());
        }
        names
    }

    fn contains(&self, name: &str) -> bool {
        self.own.contains(name) || self.sets.iter().any(|set| set.contains(name))
    }

    fn run_function(&self, call: &FunctionCall) -> Result<InvocationOutcome, SkillError> {
        if self.own.contains(&call.name) {
            return self.own.run_function(call);
        }
        self.sets
            .iter()
            .find(|set| set.contains(&call.name))
            .ok_or_else(|| SkillError::not_found(call.name.as_str()))?
            .run_function(call)
    }
}
