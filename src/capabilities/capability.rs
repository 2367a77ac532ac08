//! Capability definition: the unit the broker lists and invokes.
//!
//! A capability declares:
//! - a unique name and a human-readable description
//! - an input schema (ordered, typed fields with required flags and defaults)
//! - an availability predicate over the [`PlatformDescriptor`]
//! - default arguments that fill gaps in caller input
//! - fixed arguments that always overwrite caller input
//!
//! Capabilities are immutable once registered.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::platform::PlatformDescriptor;

// ---------------------------------------------------------------------------
// Input schema
// ---------------------------------------------------------------------------

/// JSON-Schema primitive type of an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "string" => Some(FieldType::String),
            "integer" => Some(FieldType::Integer),
            "number" => Some(FieldType::Number),
            "boolean" => Some(FieldType::Boolean),
            "array" => Some(FieldType::Array),
            "object" => Some(FieldType::Object),
            _ => None,
        }
    }
}

/// One argument of a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    /// Filled in when the caller leaves the field absent or empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn new(name: &str, field_type: FieldType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            description: description.to_string(),
            required: false,
            default: None,
        }
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::String, description)
    }

    pub fn integer(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::Integer, description)
    }

    pub fn number(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::Number, description)
    }

    pub fn boolean(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::Boolean, description)
    }

    pub fn array(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::Array, description)
    }

    pub fn object(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::Object, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Ordered list of argument fields, rendered as a JSON-Schema object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputSchema {
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("schema must be an object with type \"object\"")]
    NotAnObject,

    #[error("property '{0}' is not an object")]
    InvalidProperty(String),

    #[error("property '{name}' has unsupported type '{found}'")]
    UnsupportedType { name: String, found: String },

    #[error("required field '{0}' is not declared in properties")]
    UndeclaredRequired(String),
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_names(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Render as `{type: object, required?: [...], properties: {...}}`.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut prop = Map::new();
            prop.insert("type".into(), json!(field.field_type.as_str()));
            prop.insert("description".into(), json!(field.description));
            if let Some(default) = &field.default {
                prop.insert("default".into(), default.clone());
            }
            properties.insert(field.name.clone(), Value::Object(prop));
        }

        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        let required = self.required_names();
        if !required.is_empty() {
            schema.insert("required".into(), json!(required));
        }
        schema.insert("properties".into(), Value::Object(properties));
        Value::Object(schema)
    }

    /// Parse the form produced by [`to_json_schema`](Self::to_json_schema).
    pub fn from_json_schema(schema: &Value) -> Result<Self, SchemaError> {
        let obj = schema.as_object().ok_or(SchemaError::NotAnObject)?;
        if obj.get("type").and_then(Value::as_str) != Some("object") {
            return Err(SchemaError::NotAnObject);
        }

        let required: Vec<&str> = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut fields = Vec::new();
        if let Some(properties) = obj.get("properties").and_then(Value::as_object) {
            for (name, prop) in properties {
                let prop = prop
                    .as_object()
                    .ok_or_else(|| SchemaError::InvalidProperty(name.clone()))?;
                let type_name = prop.get("type").and_then(Value::as_str).unwrap_or_default();
                let field_type =
                    FieldType::parse(type_name).ok_or_else(|| SchemaError::UnsupportedType {
                        name: name.clone(),
                        found: type_name.to_string(),
                    })?;
                fields.push(FieldSpec {
                    name: name.clone(),
                    field_type,
                    description: prop
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    required: required.contains(&name.as_str()),
                    default: prop.get("default").cloned(),
                });
            }
        }

        if let Some(missing) = required.iter().find(|r| !fields.iter().any(|f| &f.name == *r)) {
            return Err(SchemaError::UndeclaredRequired(missing.to_string()));
        }

        Ok(Self { fields })
    }
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

/// Optional platform subsystems a capability can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    Commerce,
}

/// Pure predicate deciding whether a capability exists on a given platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    #[default]
    Always,
    Requires(Subsystem),
}

impl Availability {
    pub fn holds(&self, platform: &PlatformDescriptor) -> bool {
        match self {
            Availability::Always => true,
            Availability::Requires(Subsystem::Commerce) => platform.commerce,
        }
    }
}

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
    pub availability: Availability,
    /// Filled in when the caller leaves the key absent or empty.
    pub default_args: Map<String, Value>,
    /// Always written over the caller's arguments.
    pub fixed_args: Map<String, Value>,
}

/// Listing form: `{name, description, inputSchema}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl Capability {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: InputSchema::default(),
            availability: Availability::Always,
            default_args: Map::new(),
            fixed_args: Map::new(),
        }
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.input_schema.fields.push(field);
        self
    }

    pub fn requires(mut self, subsystem: Subsystem) -> Self {
        self.availability = Availability::Requires(subsystem);
        self
    }

    pub fn with_default_arg(mut self, key: &str, value: Value) -> Self {
        self.default_args.insert(key.to_string(), value);
        self
    }

    pub fn with_fixed_arg(mut self, key: &str, value: Value) -> Self {
        self.fixed_args.insert(key.to_string(), value);
        self
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.to_json_schema(),
        }
    }

    /// Build the argument map handed to the handler.
    ///
    /// Non-object input counts as no arguments. Schema defaults and default
    /// arguments fill keys that are absent or empty; fixed arguments always
    /// win.
    pub fn prepare_arguments(&self, raw: Option<&Value>) -> Map<String, Value> {
        let mut args = match raw {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };

        let defaults = self
            .input_schema
            .fields
            .iter()
            .filter_map(|f| f.default.as_ref().map(|d| (&f.name, d)))
            .chain(self.default_args.iter());
        for (key, default) in defaults {
            if is_empty(args.get(key)) {
                args.insert(key.clone(), default.clone());
            }
        }

        for (key, value) in &self.fixed_args {
            args.insert(key.clone(), value.clone());
        }
        args
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_pages() -> Capability {
        Capability::new("search_pages", "Search WordPress pages by keyword.")
            .with_field(FieldSpec::string("query", "Search keyword"))
            .with_field(FieldSpec::integer("per_page", "Results per page"))
            .with_default_arg("post_type", json!("page"))
    }

    #[test]
    fn test_schema_rendering() {
        let schema = Capability::new("create_post", "Create a post.")
            .with_field(FieldSpec::string("title", "Post title").required())
            .with_field(FieldSpec::string("content", "Post content"))
            .input_schema
            .to_json_schema();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["title"]));
        assert_eq!(schema["properties"]["title"]["type"], "string");
        let keys: Vec<&String> = schema["properties"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["title", "content"]);
    }

    #[test]
    fn test_schema_without_required_omits_key() {
        let schema = search_pages().input_schema.to_json_schema();
        assert!(schema.get("required").is_none());
    }

    #[test]
    fn test_schema_round_trip() {
        let schema = InputSchema::new()
            .field(FieldSpec::string("username", "Username").required())
            .field(FieldSpec::integer("limit", "Maximum results").with_default(json!(5)))
            .field(FieldSpec::array("line_items", "Items"))
            .field(FieldSpec::object("billing", "Billing address"))
            .field(FieldSpec::boolean("in_stock", "Only in-stock"))
            .field(FieldSpec::number("min_price", "Minimum price"));

        let parsed = InputSchema::from_json_schema(&schema.to_json_schema()).unwrap();
        assert_eq!(parsed, schema);
    }

    #[test]
    fn test_from_json_schema_errors() {
        assert_eq!(
            InputSchema::from_json_schema(&json!({"type": "array"})),
            Err(SchemaError::NotAnObject)
        );
        assert!(matches!(
            InputSchema::from_json_schema(&json!({
                "type": "object",
                "properties": {"x": {"type": "date"}}
            })),
            Err(SchemaError::UnsupportedType { .. })
        ));
        assert_eq!(
            InputSchema::from_json_schema(&json!({
                "type": "object",
                "required": ["ghost"],
                "properties": {}
            })),
            Err(SchemaError::UndeclaredRequired("ghost".into()))
        );
    }

    #[test]
    fn test_defaults_fill_absent_or_empty() {
        let cap = search_pages();
        let args = cap.prepare_arguments(Some(&json!({"query": "about"})));
        assert_eq!(args["post_type"], "page");

        let args = cap.prepare_arguments(Some(&json!({"post_type": ""})));
        assert_eq!(args["post_type"], "page");

        let args = cap.prepare_arguments(Some(&json!({"post_type": "landing"})));
        assert_eq!(args["post_type"], "landing");
    }

    #[test]
    fn test_schema_defaults_fill_gaps() {
        let cap = Capability::new("recommend", "")
            .with_field(FieldSpec::integer("limit", "Max results").with_default(json!(5)));
        assert_eq!(cap.prepare_arguments(None)["limit"], 5);
        assert_eq!(cap.prepare_arguments(Some(&json!({"limit": 2})))["limit"], 2);
    }

    #[test]
    fn test_fixed_args_overwrite() {
        let cap = Capability::new("search_tags", "Search tags.")
            .with_fixed_arg("taxonomy", json!("post_tag"));
        let args = cap.prepare_arguments(Some(&json!({"taxonomy": "category", "query": "x"})));
        assert_eq!(args["taxonomy"], "post_tag");
        assert_eq!(args["query"], "x");
    }

    #[test]
    fn test_non_object_arguments_are_ignored() {
        let cap = search_pages();
        let args = cap.prepare_arguments(Some(&json!(["query", "x"])));
        assert_eq!(args.len(), 1);
        assert_eq!(args["post_type"], "page");
        assert_eq!(cap.prepare_arguments(None).len(), 1);
    }

    #[test]
    fn test_availability() {
        let bare = PlatformDescriptor::default();
        let shop = PlatformDescriptor {
            commerce: true,
            application_passwords: true,
        };
        assert!(Availability::Always.holds(&bare));
        assert!(!Availability::Requires(Subsystem::Commerce).holds(&bare));
        assert!(Availability::Requires(Subsystem::Commerce).holds(&shop));
    }

    #[test]
    fn test_descriptor_serializes_input_schema_key() {
        let value = serde_json::to_value(search_pages().descriptor()).unwrap();
        assert!(value.get("inputSchema").is_some());
        assert_eq!(value["name"], "search_pages");
    }
}
