//! Schema - Define type schemas for resources
//!
//! Providers define schemas for each resource type, so malformed attribute
//! bags are rejected before any remote call is issued.

use std::collections::HashMap;
use std::fmt;

use crate::resource::Value;

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// List
    List(Box<AttributeType>),
    /// Map with values of one type
    Map(Box<AttributeType>),
    /// Nested block with its own attributes
    Block(Vec<AttributeSchema>),
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        // References are checked once resolved
        if value.is_reference() {
            return Ok(());
        }
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { base, validate, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Block(attributes), Value::Map(map)) => {
                for schema in attributes {
                    match map.get(&schema.name) {
                        Some(v) => schema.attr_type.validate(v).map_err(|e| {
                            TypeError::MapValueError {
                                key: schema.name.clone(),
                                inner: Box::new(e),
                            }
                        })?,
                        None if schema.required => {
                            return Err(TypeError::MissingRequired {
                                name: schema.name.clone(),
                            });
                        }
                        None => {}
                    }
                }
                match map
                    .keys()
                    .find(|k| !attributes.iter().any(|a| &a.name == *k))
                {
                    Some(unknown) => Err(TypeError::UnknownAttribute {
                        name: unknown.clone(),
                    }),
                    None => Ok(()),
                }
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Block(_) => "Block".to_string(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is computed and cannot be set")]
    ComputedAttribute { name: String },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Set by the provider from the remote resource, never by the user
    pub computed: bool,
    /// Changing this attribute requires replacing the resource
    pub force_new: bool,
    /// Sent to the control plane but never reported back
    pub write_only: bool,
    pub description: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            force_new: false,
            write_only: false,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Whether a change of `name` forces replacement
    pub fn forces_new(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|a| a.force_new)
    }

    pub fn is_computed(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|a| a.computed)
    }

    /// Copy write-only values from `source` into attributes read from the
    /// remote, which never contain them. Nested blocks are followed.
    pub fn carry_write_only(
        &self,
        source: &HashMap<String, Value>,
        target: &mut HashMap<String, Value>,
    ) {
        carry_write_only(self.attributes.values(), source, target);
    }

    /// Validate resource attributes
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        // Check required attributes
        for (name, schema) in &self.attributes {
            if schema.required && !attributes.contains_key(name) {
                errors.push(TypeError::MissingRequired { name: name.clone() });
            }
        }

        for (name, value) in attributes {
            match self.attributes.get(name) {
                Some(schema) if schema.computed => {
                    errors.push(TypeError::ComputedAttribute { name: name.clone() })
                }
                Some(schema) => {
                    if let Err(e) = schema.attr_type.validate(value) {
                        errors.push(TypeError::MapValueError {
                            key: name.clone(),
                            inner: Box::new(e),
                        });
                    }
                }
                None => errors.push(TypeError::UnknownAttribute { name: name.clone() }),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn carry_write_only<'a>(
    schemas: impl Iterator<Item = &'a AttributeSchema>,
    source: &HashMap<String, Value>,
    target: &mut HashMap<String, Value>,
) {
    for schema in schemas {
        let Some(value) = source.get(&schema.name) else {
            continue;
        };
        if schema.write_only {
            target
                .entry(schema.name.clone())
                .or_insert_with(|| value.clone());
        } else if let (AttributeType::Block(nested), Value::Map(source)) = (&schema.attr_type, value)
            && let Some(Value::Map(target)) = target.get_mut(&schema.name)
        {
            carry_write_only(nested.iter(), source, target);
        }
    }
}

/// Helper functions for common types
pub mod types {
    use std::sync::LazyLock;

    use regex::Regex;

    use super::*;
    use crate::arn::Arn;

    static NAME: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[a-zA-Z0-9](-*[a-zA-Z0-9]){0,62}$").expect("valid name pattern")
    });

    /// Positive integer type
    pub fn positive_int() -> AttributeType {
        AttributeType::Custom {
            name: "PositiveInt".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| match value {
                Value::Int(n) if *n > 0 => Ok(()),
                _ => Err("Value must be positive".to_string()),
            },
        }
    }

    /// Resource name: alphanumerics separated by hyphens, at most 63 characters
    pub fn resource_name() -> AttributeType {
        AttributeType::Custom {
            name: "ResourceName".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) if NAME.is_match(s) => Ok(()),
                Value::String(s) => Err(format!(
                    "'{}' must be 1-63 alphanumerics or hyphens and start and end alphanumeric",
                    s
                )),
                _ => Err("Expected string".to_string()),
            },
        }
    }

    /// ARN type
    pub fn arn() -> AttributeType {
        AttributeType::Custom {
            name: "Arn".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) => Arn::parse(s).map(|_| ()).map_err(|e| e.to_string()),
                _ => Err("Expected string".to_string()),
            },
        }
    }

    /// CIDR block type (e.g., "10.0.0.0/16")
    pub fn cidr() -> AttributeType {
        AttributeType::Custom {
            name: "Cidr".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) => validate_cidr(s),
                _ => Err("Expected string".to_string()),
            },
        }
    }

    pub fn string_list() -> AttributeType {
        AttributeType::List(Box::new(AttributeType::String))
    }

    pub fn tags() -> AttributeType {
        AttributeType::Map(Box::new(AttributeType::String))
    }

    pub fn enumeration(variants: &[&str]) -> AttributeType {
        AttributeType::Enum(variants.iter().map(|v| v.to_string()).collect())
    }
}

/// Validate CIDR block format (e.g., "10.0.0.0/16")
pub fn validate_cidr(cidr: &str) -> Result<(), String> {
    let Some((ip, prefix)) = cidr.split_once('/') else {
        return Err(format!("Invalid CIDR format '{}': expected IP/prefix", cidr));
    };

    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() != 4 {
        return Err(format!("Invalid IP address '{}': expected 4 octets", ip));
    }
    if let Some(octet) = octets.iter().find(|o| o.parse::<u8>().is_err()) {
        return Err(format!(
            "Invalid octet '{}' in IP address: must be 0-255",
            octet
        ));
    }

    match prefix.parse::<u8>() {
        Ok(p) if p <= 32 => Ok(()),
        Ok(p) => Err(format!("Invalid prefix length '{}': must be 0-32", p)),
        Err(_) => Err(format!(
            "Invalid prefix length '{}': must be a number",
            prefix
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_enum_type() {
        let t = types::enumeration(&["IAM", "SSO"]);
        assert!(t.validate(&Value::from("IAM")).is_ok());
        assert!(t.validate(&Value::from("LDAP")).is_err());
    }

    #[test]
    fn validate_positive_int() {
        let t = types::positive_int();
        assert!(t.validate(&Value::Int(5)).is_ok());
        assert!(t.validate(&Value::Int(0)).is_err());
        assert!(t.validate(&Value::from("5")).is_err());
    }

    #[test]
    fn validate_resource_name() {
        let t = types::resource_name();
        assert!(t.validate(&Value::from("research-team-1")).is_ok());
        assert!(t.validate(&Value::from("-leading")).is_err());
        assert!(t.validate(&Value::from("under_score")).is_err());
        assert!(t.validate(&Value::from("a".repeat(64))).is_err());
    }

    #[test]
    fn validate_arn_type() {
        let t = types::arn();
        assert!(
            t.validate(&Value::from("arn:aws:iam::123456789012:role/sagemaker"))
                .is_ok()
        );
        assert!(t.validate(&Value::from("role/sagemaker")).is_err());
    }

    #[test]
    fn validate_block() {
        let block = AttributeType::Block(vec![
            AttributeSchema::new("execution_role", types::arn()).required(),
            AttributeSchema::new("security_groups", types::string_list()),
        ]);

        let mut map = HashMap::new();
        map.insert(
            "execution_role".to_string(),
            Value::from("arn:aws:iam::123456789012:role/x"),
        );
        assert!(block.validate(&Value::Map(map.clone())).is_ok());

        map.insert("unknown".to_string(), Value::Bool(true));
        assert!(matches!(
            block.validate(&Value::Map(map)),
            Err(TypeError::UnknownAttribute { .. })
        ));

        assert!(matches!(
            block.validate(&Value::Map(HashMap::new())),
            Err(TypeError::MissingRequired { .. })
        ));
    }

    #[test]
    fn validate_resource_schema() {
        let schema = ResourceSchema::new("sagemaker_image")
            .attribute(AttributeSchema::new("image_name", types::resource_name()).required())
            .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
            .attribute(AttributeSchema::new("tags", types::tags()));

        let mut attrs = HashMap::new();
        attrs.insert("image_name".to_string(), Value::from("my-image"));
        assert!(schema.validate(&attrs).is_ok());

        attrs.insert("arn".to_string(), Value::from("arn:aws:sagemaker:x:1:image/y"));
        attrs.insert("bogus".to_string(), Value::Int(1));
        let errors = schema.validate(&attrs).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn missing_required_attribute() {
        let schema = ResourceSchema::new("sagemaker_image")
            .attribute(AttributeSchema::new("image_name", AttributeType::String).required());
        assert!(schema.validate(&HashMap::new()).is_err());
    }

    #[test]
    fn unresolved_reference_is_deferred() {
        let t = types::arn();
        assert!(t.validate(&Value::from("${sagemaker_image.base.arn}")).is_ok());
        assert!(types::positive_int().validate(&Value::from("${x.y.z}")).is_ok());
    }

    #[test]
    fn validate_cidr_type() {
        let t = types::cidr();
        assert!(t.validate(&Value::from("10.0.0.0/16")).is_ok());
        assert!(t.validate(&Value::from("0.0.0.0/0")).is_ok());
        assert!(t.validate(&Value::from("10.0.0.0")).is_err());
        assert!(t.validate(&Value::from("10.0.0.0/33")).is_err());
        assert!(t.validate(&Value::from("10.0.0.256/16")).is_err());
        assert!(t.validate(&Value::Int(42)).is_err());
    }

    #[test]
    fn write_only_values_are_carried() {
        let schema = ResourceSchema::new("sagemaker_workforce")
            .attribute(
                AttributeSchema::new(
                    "oidc_config",
                    AttributeType::Block(vec![
                        AttributeSchema::new("client_id", AttributeType::String),
                        AttributeSchema::new("client_secret", AttributeType::String).write_only(),
                    ]),
                ),
            )
            .attribute(AttributeSchema::new("token", AttributeType::String).write_only());

        let mut oidc = HashMap::new();
        oidc.insert("client_id".to_string(), Value::from("client"));
        oidc.insert("client_secret".to_string(), Value::from("secret"));
        let mut desired = HashMap::new();
        desired.insert("oidc_config".to_string(), Value::Map(oidc.clone()));
        desired.insert("token".to_string(), Value::from("t"));

        oidc.remove("client_secret");
        let mut read = HashMap::new();
        read.insert("oidc_config".to_string(), Value::Map(oidc));

        schema.carry_write_only(&desired, &mut read);
        assert_eq!(read, desired);
    }
}
