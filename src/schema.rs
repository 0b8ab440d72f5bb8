//! Form Schemas - Declarative Field and Rule Tables
//!
//! A schema declares the fields of one form and the ordered rule chain of each.
//! Rule sets are rebuilt from the live engine on every pass, so cross-field
//! rules always compare against the current value of their dependency.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::form::{FormEngine, FormError, RuleSet};
use crate::validators::{self, Validator};

pub type SchemaId = String;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    #[error("Schema {0} declares no fields")]
    EmptySchema(String),

    #[error("Schema {schema} declares field {field} more than once")]
    DuplicateField { schema: String, field: String },

    #[error("Field {field} depends on undeclared field {depends_on}")]
    UnknownDependency { field: String, depends_on: String },

    #[error(transparent)]
    Form(#[from] FormError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    pub id: SchemaId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub initial: String,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "rule", rename_all = "camelCase")]
pub enum RuleSpec {
    /// Uses the field label unless overridden
    Required {
        #[serde(default)]
        label: Option<String>,
    },
    Email,
    MinLength { min: usize },
    MaxLength { max: usize },
    Password,
    ConfirmPassword { field: String },
    Name,
}

impl FormSchema {
    /// Structural checks; run once when a schema is registered.
    pub fn check(&self) -> Result<(), SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::EmptySchema(self.id.clone()));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    schema: self.id.clone(),
                    field: field.name.clone(),
                });
            }
        }

        for field in &self.fields {
            for rule in &field.rules {
                if let RuleSpec::ConfirmPassword { field: other } = rule {
                    if !seen.contains(other.as_str()) {
                        return Err(SchemaError::UnknownDependency {
                            field: field.name.clone(),
                            depends_on: other.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Fresh engine seeded with the declared initial values
    pub fn engine(&self) -> FormEngine {
        FormEngine::new(
            self.fields
                .iter()
                .map(|f| (f.name.clone(), f.initial.clone())),
        )
    }

    /// Build every field's chain against the engine's current values.
    pub fn rules(&self, engine: &FormEngine) -> RuleSet {
        let mut rules = RuleSet::new();
        for field in &self.fields {
            let chain: Vec<Validator> = field
                .rules
                .iter()
                .map(|spec| build_validator(spec, field, engine))
                .collect();
            rules.insert(field.name.clone(), chain);
        }
        rules
    }

    /// Chain for a single field, e.g. on blur or change.
    pub fn field_rules(
        &self,
        engine: &FormEngine,
        name: &str,
    ) -> Result<Vec<Validator>, SchemaError> {
        let field = self
            .fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| FormError::UnknownField(format!("{:?}", name)))?;
        Ok(field
            .rules
            .iter()
            .map(|spec| build_validator(spec, field, engine))
            .collect())
    }

    /// Write a submitted payload into the engine. A payload with any unknown
    /// key is rejected before a field is written.
    pub fn apply(
        &self,
        engine: &mut FormEngine,
        values: &BTreeMap<String, String>,
    ) -> Result<(), SchemaError> {
        if let Some(name) = values.keys().find(|k| engine.field(k.as_str()).is_none()) {
            return Err(FormError::UnknownField(format!("{:?}", name)).into());
        }
        for (name, value) in values {
            engine.set_field(name.as_str(), value.as_str())?;
        }
        Ok(())
    }
}

fn build_validator(spec: &RuleSpec, field: &FieldSchema, engine: &FormEngine) -> Validator {
    match spec {
        RuleSpec::Required { label } => {
            validators::required(label.clone().unwrap_or_else(|| field.label.clone()))
        }
        RuleSpec::Email => validators::email(),
        RuleSpec::MinLength { min } => validators::min_length(*min),
        RuleSpec::MaxLength { max } => validators::max_length(*max),
        RuleSpec::Password => validators::password(),
        RuleSpec::ConfirmPassword { field: other } => {
            validators::confirm_password(engine.field_value(other.as_str()))
        }
        RuleSpec::Name => validators::name(),
    }
}

/// Schema registry - loads and caches schemas
pub struct SchemaRegistry {
    schemas: HashMap<SchemaId, FormSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self { schemas: HashMap::new() }
    }

    /// Load every `*.json` schema in `dir`. Files that fail to parse or check
    /// are skipped.
    pub fn load_from_dir(dir: &Path) -> Result<Self, SchemaError> {
        let mut registry = Self::new();
        if dir.exists() {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if path.extension().map_or(false, |e| e == "json") {
                    match load_schema(&path).and_then(|s| registry.register(s)) {
                        Ok(()) => {}
                        Err(e) => warn!(path = %path.display(), error = %e, "skipping schema"),
                    }
                }
            }
        }
        Ok(registry)
    }

    pub fn register(&mut self, schema: FormSchema) -> Result<(), SchemaError> {
        schema.check()?;
        debug!(schema = %schema.id, fields = schema.fields.len(), "registered schema");
        self.schemas.insert(schema.id.clone(), schema);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&FormSchema, SchemaError> {
        self.schemas
            .get(id)
            .ok_or_else(|| SchemaError::SchemaNotFound(id.to_string()))
    }

    /// Sorted by id
    pub fn list(&self) -> Vec<&FormSchema> {
        let mut schemas: Vec<_> = self.schemas.values().collect();
        schemas.sort_by(|a, b| a.id.cmp(&b.id));
        schemas
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn load_schema(path: &Path) -> Result<FormSchema, SchemaError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reset_password_schema() -> FormSchema {
        serde_json::from_value(json!({
            "id": "reset-password",
            "name": "Reset Password",
            "fields": [
                {"name": "password", "label": "Password",
                 "rules": [{"rule": "required"}, {"rule": "password"}]},
                {"name": "confirmPassword", "label": "Confirm Password",
                 "rules": [{"rule": "required"}, {"rule": "confirmPassword", "field": "password"}]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_rule_spec_tags() {
        let spec: RuleSpec =
            serde_json::from_value(json!({"rule": "minLength", "min": 3})).unwrap();
        assert_eq!(spec, RuleSpec::MinLength { min: 3 });
        let spec: RuleSpec = serde_json::from_value(json!({"rule": "required"})).unwrap();
        assert_eq!(spec, RuleSpec::Required { label: None });
    }

    #[test]
    fn test_confirm_rebuilt_from_live_value() {
        let schema = reset_password_schema();
        schema.check().unwrap();
        let mut engine = schema.engine();

        engine.set_field("password", "Abcdefg1!").unwrap();
        engine.set_field("confirmPassword", "Abcdefg1!").unwrap();
        assert!(engine.validate_form(&schema.rules(&engine)).unwrap());

        // password changes; stale confirmation must now fail
        engine.set_field("password", "Zyxwvut9?").unwrap();
        let chain = schema.field_rules(&engine, "confirmPassword").unwrap();
        assert!(!engine.validate_field("confirmPassword", &chain).unwrap());
        assert_eq!(engine.field_error("confirmPassword"), "Passwords do not match");
    }

    #[test]
    fn test_required_label_defaults_to_field_label() {
        let schema = reset_password_schema();
        let mut engine = schema.engine();
        assert!(!engine.validate_form(&schema.rules(&engine)).unwrap());
        assert_eq!(engine.field_error("confirmPassword"), "Confirm Password is required");
    }

    #[test]
    fn test_check_rejects_bad_schemas() {
        let mut schema = reset_password_schema();
        schema.fields[1].rules = vec![RuleSpec::ConfirmPassword { field: "pin".into() }];
        assert!(matches!(schema.check(), Err(SchemaError::UnknownDependency { .. })));

        let mut schema = reset_password_schema();
        schema.fields[1].name = "password".into();
        assert!(matches!(schema.check(), Err(SchemaError::DuplicateField { .. })));

        let mut schema = reset_password_schema();
        schema.fields.clear();
        assert!(matches!(schema.check(), Err(SchemaError::EmptySchema(_))));
    }

    #[test]
    fn test_apply_rejects_unknown_keys() {
        let schema = reset_password_schema();
        let mut engine = schema.engine();
        let mut payload = BTreeMap::new();
        payload.insert("confirmPassword".to_string(), "Abcdefg1!".to_string());
        payload.insert("otp".to_string(), "123456".to_string());
        payload.insert("password".to_string(), "Abcdefg1!".to_string());
        assert!(matches!(
            schema.apply(&mut engine, &payload),
            Err(SchemaError::Form(FormError::UnknownField(_)))
        ));

        // keys sorted before and after the bad one are both left alone
        assert_eq!(engine.field_value("confirmPassword"), "");
        assert_eq!(engine.field_value("password"), "");
        assert!(!engine.is_dirty());
    }

    #[test]
    fn test_field_rules_unknown_field() {
        let schema = reset_password_schema();
        let engine = schema.engine();
        assert!(matches!(
            schema.field_rules(&engine, "pin"),
            Err(SchemaError::Form(FormError::UnknownField(_)))
        ));
        assert_eq!(schema.field_rules(&engine, "password").unwrap().len(), 2);
    }

    #[test]
    fn test_load_from_dir_skips_invalid() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("reset.json"),
            serde_json::to_string(&reset_password_schema()).unwrap(),
        )
        .unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = SchemaRegistry::load_from_dir(dir.path()).unwrap();
        assert_eq!(registry.list().len(), 1);
        assert!(registry.get("reset-password").is_ok());
        assert!(matches!(registry.get("login"), Err(SchemaError::SchemaNotFound(_))));
    }
}
