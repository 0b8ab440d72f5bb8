//! Form Engine - Per-Field State Container
//!
//! Each field moves Pristine -> (validated) Valid | Invalid, and back to
//! Pristine only through `reset_form`. The key set is fixed at construction.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::validators::{first_error, Validator};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("Unknown field: {0}")]
    UnknownField(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub value: String,
    /// Empty means no error recorded
    pub error: String,
    pub touched: bool,
}

impl FieldRecord {
    fn pristine(value: &str) -> Self {
        Self {
            value: value.to_string(),
            error: String::new(),
            touched: false,
        }
    }
}

/// Ordered validator chains keyed by field.
#[derive(Debug, Clone)]
pub struct RuleSet<K = String> {
    rules: BTreeMap<K, Vec<Validator>>,
}

impl<K: Ord> RuleSet<K> {
    pub fn new() -> Self {
        Self { rules: BTreeMap::new() }
    }

    /// Builder form of `insert`
    pub fn field(
        mut self,
        key: impl Into<K>,
        validators: impl IntoIterator<Item = Validator>,
    ) -> Self {
        self.insert(key, validators);
        self
    }

    pub fn insert(&mut self, key: impl Into<K>, validators: impl IntoIterator<Item = Validator>) {
        self.rules.insert(key.into(), validators.into_iter().collect());
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&[Validator]>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.rules.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &[Validator])> {
        self.rules.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<K: Ord> Default for RuleSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable view of the whole form, for rendering or reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot<K: Ord = String> {
    pub fields: BTreeMap<K, FieldRecord>,
    pub has_errors: bool,
    pub is_valid: bool,
}

#[derive(Debug, Clone)]
pub struct FormEngine<K = String> {
    fields: BTreeMap<K, FieldRecord>,
    initial_values: BTreeMap<K, String>,
}

impl<K: Ord + Clone + Debug> FormEngine<K> {
    /// One pristine field per key of `initial_values`.
    pub fn new<I, V>(initial_values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        V: Into<String>,
    {
        let initial_values: BTreeMap<K, String> = initial_values
            .into_iter()
            .map(|(k, v)| (k, v.into()))
            .collect();
        let fields = initial_values
            .iter()
            .map(|(k, v)| (k.clone(), FieldRecord::pristine(v)))
            .collect();
        Self { fields, initial_values }
    }

    fn record_mut<Q>(&mut self, name: &Q) -> Result<&mut FieldRecord, FormError>
    where
        K: Borrow<Q>,
        Q: Ord + Debug + ?Sized,
    {
        self.fields
            .get_mut(name)
            .ok_or_else(|| FormError::UnknownField(format!("{:?}", name)))
    }

    /// Write a value. The stored error is left as-is even when the field is
    /// touched; re-validation is the caller's call (see `change_field`).
    pub fn set_field<Q>(&mut self, name: &Q, value: impl Into<String>) -> Result<(), FormError>
    where
        K: Borrow<Q>,
        Q: Ord + Debug + ?Sized,
    {
        self.record_mut(name)?.value = value.into();
        Ok(())
    }

    pub fn set_field_error<Q>(
        &mut self,
        name: &Q,
        error: impl Into<String>,
    ) -> Result<(), FormError>
    where
        K: Borrow<Q>,
        Q: Ord + Debug + ?Sized,
    {
        self.record_mut(name)?.error = error.into();
        Ok(())
    }

    pub fn set_field_touched<Q>(&mut self, name: &Q, touched: bool) -> Result<(), FormError>
    where
        K: Borrow<Q>,
        Q: Ord + Debug + ?Sized,
    {
        self.record_mut(name)?.touched = touched;
        Ok(())
    }

    pub fn field<Q>(&self, name: &Q) -> Option<&FieldRecord>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.fields.get(name)
    }

    pub fn field_value<Q>(&self, name: &Q) -> &str
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.field(name).map_or("", |f| f.value.as_str())
    }

    pub fn field_error<Q>(&self, name: &Q) -> &str
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.field(name).map_or("", |f| f.error.as_str())
    }

    pub fn is_field_touched<Q>(&self, name: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.field(name).map_or(false, |f| f.touched)
    }

    /// Error to display: only once the field is touched.
    pub fn visible_error<Q>(&self, name: &Q) -> Option<&str>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.field(name)
            .filter(|f| f.touched && !f.error.is_empty())
            .map(|f| f.error.as_str())
    }

    pub fn is_field_dirty<Q>(&self, name: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match (self.fields.get(name), self.initial_values.get(name)) {
            (Some(field), Some(initial)) => field.value != *initial,
            _ => false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.fields
            .iter()
            .any(|(k, f)| self.initial_values.get(k).map_or(false, |v| *v != f.value))
    }

    /// True if any field has an error, touched or not.
    pub fn has_errors(&self) -> bool {
        self.fields.values().any(|f| !f.error.is_empty())
    }

    /// Confirmed valid: no errors and every field touched at least once.
    pub fn is_valid(&self) -> bool {
        !self.has_errors() && self.fields.values().all(|f| f.touched)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &K> {
        self.fields.keys()
    }

    pub fn values(&self) -> BTreeMap<K, String> {
        self.fields
            .iter()
            .map(|(k, f)| (k.clone(), f.value.clone()))
            .collect()
    }

    /// Run `validators` over the current value, stopping at the first failure.
    /// Does not mark the field touched.
    pub fn validate_field<Q>(
        &mut self,
        name: &Q,
        validators: &[Validator],
    ) -> Result<bool, FormError>
    where
        K: Borrow<Q>,
        Q: Ord + Debug + ?Sized,
    {
        let record = self.record_mut(name)?;
        let outcome = first_error(validators, &record.value);
        let ok = outcome.is_none();
        record.error = outcome.unwrap_or_default();
        debug!(field = ?name, ok, error = %record.error, "validated field");
        Ok(ok)
    }

    /// Validate and touch every field named in `rules`; others are left alone.
    /// Unknown keys are rejected before any field is modified.
    pub fn validate_form(&mut self, rules: &RuleSet<K>) -> Result<bool, FormError> {
        if let Some((key, _)) = rules.iter().find(|(k, _)| !self.fields.contains_key(*k)) {
            return Err(FormError::UnknownField(format!("{:?}", key)));
        }

        let mut all_valid = true;
        for (key, validators) in rules.iter() {
            let ok = self.validate_field(key, validators)?;
            self.set_field_touched(key, true)?;
            all_valid &= ok;
        }

        debug!(fields = rules.len(), valid = all_valid, "validated form");
        Ok(all_valid)
    }

    /// Set a value and, if the field was already touched, re-validate it.
    /// Returns whether the field is currently free of errors.
    pub fn change_field<Q>(
        &mut self,
        name: &Q,
        value: impl Into<String>,
        validators: &[Validator],
    ) -> Result<bool, FormError>
    where
        K: Borrow<Q>,
        Q: Ord + Debug + ?Sized,
    {
        self.set_field(name, value)?;
        if self.is_field_touched(name) {
            self.validate_field(name, validators)
        } else {
            Ok(self.field_error(name).is_empty())
        }
    }

    /// Touch and validate in one step.
    pub fn blur_field<Q>(&mut self, name: &Q, validators: &[Validator]) -> Result<bool, FormError>
    where
        K: Borrow<Q>,
        Q: Ord + Debug + ?Sized,
    {
        self.set_field_touched(name, true)?;
        self.validate_field(name, validators)
    }

    /// Back to the construction-time state.
    pub fn reset_form(&mut self) {
        self.fields = self
            .initial_values
            .iter()
            .map(|(k, v)| (k.clone(), FieldRecord::pristine(v)))
            .collect();
        trace!(fields = self.fields.len(), "form reset");
    }

    pub fn snapshot(&self) -> FormSnapshot<K> {
        FormSnapshot {
            fields: self.fields.clone(),
            has_errors: self.has_errors(),
            is_valid: self.is_valid(),
        }
    }
}
