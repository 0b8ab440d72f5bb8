//! FormState Core - Form State and Validation Engine
//!
//! # The Rules
//! 1. Fields Are Fixed At Construction
//! 2. First Failure Wins
//! 3. Validation Reports, Callers Decide
//! 4. Valid Means Confirmed Valid
//! 5. Cross-Field Rules Are Rebuilt, Never Mutated

pub mod form;
pub mod schema;
pub mod validators;

pub use form::{FieldRecord, FormEngine, FormError, FormSnapshot, RuleSet};
pub use schema::{FieldSchema, FormSchema, RuleSpec, SchemaError, SchemaRegistry};
pub use validators::{first_error, Validator};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
