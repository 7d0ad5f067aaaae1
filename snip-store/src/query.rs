//! Parameterised document queries

use serde_json::Value;

/// Alias the rendered query text uses for the collection
const ALIAS: &str = "c";

/// An equality condition on a top-level document property
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Document property name
    pub field: String,
    /// Value the property must equal
    pub value: Value,
}

impl Condition {
    /// Parameter name bound for this condition
    pub fn parameter_name(&self) -> String {
        format!("@{}", self.field)
    }

    /// Check a document against this condition
    pub fn matches(&self, document: &Value) -> bool {
        document.get(&self.field) == Some(&self.value)
    }
}

/// Query over one collection.
///
/// Backends evaluate the structured conditions; `text()` and `parameters()`
/// give the equivalent SQL-like form for logging and for stores that accept
/// query text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    conditions: Vec<Condition>,
}

impl Query {
    /// Select every document
    pub fn select_all() -> Self {
        Self::default()
    }

    /// Require `field == value`
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Conditions in declaration order
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Check a document against all conditions
    pub fn matches(&self, document: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(document))
    }

    /// Rendered query text
    pub fn text(&self) -> String {
        let mut text = format!("SELECT * FROM {ALIAS}");
        for (i, condition) in self.conditions.iter().enumerate() {
            text.push_str(if i == 0 { " WHERE " } else { " AND " });
            text.push_str(&format!(
                "{ALIAS}.{} = {}",
                condition.field,
                condition.parameter_name()
            ));
        }
        text
    }

    /// Bound parameters as `(name, value)` pairs
    pub fn parameters(&self) -> Vec<(String, Value)> {
        self.conditions
            .iter()
            .map(|c| (c.parameter_name(), c.value.clone()))
            .collect()
    }
}
