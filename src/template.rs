//! Template-variable substitution seam.
//!
//! The host owns the real substitution service; the adapter only needs the
//! current variable values and a way to run a replacement over an
//! expression. [`StaticVariables`] is a map-backed implementation for
//! hosts without such a service, and for tests.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::DatasourceError;

/// Current value of one template variable, in the shape scoped variable
/// bindings use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopedVar {
    pub selected: bool,
    pub text: String,
    pub value: String,
}

impl ScopedVar {
    /// A selected binding whose text and value are the same string.
    pub fn selected(value: &str) -> Self {
        Self {
            selected: true,
            text: value.to_string(),
            value: value.to_string(),
        }
    }
}

/// Scoped variable bindings, keyed by variable name.
pub type ScopedVars = HashMap<String, ScopedVar>;

/// The host's template-variable service.
pub trait VariableResolver: Send + Sync {
    /// Names and current values of every known template variable.
    fn current_variables(&self) -> Vec<(String, String)>;

    /// Substitute variable references in `expr` using `scoped`.
    fn replace(&self, expr: &str, scoped: &ScopedVars) -> Result<String, DatasourceError>;
}

/// Bindings for every variable the resolver knows, in the shape
/// [`VariableResolver::replace`] consumes.
pub fn scoped_bindings(resolver: &dyn VariableResolver) -> ScopedVars {
    resolver
        .current_variables()
        .into_iter()
        .map(|(name, value)| (name, ScopedVar::selected(&value)))
        .collect()
}

/// Map-backed resolver substituting `$name` and `${name}` references.
/// Unknown references are left untouched.
#[derive(Debug, Default, Clone)]
pub struct StaticVariables {
    variables: HashMap<String, String>,
}

impl StaticVariables {
    pub fn new(variables: HashMap<String, String>) -> Self {
        Self { variables }
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.variables.insert(name.to_string(), value.to_string());
    }
}

impl VariableResolver for StaticVariables {
    fn current_variables(&self) -> Vec<(String, String)> {
        let mut variables: Vec<_> = self
            .variables
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        variables.sort();
        variables
    }

    fn replace(&self, expr: &str, scoped: &ScopedVars) -> Result<String, DatasourceError> {
        let mut out = String::with_capacity(expr.len());
        let mut rest = expr;
        while let Some(idx) = rest.find('$') {
            out.push_str(&rest[..idx]);
            let after = &rest[idx + 1..];

            // "${name}" or "$name"; consumed counts from the '$'.
            let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
                match braced.find('}') {
                    Some(end) => (&braced[..end], end + 3),
                    None => ("", 0),
                }
            } else {
                let end = after
                    .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                    .unwrap_or(after.len());
                (&after[..end], end + 1)
            };

            match scoped.get(name) {
                Some(var) if !name.is_empty() => {
                    out.push_str(&var.value);
                    rest = &rest[idx + consumed..];
                }
                _ => {
                    out.push('$');
                    rest = &rest[idx + 1..];
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}
