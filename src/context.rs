use std::collections::HashMap;

use crate::value::Value;

/// A stack of variable scopes. Lookups walk from the innermost scope
/// outward; a name bound nowhere resolves to [`Value::Null`].
#[derive(Debug, Clone)]
pub struct Context {
    scopes: Vec<HashMap<String, Value>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    /// Builder-style insert into the innermost scope.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Binds `name` in the innermost scope.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value.into());
        }
    }

    pub fn get(&self, name: &str) -> Value {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// The outermost scope is never popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Collapses all scopes into one, inner bindings shadowing outer ones.
    pub fn flatten(&self) -> Context {
        let mut merged = HashMap::new();
        for scope in &self.scopes {
            merged.extend(scope.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Context {
            scopes: vec![merged],
        }
    }
}

impl From<HashMap<String, Value>> for Context {
    fn from(scope: HashMap<String, Value>) -> Self {
        Self {
            scopes: vec![scope],
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let scope = iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self {
            scopes: vec![scope],
        }
    }
}
