//! Variable environment threaded through action execution.

use std::collections::hash_map;
use std::collections::HashMap;

/// Suffix of the zero-based iteration companion of a loop variable.
pub const ITERATION_SUFFIX: &str = "_iteration";

/// Mutable string-to-string variable mapping.
///
/// One environment is scoped to a control-file invocation and passed by
/// mutable reference through the recursion, so nested actions see and can
/// change the variables of the enclosing actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    values: HashMap<String, String>,
}

impl Variables {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a variable value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|s| s.as_str())
    }

    /// Set a variable value, returning the previous one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(name.into(), value.into())
    }

    /// Remove a variable, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.values.remove(name)
    }

    /// Check if a variable is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, String> {
        self.values.iter()
    }

    /// Apply a `name=value` assignment. Returns false if `text` is not one.
    pub fn assign(&mut self, text: &str) -> bool {
        match parse_assignment(text) {
            Some((name, value)) => {
                self.set(name, value);
                true
            }
            None => false,
        }
    }
}

impl FromIterator<(String, String)> for Variables {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl Extend<(String, String)> for Variables {
    fn extend<I: IntoIterator<Item = (String, String)>>(&mut self, iter: I) {
        self.values.extend(iter);
    }
}

/// Split `name=value` into its parts. The name must be non-empty.
pub fn parse_assignment(text: &str) -> Option<(&str, &str)> {
    let (name, value) = text.split_once('=')?;
    if name.is_empty() {
        return None;
    }
    Some((name, value))
}

/// Saved state of a loop variable and its `_iteration` companion.
///
/// Created before a loop starts; [`LoopVariable::restore`] puts back the
/// values the enclosing scope had so sibling and parent actions are not
/// affected by the loop.
#[derive(Debug)]
pub struct LoopVariable {
    name: String,
    iteration_name: String,
    previous: Option<String>,
    previous_iteration: Option<String>,
}

impl LoopVariable {
    /// Remember the current values of `name` and `name_iteration`.
    pub fn save(variables: &Variables, name: impl Into<String>) -> Self {
        let name = name.into();
        let iteration_name = format!("{}{}", name, ITERATION_SUFFIX);
        Self {
            previous: variables.get(&name).map(str::to_string),
            previous_iteration: variables.get(&iteration_name).map(str::to_string),
            name,
            iteration_name,
        }
    }

    /// Bind the loop value and the zero-based iteration index.
    pub fn bind(&self, variables: &mut Variables, value: &str, iteration: usize) {
        variables.set(self.name.clone(), value);
        variables.set(self.iteration_name.clone(), iteration.to_string());
    }

    /// Restore the saved values, removing variables that did not exist.
    pub fn restore(self, variables: &mut Variables) {
        match self.previous {
            Some(value) => variables.set(self.name, value),
            None => variables.remove(&self.name),
        };
        match self.previous_iteration {
            Some(value) => variables.set(self.iteration_name, value),
            None => variables.remove(&self.iteration_name),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variables_basic() {
        let mut vars = Variables::new();
        assert!(vars.is_empty());
        assert_eq!(vars.set("name", "test"), None);
        assert_eq!(vars.set("name", "other"), Some("test".to_string()));
        assert_eq!(vars.get("name"), Some("other"));
        assert_eq!(vars.get("missing"), None);
        assert_eq!(vars.remove("name"), Some("other".to_string()));
        assert!(!vars.contains("name"));
    }

    #[test]
    fn test_assignment() {
        let mut vars = Variables::new();
        assert!(vars.assign("x=1=2"));
        assert_eq!(vars.get("x"), Some("1=2"));
        assert!(vars.assign("empty="));
        assert_eq!(vars.get("empty"), Some(""));
        assert!(!vars.assign("=value"));
        assert!(!vars.assign("plain"));
    }

    #[test]
    fn test_loop_variable_restores_previous() {
        let mut vars = Variables::new();
        vars.set("i", "outer");

        let saved = LoopVariable::save(&vars, "i");
        saved.bind(&mut vars, "3", 2);
        assert_eq!(vars.get("i"), Some("3"));
        assert_eq!(vars.get("i_iteration"), Some("2"));

        saved.restore(&mut vars);
        assert_eq!(vars.get("i"), Some("outer"));
        assert!(!vars.contains("i_iteration"));
    }

    #[test]
    fn test_loop_variable_removes_fresh() {
        let mut vars = Variables::new();
        let saved = LoopVariable::save(&vars, "item");
        saved.bind(&mut vars, "a", 0);
        saved.restore(&mut vars);
        assert!(vars.is_empty());
    }
}
