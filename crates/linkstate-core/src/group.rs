//! Variable groups and the group registry
//!
//! A group is a namespace of named variables shared by independent consumers.
//! Groups are deduplicated by name within a `Registry`: asking for the same
//! name twice yields the same instance. The registry is constructed
//! explicitly by the host and passed to whatever wires up the handles; there
//! is no ambient global state.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{LinkError, LinkResult, Value, Variable};

/// Well-known variable carrying the aggregated filter value.
pub const FILTER_VAR: &str = "filter";
/// Well-known variable caching the shared filter set instance.
pub const FILTER_SET_VAR: &str = "filterset";
/// Well-known variable carrying the current selection.
pub const SELECTION_VAR: &str = "selection";

/// A namespace of named variables.
pub struct Group {
    /// `None` is the default group.
    name: Option<String>,
    vars: Mutex<HashMap<String, Arc<Variable>>>,
}

impl Group {
    fn new(name: Option<&str>) -> Self {
        Group {
            name: name.map(str::to_owned),
            vars: Mutex::new(HashMap::new()),
        }
    }

    /// Group name, `None` for the default group.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Look up a variable, creating it lazily on first use.
    ///
    /// The empty string is not a valid variable name.
    pub fn var(&self, name: &str) -> LinkResult<Arc<Variable>> {
        if name.is_empty() {
            return Err(LinkError::InvalidVarName(name.to_owned()));
        }
        let mut vars = self.vars.lock();
        let var = vars
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(Variable::new(self.name.as_deref(), name)))
            .clone();
        Ok(var)
    }

    /// Whether a variable already exists, without creating it.
    pub fn has(&self, name: &str) -> LinkResult<bool> {
        if name.is_empty() {
            return Err(LinkError::InvalidVarName(name.to_owned()));
        }
        Ok(self.vars.lock().contains_key(name))
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vars: Vec<String> = self.vars.lock().keys().cloned().collect();
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("vars", &vars)
            .finish()
    }
}

/// How a caller designates a group: resolved before entering the core, in
/// place of name-or-instance duck typing.
#[derive(Clone)]
pub enum GroupSpec {
    /// The registry's default group.
    Default,
    /// A group looked up (and created if needed) by name.
    Named(String),
    /// An already-resolved group instance.
    Instance(Arc<Group>),
}

impl From<&str> for GroupSpec {
    fn from(name: &str) -> Self {
        GroupSpec::Named(name.to_owned())
    }
}

impl From<String> for GroupSpec {
    fn from(name: String) -> Self {
        GroupSpec::Named(name)
    }
}

impl From<Arc<Group>> for GroupSpec {
    fn from(group: Arc<Group>) -> Self {
        GroupSpec::Instance(group)
    }
}

impl From<&Arc<Group>> for GroupSpec {
    fn from(group: &Arc<Group>) -> Self {
        GroupSpec::Instance(Arc::clone(group))
    }
}

/// Registry of groups, deduplicated by name.
///
/// Construct one per host context and pass it to whatever creates handles.
/// Tests get isolation by constructing a fresh registry each.
#[derive(Default)]
pub struct Registry {
    groups: Mutex<HashMap<Option<String>, Arc<Group>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Look up a group by name, creating it on first use. Idempotent: the
    /// same name always yields the same instance.
    pub fn group(&self, name: &str) -> LinkResult<Arc<Group>> {
        if name.is_empty() {
            return Err(LinkError::InvalidGroupName(name.to_owned()));
        }
        Ok(self.group_entry(Some(name)))
    }

    /// The default (unnamed) group.
    pub fn default_group(&self) -> Arc<Group> {
        self.group_entry(None)
    }

    /// Resolve a group designation to an instance.
    pub fn resolve(&self, spec: GroupSpec) -> LinkResult<Arc<Group>> {
        match spec {
            GroupSpec::Default => Ok(self.default_group()),
            GroupSpec::Named(name) => self.group(&name),
            GroupSpec::Instance(group) => Ok(group),
        }
    }

    /// Remote-update ingress: route an externally pushed update to the
    /// addressed variable. This is the sole externally driven write path
    /// that does not originate from a handle.
    pub fn apply_update(
        &self,
        group_name: Option<&str>,
        var_name: &str,
        value: Value,
    ) -> LinkResult<()> {
        let group = match group_name {
            Some(name) => self.group(name)?,
            None => self.default_group(),
        };
        tracing::debug!(
            group = group_name.unwrap_or("<default>"),
            variable = var_name,
            "applying remote update"
        );
        group.var(var_name)?.set(value, None);
        Ok(())
    }

    fn group_entry(&self, name: Option<&str>) -> Arc<Group> {
        let mut groups = self.groups.lock();
        groups
            .entry(name.map(str::to_owned))
            .or_insert_with(|| Arc::new(Group::new(name)))
            .clone()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<Option<String>> = self.groups.lock().keys().cloned().collect();
        f.debug_struct("Registry").field("groups", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_is_memoized_by_name() {
        let registry = Registry::new();
        let a = registry.group("g1").unwrap();
        let b = registry.group("g1").unwrap();
        let c = registry.group("g2").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_default_group_is_distinct() {
        let registry = Registry::new();
        let default = registry.default_group();
        assert!(Arc::ptr_eq(&default, &registry.default_group()));
        assert_eq!(default.name(), None);
        assert!(!Arc::ptr_eq(&default, &registry.group("default").unwrap()));
    }

    #[test]
    fn test_invalid_names_are_errors() {
        let registry = Registry::new();
        assert!(matches!(
            registry.group(""),
            Err(LinkError::InvalidGroupName(_))
        ));

        let group = registry.group("g").unwrap();
        assert!(matches!(group.var(""), Err(LinkError::InvalidVarName(_))));
        assert!(matches!(group.has(""), Err(LinkError::InvalidVarName(_))));
    }

    #[test]
    fn test_var_created_lazily() {
        let registry = Registry::new();
        let group = registry.group("g").unwrap();

        assert!(!group.has("x").unwrap());
        let var = group.var("x").unwrap();
        assert!(group.has("x").unwrap());
        assert!(Arc::ptr_eq(&var, &group.var("x").unwrap()));
    }

    #[test]
    fn test_resolve_group_spec() {
        let registry = Registry::new();
        let named = registry.resolve(GroupSpec::from("g")).unwrap();
        assert!(Arc::ptr_eq(&named, &registry.group("g").unwrap()));

        let default = registry.resolve(GroupSpec::Default).unwrap();
        assert!(Arc::ptr_eq(&default, &registry.default_group()));

        let instance = registry.resolve(GroupSpec::from(&named)).unwrap();
        assert!(Arc::ptr_eq(&instance, &named));
    }

    #[test]
    fn test_apply_update_routes_to_variable() {
        let registry = Registry::new();
        registry
            .apply_update(Some("g"), "x", Value::Int(5))
            .unwrap();
        let var = registry.group("g").unwrap().var("x").unwrap();
        assert_eq!(var.get(), Value::Int(5));

        registry.apply_update(None, "y", Value::from("v")).unwrap();
        assert_eq!(
            registry.default_group().var("y").unwrap().get(),
            Value::from("v")
        );

        assert!(registry.apply_update(Some("g"), "", Value::None).is_err());
    }

    #[test]
    fn test_vars_are_scoped_per_group() {
        let registry = Registry::new();
        let g1 = registry.group("g1").unwrap();
        let g2 = registry.group("g2").unwrap();

        g1.var("x").unwrap().set(Value::Int(1), None);
        assert_eq!(g2.var("x").unwrap().get(), Value::None);
        assert_eq!(g1.var("x").unwrap().scoped_key(), "g1-x");
    }
}
