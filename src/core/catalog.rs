// src/core/catalog.rs

use crate::error::{OptionsError, OptionsResult};
use crate::models::{Scope, Value};

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type ApplicabilityFn = dyn Fn(&Scope) -> bool + Send + Sync;
type ValidateFn = dyn Fn(&mut Value) -> bool + Send + Sync;

/// The declaration of a single named option: its identifier, declared value
/// type, default value, scope-applicability predicate and validator.
///
/// Definitions are owned by the catalog and shared (`Arc`) with the nodes
/// that resolve through them. The engine itself never interprets option
/// values; it only consults the declared [`TypeId`] at the typed API
/// boundary and the validator on writes.
pub struct OptionDefinition {
    name: String,
    value_type: TypeId,
    type_name: &'static str,
    default: Value,
    applicability: Option<Box<ApplicabilityFn>>,
    validator: Option<Box<ValidateFn>>,
}

impl OptionDefinition {
    /// Declares an option of type `T` with the given default value.
    ///
    /// Without further builders the option is applicable to every scope and
    /// accepts any value of the declared type.
    pub fn new<T>(name: impl Into<String>, default: T) -> Self
    where
        T: Any + Send + Sync + fmt::Debug + Clone + PartialEq,
    {
        Self {
            name: name.into(),
            value_type: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            default: Value::of(default),
            applicability: None,
            validator: None,
        }
    }

    /// Restricts the option to scopes accepted by `predicate`.
    ///
    /// The predicate receives the opaque scope handle and typically
    /// downcasts it to the concrete scope type it understands. The global
    /// (scope-less) node is never filtered by this predicate.
    pub fn with_applicability(
        mut self,
        predicate: impl Fn(&Scope) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.applicability = Some(Box::new(predicate));
        self
    }

    /// Installs a validator, consulted on every write.
    ///
    /// The validator may coerce the value in place (e.g. clamp a numeric
    /// range); returning `false` rejects the write.
    pub fn with_validator(
        mut self,
        validator: impl Fn(&mut Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    /// The unique option identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared value type tag.
    pub fn value_type(&self) -> TypeId {
        self.value_type
    }

    /// Human-readable name of the declared type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The value resolved at the root when no override exists anywhere.
    pub fn default_value(&self) -> Value {
        self.default.clone()
    }

    /// Whether this option is meaningful for the given scope.
    pub fn is_applicable_to_scope(&self, scope: &Scope) -> bool {
        self.applicability.as_ref().is_none_or(|pred| pred(scope))
    }

    /// Runs the validator over `value`, which may be coerced in place.
    /// Returns `false` if the value is rejected.
    pub fn validate(&self, value: &mut Value) -> bool {
        self.validator.as_ref().is_none_or(|validate| validate(value))
    }
}

impl fmt::Debug for OptionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionDefinition")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .field("default", &self.default)
            .field("scoped", &self.applicability.is_some())
            .field("validated", &self.validator.is_some())
            .finish()
    }
}

/// The external collaborator that resolves option identifiers to their
/// declarations. The tree delegates every "does this option exist / is it
/// legal here / what is its default" decision to this trait.
pub trait DefinitionCatalog: Send + Sync {
    /// Looks up a definition by identifier.
    fn definition(&self, name: &str) -> Option<Arc<OptionDefinition>>;

    /// Like [`Self::definition`], but missing identifiers become
    /// [`OptionsError::UnknownOption`].
    fn definition_or_fail(&self, name: &str) -> OptionsResult<Arc<OptionDefinition>> {
        self.definition(name).ok_or_else(|| OptionsError::UnknownOption {
            name: name.to_string(),
        })
    }

    /// All definitions applicable to the given scope (`None` = the global,
    /// unscoped node, for which every definition applies).
    fn supported_options(&self, scope: Option<&Scope>) -> Vec<Arc<OptionDefinition>>;

    /// The definitions actually realized/tracked for the given scope, used
    /// when a node is re-parented and its visible values must be
    /// re-evaluated. Catalogs that do not track realization may simply
    /// answer with [`Self::supported_options`].
    fn instantiated_options(&self, scope: Option<&Scope>) -> Vec<Arc<OptionDefinition>>;
}

/// A minimal, fixed catalog over a hash map.
///
/// Suitable for embedders whose option set is known up front, and for tests.
/// Its `instantiated_options` answers with every applicable definition, so a
/// re-parented node re-evaluates options it has never touched as well.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    definitions: HashMap<String, Arc<OptionDefinition>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition, replacing any previous one with the same name.
    pub fn register(mut self, definition: OptionDefinition) -> Self {
        if let Some(previous) = self
            .definitions
            .insert(definition.name.clone(), Arc::new(definition))
        {
            log::warn!("Option '{}' was registered twice; keeping the latest definition.", previous.name());
        }
        self
    }
}

impl DefinitionCatalog for StaticCatalog {
    fn definition(&self, name: &str) -> Option<Arc<OptionDefinition>> {
        self.definitions.get(name).cloned()
    }

    fn supported_options(&self, scope: Option<&Scope>) -> Vec<Arc<OptionDefinition>> {
        self.definitions
            .values()
            .filter(|def| scope.is_none_or(|scope| def.is_applicable_to_scope(scope)))
            .cloned()
            .collect()
    }

    fn instantiated_options(&self, scope: Option<&Scope>) -> Vec<Arc<OptionDefinition>> {
        self.supported_options(scope)
    }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;

    struct EditorScope;

    fn scope_of<T: Send + Sync + 'static>(value: T) -> Scope {
        Arc::new(value)
    }

    fn catalog() -> StaticCatalog {
        StaticCatalog::new()
            .register(
                OptionDefinition::new("tab_size", 4i64).with_validator(|value| {
                    // Clamp instead of rejecting non-positive sizes.
                    match value.downcast::<i64>() {
                        Some(size) if size < 1 => {
                            *value = Value::of(1i64);
                            true
                        }
                        Some(_) => true,
                        None => false,
                    }
                }),
            )
            .register(
                OptionDefinition::new("word_wrap", false)
                    .with_applicability(|scope| scope.downcast_ref::<EditorScope>().is_some()),
            )
    }

    #[test]
    fn definition_lookup_and_or_fail() {
        let catalog = catalog();
        assert!(catalog.definition("tab_size").is_some());
        assert!(catalog.definition("no_such_option").is_none());

        let err = catalog.definition_or_fail("no_such_option").unwrap_err();
        assert!(matches!(err, OptionsError::UnknownOption { name } if name == "no_such_option"));
    }

    #[test]
    fn supported_options_filter_by_applicability() {
        let catalog = catalog();

        // The global (scope-less) view sees everything.
        let all: Vec<_> = catalog.supported_options(None);
        assert_eq!(all.len(), 2);

        let editor = scope_of(EditorScope);
        let names: Vec<_> = catalog
            .supported_options(Some(&editor))
            .into_iter()
            .map(|def| def.name().to_string())
            .collect();
        assert!(names.contains(&"word_wrap".to_string()));

        let other = scope_of("not an editor");
        let names: Vec<_> = catalog
            .supported_options(Some(&other))
            .into_iter()
            .map(|def| def.name().to_string())
            .collect();
        assert_eq!(names, vec!["tab_size".to_string()]);
    }

    #[test]
    fn validator_may_coerce_in_place() {
        let catalog = catalog();
        let def = catalog.definition_or_fail("tab_size").unwrap();

        let mut value = Value::of(-3i64);
        assert!(def.validate(&mut value));
        assert_eq!(value, Value::of(1i64));

        let mut wrong_type = Value::of("four");
        assert!(!def.validate(&mut wrong_type));
    }

    #[test]
    fn definition_reports_declared_type() {
        let def = OptionDefinition::new("line_ending", String::from("\n"));
        assert_eq!(def.value_type(), TypeId::of::<String>());
        assert_eq!(def.default_value(), Value::of(String::from("\n")));
    }
}
