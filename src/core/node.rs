// src/core/node.rs

use crate::core::catalog::{DefinitionCatalog, OptionDefinition};
use crate::core::events::{SubscriberSet, SubscriptionId};
use crate::error::{OptionsError, OptionsResult};
use crate::models::{OptionChanged, OptionKey, Scope, Value};

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock, Weak};
use uuid::Uuid;

/// One container in the option tree, bound to a scope (or, for the single
/// global node, to none).
///
/// A node owns only its local overrides. Reads walk up the parent chain to
/// the global node's catalog defaults; writes mutate this node alone and fan
/// a change notification out to every live descendant that does not shadow
/// the written option. Parent links are strong (`Arc`) and child links are
/// weak, so a tree never keeps its descendants alive.
///
/// All operations are synchronous. The tree may be shared across threads for
/// reads, but writers to a node (and its ancestors) must be serialized by
/// the caller.
pub struct OptionNode {
    id: Uuid,
    scope: Option<Scope>,
    catalog: Arc<dyn DefinitionCatalog>,
    local: RwLock<HashMap<String, Value>>,
    parent: RwLock<Option<Arc<OptionNode>>>,
    derived: Mutex<Vec<Weak<OptionNode>>>,
    subscribers: SubscriberSet,
}

impl OptionNode {
    /// Creates the distinguished global node: no scope, no parent, resolved
    /// values falling through to the catalog defaults.
    ///
    /// Construct it once at engine initialization and hand it to everything
    /// that needs a fallback; there is no hidden process-wide instance.
    pub fn global(catalog: Arc<dyn DefinitionCatalog>) -> Arc<Self> {
        let node = Arc::new(Self {
            id: Uuid::new_v4(),
            scope: None,
            catalog,
            local: RwLock::new(HashMap::new()),
            parent: RwLock::new(None),
            derived: Mutex::new(Vec::new()),
            subscribers: SubscriberSet::new(),
        });
        log::debug!("Created global option node {}.", node.id);
        node
    }

    /// Creates a child of this node bound to `scope` (or unscoped), and
    /// registers it in this node's derived set.
    pub fn derive(self: &Arc<Self>, scope: Option<Scope>) -> Arc<Self> {
        let child = Arc::new(Self {
            id: Uuid::new_v4(),
            scope,
            catalog: Arc::clone(&self.catalog),
            local: RwLock::new(HashMap::new()),
            parent: RwLock::new(Some(Arc::clone(self))),
            derived: Mutex::new(Vec::new()),
            subscribers: SubscriberSet::new(),
        });
        self.add_derived(&child);
        log::debug!("Derived option node {} from {}.", child.id, self.id);
        child
    }

    /// Stable identity of this node, for logs and diagnostics.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The scope this node configures; `None` only for the global node.
    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    // MARK: --- READ PATH ---

    /// Resolves the current value of `name` at this node: the local
    /// override if one exists, else the nearest ancestor's, else the
    /// catalog default.
    ///
    /// Scope applicability is checked once, here at the originating node;
    /// ancestors are consulted for values only.
    pub fn value(&self, name: &str) -> OptionsResult<Value> {
        let definition = self.catalog.definition_or_fail(name)?;
        self.resolve(&definition)
    }

    /// Typed variant of [`Self::value`]. Fails with
    /// [`OptionsError::TypeMismatch`] before resolving if `T` is not the
    /// declared value type.
    pub fn get<T: Any + Clone>(&self, name: &str) -> OptionsResult<T> {
        let definition = self.catalog.definition_or_fail(name)?;

        if TypeId::of::<T>() != definition.value_type() {
            return Err(OptionsError::TypeMismatch {
                name: name.to_string(),
                requested: type_name::<T>(),
                declared: definition.type_name(),
            });
        }

        let value = self.resolve(&definition)?;
        value
            .downcast::<T>()
            .ok_or_else(|| OptionsError::TypeMismatch {
                name: name.to_string(),
                requested: type_name::<T>(),
                declared: value.type_name(),
            })
    }

    /// Resolves through a typed key.
    pub fn get_by<T: Any + Clone>(&self, key: &OptionKey<T>) -> OptionsResult<T> {
        self.get(key.name())
    }

    fn resolve(&self, definition: &Arc<OptionDefinition>) -> OptionsResult<Value> {
        if let Some(scope) = &self.scope
            && !definition.is_applicable_to_scope(scope)
        {
            return Err(OptionsError::OptionNotApplicable {
                name: definition.name().to_string(),
            });
        }
        Ok(self.resolve_for_child(definition))
    }

    /// Walks local overrides, then the parent chain, then the default.
    /// Applicability must already have been checked at the originating node.
    fn resolve_for_child(&self, definition: &Arc<OptionDefinition>) -> Value {
        if let Some(value) = self.local.read().unwrap().get(definition.name()) {
            return value.clone();
        }
        match self.parent.read().unwrap().as_ref() {
            Some(parent) => parent.resolve_for_child(definition),
            None => definition.default_value(),
        }
    }

    // MARK: --- WRITE PATH ---

    /// Sets a local override for `name` on this node.
    ///
    /// The value's runtime type must match the declared type, and the
    /// definition's validator may coerce or reject it. A change
    /// notification is raised only if the resolved value actually changed.
    pub fn set<T>(&self, name: &str, value: T) -> OptionsResult<()>
    where
        T: Any + Send + Sync + fmt::Debug + Clone + PartialEq,
    {
        self.set_value(name, Value::of(value))
    }

    /// Sets a local override through a typed key.
    pub fn set_by<T>(&self, key: &OptionKey<T>, value: T) -> OptionsResult<()>
    where
        T: Any + Send + Sync + fmt::Debug + Clone + PartialEq,
    {
        self.set_value(key.name(), Value::of(value))
    }

    /// Type-erased write; see [`Self::set`].
    pub fn set_value(&self, name: &str, mut value: Value) -> OptionsResult<()> {
        let definition = self.catalog.definition_or_fail(name)?;

        if value.type_id() != definition.value_type() {
            return Err(OptionsError::InvalidValueType {
                name: name.to_string(),
                expected: definition.type_name(),
                supplied: value.type_name(),
            });
        }

        if !definition.validate(&mut value) {
            return Err(OptionsError::ValidationFailed {
                name: name.to_string(),
            });
        }

        // The pre-write resolved value is the baseline for change detection.
        // Resolving also rejects writes that are invalid in this scope.
        let previous = self.resolve(&definition)?;

        self.local
            .write()
            .unwrap()
            .insert(name.to_string(), value.clone());
        log::debug!("Node {}: set local override '{}' = {:?}.", self.id, name, value);

        if previous != value {
            self.raise_changed(&definition);
        }
        Ok(())
    }

    /// Removes this node's local override for `name`, restoring inheritance.
    ///
    /// Returns whether an override was removed. On the global node this is
    /// always a no-op returning `false`: its values are the catalog defaults
    /// and cannot be cleared.
    pub fn clear_local(&self, name: &str) -> OptionsResult<bool> {
        if self.parent.read().unwrap().is_none() {
            return Ok(false);
        }

        let Some(previous) = self.local.write().unwrap().remove(name) else {
            return Ok(false);
        };
        log::debug!("Node {}: cleared local override '{}'.", self.id, name);

        let definition = self.catalog.definition_or_fail(name)?;
        let inherited = self.resolve(&definition)?;
        if previous != inherited {
            self.raise_changed(&definition);
        }
        Ok(true)
    }

    /// Whether `name` is defined here: with `local_only`, whether this node
    /// itself overrides it; otherwise, whether the catalog knows it and it
    /// applies to this node's scope.
    pub fn is_defined(&self, name: &str, local_only: bool) -> bool {
        // Every option with a valid definition is considered set on the
        // global node, so `local_only` is meaningful on non-roots only.
        if local_only && self.parent.read().unwrap().is_some() {
            return self.local.read().unwrap().contains_key(name);
        }

        match self.catalog.definition(name) {
            Some(definition) => match &self.scope {
                Some(scope) => definition.is_applicable_to_scope(scope),
                None => true,
            },
            None => false,
        }
    }

    /// All definitions applicable to this node's scope, per the catalog.
    pub fn supported_options(&self) -> Vec<Arc<OptionDefinition>> {
        self.catalog.supported_options(self.scope.as_ref())
    }

    // MARK: --- TOPOLOGY ---

    /// This node's parent, or `None` for the global node.
    pub fn parent(&self) -> Option<Arc<OptionNode>> {
        self.parent.read().unwrap().clone()
    }

    /// The root of the tree this node currently inherits from.
    pub fn global_options(self: &Arc<Self>) -> Arc<OptionNode> {
        let mut current = Arc::clone(self);
        loop {
            let parent = current.parent.read().unwrap().clone();
            match parent {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }

    /// Moves this node under `new_parent`.
    ///
    /// Illegal on the global node, on self-parenting, and on any move that
    /// would close a cycle in the ancestor chain; validation happens before
    /// any structural change, so a rejected move leaves the topology
    /// untouched. Re-parenting to the current parent is a no-op.
    ///
    /// After the move, every instantiated option in this node's scope that
    /// is not locally overridden is re-resolved against both parents, and a
    /// change notification is raised for each option whose value differs.
    pub fn set_parent(self: &Arc<Self>, new_parent: &Arc<OptionNode>) -> OptionsResult<()> {
        let old_parent = self.parent.read().unwrap().clone();
        let Some(old_parent) = old_parent else {
            return Err(OptionsError::InvalidOperation {
                reason: "cannot change the parent of the global options node",
            });
        };

        if Arc::ptr_eq(new_parent, self) {
            return Err(OptionsError::SelfReference { node_id: self.id });
        }
        if Arc::ptr_eq(new_parent, &old_parent) {
            return Ok(());
        }

        // Walk the prospective ancestor chain before touching anything; the
        // tree is still acyclic here, so the walk terminates at the root.
        let mut cursor = Some(Arc::clone(new_parent));
        while let Some(node) = cursor {
            if Arc::ptr_eq(&node, self) {
                log::warn!(
                    "Rejected re-parenting of node {} under {}: it would create a cycle.",
                    self.id,
                    new_parent.id
                );
                return Err(OptionsError::CycleDetected { node_id: self.id });
            }
            cursor = node.parent.read().unwrap().clone();
        }

        old_parent.remove_derived(self);
        new_parent.add_derived(self);
        *self.parent.write().unwrap() = Some(Arc::clone(new_parent));
        log::debug!(
            "Re-parented node {} from {} to {}.",
            self.id,
            old_parent.id,
            new_parent.id
        );

        // The move silently changed every inherited value that differs
        // between the two chains; notify for those, skipping shadowed ones.
        for definition in self.catalog.instantiated_options(self.scope.as_ref()) {
            if self.local.read().unwrap().contains_key(definition.name()) {
                continue;
            }
            let old_value = old_parent.resolve_for_child(&definition);
            let new_value = new_parent.resolve_for_child(&definition);
            if old_value != new_value {
                self.raise_changed(&definition);
            }
        }
        Ok(())
    }

    // MARK: --- CHANGE NOTIFICATION ---

    /// Subscribes to change events observed at this node, whether raised by
    /// a local write or inherited from an ancestor.
    pub fn on_option_changed(
        &self,
        listener: impl Fn(&OptionChanged) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.subscribers.subscribe(listener)
    }

    /// Cancels a subscription made on this node.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Emits locally (when the option applies to this scope), then recurses
    /// into every live derived node that does not shadow the option.
    ///
    /// The derived set is pruned and snapshotted before any listener runs,
    /// so listeners may mutate the tree mid-delivery without corrupting the
    /// traversal, and dead children are never delivered to.
    fn raise_changed(&self, definition: &Arc<OptionDefinition>) {
        let applicable = match &self.scope {
            Some(scope) => definition.is_applicable_to_scope(scope),
            None => true,
        };
        if applicable {
            self.subscribers
                .emit(&OptionChanged::new(definition.name()));
        }

        let children: Vec<Arc<OptionNode>> = {
            let mut derived = self.derived.lock().unwrap();
            derived.retain(|child| child.strong_count() > 0);
            derived.iter().filter_map(Weak::upgrade).collect()
        };

        for child in children {
            if !child.local.read().unwrap().contains_key(definition.name()) {
                child.raise_changed(definition);
            }
        }
    }

    // MARK: --- DERIVED-NODE BOOKKEEPING ---

    fn add_derived(&self, child: &Arc<OptionNode>) {
        let mut derived = self.derived.lock().unwrap();
        // Attach is one of the opportunistic pruning points.
        derived.retain(|existing| existing.strong_count() > 0);
        derived.push(Arc::downgrade(child));
    }

    fn remove_derived(&self, child: &Arc<OptionNode>) {
        self.derived
            .lock()
            .unwrap()
            .retain(|existing| !existing.ptr_eq(&Arc::downgrade(child)));
    }

    /// Number of currently-live derived nodes. Stale entries are skipped,
    /// never counted.
    pub fn derived_count(&self) -> usize {
        self.derived
            .lock()
            .unwrap()
            .iter()
            .filter(|child| child.strong_count() > 0)
            .count()
    }
}

impl fmt::Debug for OptionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionNode")
            .field("id", &self.id)
            .field("scoped", &self.scope.is_some())
            .field("root", &self.parent.read().unwrap().is_none())
            .field("local_overrides", &self.local.read().unwrap().len())
            .field("derived", &self.derived_count())
            .finish()
    }
}

// MARK: --- UNIT TESTS ---
