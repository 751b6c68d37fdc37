//! Differ - Compare desired state with current state to generate a Plan
//!
//! Compares the "desired state" declared in the manifest with the "current
//! state" fetched from the Provider, and generates a list of required
//! Effects (Plan).

use std::collections::HashMap;

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::{AttributeType, ResourceSchema};

const TAGS: &str = "tags";

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// An immutable attribute differs -> needs replacement
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
    /// Resource exists but not in desired state -> needs deletion
    Delete(State),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State, schema: Option<&ResourceSchema>) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes, schema);

    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let replace = schema.is_some_and(|s| changed.iter().any(|name| s.forces_new(name)));
    if replace {
        Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
    schema: Option<&ResourceSchema>,
) -> Vec<String> {
    let mut changed: Vec<String> = desired
        .iter()
        // Skip internal attributes (starting with _)
        .filter(|(key, _)| !key.starts_with('_'))
        .filter(|(key, value)| {
            let attr_type = schema
                .and_then(|s| s.attributes.get(*key))
                .map(|a| &a.attr_type);
            !current
                .get(*key)
                .is_some_and(|c| satisfies(attr_type, value, c))
        })
        .map(|(key, _)| key.clone())
        .collect();

    // Dropping every tag from the manifest removes them remotely
    let tags_removed = !desired.contains_key(TAGS)
        && current
            .get(TAGS)
            .and_then(Value::as_map)
            .is_some_and(|tags| !tags.is_empty());
    if tags_removed {
        changed.push(TAGS.to_string());
    }

    changed.sort();
    changed
}

/// Whether `current` satisfies `desired`. Nested blocks only compare the keys
/// the manifest sets, since the control plane fills in defaults for the rest.
fn satisfies(attr_type: Option<&AttributeType>, desired: &Value, current: &Value) -> bool {
    match (attr_type, desired, current) {
        (Some(AttributeType::Block(attributes)), Value::Map(d), Value::Map(c)) => {
            d.iter().all(|(k, v)| {
                let inner = attributes
                    .iter()
                    .find(|a| &a.name == k)
                    .map(|a| &a.attr_type);
                c.get(k).is_some_and(|cv| satisfies(inner, v, cv))
            })
        }
        _ => desired == current,
    }
}

/// Compute Diff for multiple resources and generate a Plan
///
/// Resources present in `current_states` but absent from `desired` are
/// deleted after every create and update.
pub fn create_plan(
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
    schemas: &HashMap<String, ResourceSchema>,
) -> Plan {
    let mut plan = Plan::new();

    for resource in desired {
        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        let schema = schemas.get(&resource.id.resource_type);
        match diff(resource, &current, schema) {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Update {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::Replace {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Replace {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::NoChange(_) => {}
            Diff::Delete(state) => plan.add(Effect::Delete(state)),
        }
    }

    let mut orphans: Vec<&State> = current_states
        .values()
        .filter(|s| s.exists && !desired.iter().any(|r| r.id == s.id))
        .collect();
    orphans.sort_by(|a, b| b.id.cmp(&a.id));
    for state in orphans {
        plan.add(Effect::Delete(state.clone()));
    }

    plan
}
