//! Manifest - Desired resources declared in JSON
//!
//! ```json
//! {
//!   "provider": { "region": "us-west-2", "default_tags": { "team": "ml" } },
//!   "backend": { "type": "local", "path": "settle.state.json" },
//!   "resources": [
//!     { "type": "sagemaker_domain", "name": "main", "attributes": { ... } },
//!     { "type": "sagemaker_user_profile", "name": "alice",
//!       "attributes": { "domain_id": "${sagemaker_domain.main.id}", ... } }
//!   ]
//! }
//! ```
//!
//! A string attribute of the form `${type.name.attribute}` is replaced with
//! the attribute of an already applied resource.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use settle_core::resource::{Resource, ResourceId, State, Value, attributes_from_json};
use settle_core::tags::Tags;
use settle_state::BackendConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Duplicate resource {0}")]
    Duplicate(ResourceId),

    #[error("{0} depends on itself through {1}")]
    Cycle(ResourceId, ResourceId),

    #[error("{resource}: reference '{reference}' {reason}")]
    Unresolved {
        resource: ResourceId,
        reference: String,
        reason: &'static str,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct ProviderBlock {
    pub region: Option<String>,
    #[serde(default)]
    pub default_tags: Tags,
    pub poll_interval_secs: Option<u64>,
}

impl ProviderBlock {
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct BackendBlock {
    #[serde(rename = "type")]
    pub backend_type: String,
    #[serde(flatten)]
    pub attributes: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ResourceBlock {
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default)]
    attributes: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub provider: ProviderBlock,
    pub backend: Option<BackendBlock>,
    #[serde(default)]
    resources: Vec<ResourceBlock>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn backend_config(&self) -> BackendConfig {
        match &self.backend {
            Some(block) => BackendConfig {
                backend_type: block.backend_type.clone(),
                attributes: attributes_from_json(&block.attributes),
            },
            None => BackendConfig::local(),
        }
    }

    /// Declared resources, dependencies first
    pub fn resources(&self) -> Result<Vec<Resource>, ManifestError> {
        let mut seen = HashSet::new();
        let mut resources = Vec::with_capacity(self.resources.len());
        for block in &self.resources {
            let id = ResourceId::new(&block.resource_type, &block.name);
            if !seen.insert(id.clone()) {
                return Err(ManifestError::Duplicate(id));
            }
            resources.push(Resource {
                id,
                attributes: attributes_from_json(&block.attributes),
            });
        }
        sort_by_dependencies(resources)
    }
}

/// `${type.name.attribute}` split into the resource and the attribute
fn parse_reference(s: &str) -> Option<(ResourceId, &str)> {
    let inner = s.strip_prefix("${")?.strip_suffix('}')?;
    let mut parts = inner.splitn(3, '.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(t), Some(n), Some(a)) if !t.is_empty() && !n.is_empty() && !a.is_empty() => {
            Some((ResourceId::new(t, n), a))
        }
        _ => None,
    }
}

fn collect_references(value: &Value, refs: &mut Vec<ResourceId>) {
    match value {
        Value::String(s) => {
            if let Some((id, _)) = parse_reference(s) {
                refs.push(id);
            }
        }
        Value::List(items) => items.iter().for_each(|v| collect_references(v, refs)),
        Value::Map(map) => map.values().for_each(|v| collect_references(v, refs)),
        Value::Int(_) | Value::Bool(_) => {}
    }
}

/// Resources a resource refers to
pub fn dependencies(resource: &Resource) -> Vec<ResourceId> {
    let mut refs = Vec::new();
    for value in resource.attributes.values() {
        collect_references(value, &mut refs);
    }
    refs.sort();
    refs.dedup();
    refs
}

/// Topological order keeping manifest order among independent resources
fn sort_by_dependencies(resources: Vec<Resource>) -> Result<Vec<Resource>, ManifestError> {
    fn visit(
        index: usize,
        resources: &[Resource],
        positions: &HashMap<ResourceId, usize>,
        visiting: &mut Vec<usize>,
        visited: &mut HashSet<usize>,
        order: &mut Vec<usize>,
    ) -> Result<(), ManifestError> {
        if visited.contains(&index) {
            return Ok(());
        }
        if visiting.contains(&index) {
            let through = visiting.last().copied().unwrap_or(index);
            return Err(ManifestError::Cycle(
                resources[index].id.clone(),
                resources[through].id.clone(),
            ));
        }
        visiting.push(index);
        for dep in dependencies(&resources[index]) {
            if let Some(&dep_index) = positions.get(&dep) {
                visit(dep_index, resources, positions, visiting, visited, order)?;
            }
        }
        visiting.pop();
        visited.insert(index);
        order.push(index);
        Ok(())
    }

    let positions: HashMap<ResourceId, usize> = resources
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id.clone(), i))
        .collect();
    let mut visited = HashSet::new();
    let mut order = Vec::with_capacity(resources.len());
    for index in 0..resources.len() {
        visit(
            index,
            &resources,
            &positions,
            &mut Vec::new(),
            &mut visited,
            &mut order,
        )?;
    }

    let mut slots: Vec<Option<Resource>> = resources.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect())
}

/// Look up a referenced attribute; `id` falls back to the remote identifier
fn lookup(state: &State, attribute: &str) -> Option<Value> {
    match state.attributes.get(attribute) {
        Some(value) => Some(value.clone()),
        None if attribute == "id" => state.identifier.clone().map(Value::String),
        None => None,
    }
}

fn resolve_value(
    value: &Value,
    states: &HashMap<ResourceId, State>,
    resource: &ResourceId,
) -> Result<Value, ManifestError> {
    match value {
        Value::String(s) => match parse_reference(s) {
            Some((id, attribute)) => {
                let unresolved = |reason: &'static str| ManifestError::Unresolved {
                    resource: resource.clone(),
                    reference: s.clone(),
                    reason,
                };
                let state = states
                    .get(&id)
                    .filter(|state| state.exists)
                    .ok_or_else(|| unresolved("points at a resource that does not exist yet"))?;
                lookup(state, attribute).ok_or_else(|| unresolved("names an unknown attribute"))
            }
            None => Ok(value.clone()),
        },
        Value::List(items) => items
            .iter()
            .map(|v| resolve_value(v, states, resource))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Value::Map(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), resolve_value(v, states, resource)?)))
            .collect::<Result<HashMap<_, _>, ManifestError>>()
            .map(Value::Map),
        Value::Int(_) | Value::Bool(_) => Ok(value.clone()),
    }
}

/// Replace every reference in `resource` with the referenced value
pub fn resolve(
    resource: &Resource,
    states: &HashMap<ResourceId, State>,
) -> Result<Resource, ManifestError> {
    let attributes = resource
        .attributes
        .iter()
        .map(|(k, v)| Ok((k.clone(), resolve_value(v, states, &resource.id)?)))
        .collect::<Result<HashMap<_, _>, ManifestError>>()?;
    Ok(Resource {
        id: resource.id.clone(),
        attributes,
    })
}

/// Like [`resolve`], leaving references to resources not applied yet in place
pub fn resolve_known(resource: &Resource, states: &HashMap<ResourceId, State>) -> Resource {
    let mut resolved = resource.clone();
    for (key, value) in &resource.attributes {
        if let Ok(v) = resolve_value(value, states, &resource.id) {
            resolved.attributes.insert(key.clone(), v);
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "provider": { "region": "us-west-2", "default_tags": { "team": "ml" }, "poll_interval_secs": 10 },
        "resources": [
            {
                "type": "sagemaker_user_profile",
                "name": "alice",
                "attributes": {
                    "domain_id": "${sagemaker_domain.main.id}",
                    "user_profile_name": "alice"
                }
            },
            {
                "type": "sagemaker_domain",
                "name": "main",
                "attributes": { "domain_name": "research", "subnet_ids": ["subnet-1"] }
            },
            { "type": "sagemaker_image", "name": "base" }
        ]
    }"#;

    #[test]
    fn parse_manifest() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.provider.region.as_deref(), Some("us-west-2"));
        assert_eq!(manifest.provider.default_tags.get("team").map(String::as_str), Some("ml"));
        assert_eq!(manifest.provider.poll_interval(), Some(Duration::from_secs(10)));
        assert_eq!(manifest.backend_config().backend_type, "local");
    }

    #[test]
    fn backend_block_attributes() {
        let manifest =
            Manifest::parse(r#"{ "backend": { "type": "local", "path": "infra.state.json" } }"#)
                .unwrap();
        let config = manifest.backend_config();
        assert_eq!(
            config.path().unwrap(),
            Some(std::path::PathBuf::from("infra.state.json"))
        );
        assert!(manifest.resources().unwrap().is_empty());
    }

    #[test]
    fn dependencies_come_first() {
        let resources = Manifest::parse(MANIFEST).unwrap().resources().unwrap();
        let names: Vec<_> = resources.iter().map(|r| r.id.name.as_str()).collect();
        assert_eq!(names, ["main", "alice", "base"]);
    }

    #[test]
    fn duplicate_resources_are_rejected() {
        let manifest = Manifest::parse(
            r#"{ "resources": [
                { "type": "sagemaker_image", "name": "base" },
                { "type": "sagemaker_image", "name": "base" }
            ] }"#,
        )
        .unwrap();
        assert!(matches!(manifest.resources(), Err(ManifestError::Duplicate(_))));
    }

    #[test]
    fn cycles_are_rejected() {
        let manifest = Manifest::parse(
            r#"{ "resources": [
                { "type": "sagemaker_image", "name": "a", "attributes": { "role_arn": "${sagemaker_image.b.arn}" } },
                { "type": "sagemaker_image", "name": "b", "attributes": { "role_arn": "${sagemaker_image.a.arn}" } }
            ] }"#,
        )
        .unwrap();
        assert!(matches!(manifest.resources(), Err(ManifestError::Cycle(..))));
    }

    #[test]
    fn references_resolve_from_state() {
        let resources = Manifest::parse(MANIFEST).unwrap().resources().unwrap();
        let alice = &resources[1];
        let domain = ResourceId::new("sagemaker_domain", "main");

        let mut states = HashMap::new();
        assert!(resolve(alice, &states).is_err());
        assert_eq!(resolve_known(alice, &states), *alice);

        states.insert(
            domain.clone(),
            State::existing(domain.clone(), HashMap::new()).with_identifier("d-abc123"),
        );
        let resolved = resolve(alice, &states).unwrap();
        assert_eq!(
            resolved.attributes.get("domain_id"),
            Some(&Value::from("d-abc123"))
        );
    }

    #[test]
    fn references_inside_blocks_resolve() {
        let image = ResourceId::new("sagemaker_image", "base");
        let mut attrs = HashMap::new();
        attrs.insert("arn".to_string(), Value::from("arn:aws:sagemaker:us-west-2:1:image/base"));
        let mut states = HashMap::new();
        states.insert(image.clone(), State::existing(image, attrs));

        let mut spec = HashMap::new();
        spec.insert(
            "sagemaker_image_arn".to_string(),
            Value::from("${sagemaker_image.base.arn}"),
        );
        let app = Resource::new("sagemaker_app", "jupyter")
            .with_attribute("resource_spec", Value::Map(spec));

        let resolved = resolve(&app, &states).unwrap();
        let spec = resolved.attributes["resource_spec"].as_map().unwrap();
        assert_eq!(
            spec.get("sagemaker_image_arn").and_then(Value::as_str),
            Some("arn:aws:sagemaker:us-west-2:1:image/base")
        );

        let err = resolve(
            &Resource::new("sagemaker_app", "x").with_attribute("app_name", "${sagemaker_image.base.nope}"),
            &states,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown attribute"));
    }
}
