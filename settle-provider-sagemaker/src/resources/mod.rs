//! Resource Lifecycle Controllers
//!
//! One module per resource type. Each holds the wait tables of its resource,
//! a status prober built on its describe call and the create / read /
//! update / delete operations that issue a control-plane call and then wait
//! for the resource to settle.

pub mod app;
pub mod domain;
pub mod flow_definition;
pub mod image;
pub mod image_version;
pub mod notebook_instance;
pub mod settings;
pub mod space;
pub mod user_profile;
pub mod workforce;
pub mod workteam;

use std::collections::HashMap;

use log::debug;
use settle_core::provider::{ProviderError, ProviderResult};
use settle_core::resource::{Resource, ResourceId, State, Value};
use settle_core::tags::{Tags, diff_tags, merge_default_tags, tags_from_value, tags_to_value};
use settle_core::waiter::{Probe, StatusToken, Waiter};
use tokio_util::sync::CancellationToken;

use crate::api::{ApiResult, SageMakerApi};

/// Everything a controller needs for one operation
pub struct Context<'a> {
    pub api: &'a dyn SageMakerApi,
    pub waiter: &'a Waiter,
    pub cancel: &'a CancellationToken,
    pub default_tags: &'a Tags,
}

impl Context<'_> {
    /// Default tags overlaid with the resource's own `tags`
    pub fn create_tags(&self, resource: &Resource) -> Tags {
        merge_default_tags(self.default_tags, &tags_from_value(resource.get("tags")))
    }

    /// Bring the tags on `arn` in line with the desired resource
    pub async fn sync_tags(&self, arn: &str, to: &Resource) -> ApiResult<()> {
        let current = self.api.list_tags(arn).await?;
        let diff = diff_tags(&current, &self.create_tags(to));
        if diff.is_empty() {
            return Ok(());
        }
        debug!(
            "tags on {}: {} to add, {} to remove",
            arn,
            diff.to_add.len(),
            diff.to_remove.len()
        );
        if !diff.to_remove.is_empty() {
            self.api.delete_tags(arn, diff.to_remove).await?;
        }
        if !diff.to_add.is_empty() {
            self.api.add_tags(arn, diff.to_add).await?;
        }
        Ok(())
    }

    /// Record `tags_all` and the resource's own `tags` (defaults with
    /// matching values and system tags excluded)
    pub async fn read_tags(
        &self,
        arn: &str,
        attributes: &mut Attributes,
    ) -> ApiResult<()> {
        let all = self.api.list_tags(arn).await?;
        let own: Tags = all
            .iter()
            .filter(|(k, v)| !k.starts_with("aws:") && self.default_tags.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        attributes.set("tags_all", tags_to_value(&all));
        if !own.is_empty() {
            attributes.set("tags", tags_to_value(&own));
        }
        Ok(())
    }
}

/// Wrap a failure with the resource and its remote identifier
pub(crate) fn failed<E>(
    id: &ResourceId,
    identifier: Option<&str>,
    action: &str,
) -> impl FnOnce(E) -> ProviderError + use<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let id = id.clone();
    let identifier = identifier.map(str::to_string);
    let action = action.to_string();
    move |cause| {
        let error = ProviderError::new(action).for_resource(id).with_cause(cause);
        match identifier {
            Some(identifier) => error.with_identifier(identifier),
            None => error,
        }
    }
}

/// Turn one describe call into a probe: not-found is an observation, not an error
pub(crate) fn probe_result<T, S: StatusToken>(
    result: ApiResult<T>,
    status: impl FnOnce(&T) -> (S, Option<String>),
) -> ApiResult<Probe<T, S>> {
    match result {
        Ok(described) => {
            let (token, reason) = status(&described);
            Ok(Probe::found(described, token).with_failure_reason(reason.as_deref()))
        }
        Err(e) if e.is_not_found() => Ok(Probe::NotFound),
        Err(e) => Err(e),
    }
}

/// Deleting something that is already gone succeeds
pub(crate) fn tolerate_not_found(result: ApiResult<()>) -> ApiResult<()> {
    match result {
        Err(e) if e.is_not_found() => {
            debug!("delete target already gone: {}", e);
            Ok(())
        }
        other => other,
    }
}

/// Error for a wait that settled without a described object
pub(crate) fn disappeared(id: &ResourceId, identifier: &str) -> ProviderError {
    ProviderError::new("resource disappeared while waiting")
        .for_resource(id.clone())
        .with_identifier(identifier)
}

/// ARN recorded in state, needed for tag calls
pub(crate) fn arn_of(state: &State) -> ProviderResult<&str> {
    state.get_str("arn").ok_or_else(|| {
        ProviderError::new("resource has no ARN in state").for_resource(state.id.clone())
    })
}

/// Builder for the attribute bag reported by read
#[derive(Debug, Default)]
pub struct Attributes(HashMap<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn set_opt<V: Into<Value>>(&mut self, key: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.set(key, value);
        }
        self
    }

    pub fn set_list(&mut self, key: &str, items: &[String]) -> &mut Self {
        if !items.is_empty() {
            self.set(key, Value::string_list(items.iter().cloned()));
        }
        self
    }

    pub fn into_inner(self) -> HashMap<String, Value> {
        self.0
    }
}

/// Read access to a desired attribute bag
pub(crate) trait AttributeMap {
    fn value(&self, key: &str) -> Option<&Value>;

    fn string(&self, key: &str) -> Option<String> {
        self.value(key).and_then(Value::as_str).map(str::to_string)
    }

    fn int(&self, key: &str) -> Option<i64> {
        self.value(key).and_then(Value::as_int)
    }

    fn int32(&self, key: &str) -> Option<i32> {
        self.int(key).and_then(|n| i32::try_from(n).ok())
    }

    fn strings(&self, key: &str) -> Vec<String> {
        self.value(key)
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn block(&self, key: &str) -> Option<&HashMap<String, Value>> {
        self.value(key).and_then(Value::as_map)
    }

    /// A list of nested blocks; anything else in the list is skipped
    fn blocks(&self, key: &str) -> Vec<&HashMap<String, Value>> {
        self.value(key)
            .and_then(Value::as_list)
            .map(|items| items.iter().filter_map(Value::as_map).collect())
            .unwrap_or_default()
    }

    fn changed(&self, other: &impl AttributeMap, key: &str) -> bool {
        self.value(key) != other.value(key)
    }
}

impl AttributeMap for HashMap<String, Value> {
    fn value(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }
}

impl AttributeMap for Resource {
    fn value(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// A required string attribute of a desired resource
pub(crate) fn required(resource: &Resource, key: &str) -> ProviderResult<String> {
    resource.string(key).ok_or_else(|| {
        ProviderError::new(format!("'{}' is required", key)).for_resource(resource.id.clone())
    })
}

/// The remote identifier of a resource that is expected to exist
pub(crate) fn identifier<'a>(
    id: &ResourceId,
    identifier: Option<&'a str>,
) -> ProviderResult<&'a str> {
    identifier.ok_or_else(|| {
        ProviderError::new("resource has no identifier in state").for_resource(id.clone())
    })
}
