//! Settle SageMaker Provider
//!
//! Manages the lifecycle of SageMaker resources: every mutating call is
//! followed by a wait until the resource reaches a settled status.

pub mod api;
pub mod aws;
pub mod resources;
pub mod schemas;

use std::sync::Arc;
use std::time::Duration;

use settle_core::provider::{BoxFuture, Provider, ProviderError, ProviderResult, ResourceType};
use settle_core::resource::{Resource, ResourceId, State};
use settle_core::schema::ResourceSchema;
use settle_core::tags::Tags;
use settle_core::waiter::Waiter;
use tokio_util::sync::CancellationToken;

use crate::api::SageMakerApi;
use crate::aws::AwsSageMakerApi;
use crate::resources::{
    Context, app, domain, flow_definition, image, image_version, notebook_instance, space,
    user_profile, workforce, workteam,
};

/// A SageMaker resource type together with its schema
pub struct SageMakerResourceType {
    name: &'static str,
    schema: fn() -> ResourceSchema,
}

impl ResourceType for SageMakerResourceType {
    fn name(&self) -> &'static str {
        self.name
    }

    fn schema(&self) -> ResourceSchema {
        (self.schema)()
    }
}

const RESOURCE_TYPES: [SageMakerResourceType; 10] = [
    SageMakerResourceType {
        name: domain::RESOURCE_TYPE,
        schema: schemas::studio::domain_schema,
    },
    SageMakerResourceType {
        name: user_profile::RESOURCE_TYPE,
        schema: schemas::studio::user_profile_schema,
    },
    SageMakerResourceType {
        name: space::RESOURCE_TYPE,
        schema: schemas::studio::space_schema,
    },
    SageMakerResourceType {
        name: app::RESOURCE_TYPE,
        schema: schemas::studio::app_schema,
    },
    SageMakerResourceType {
        name: image::RESOURCE_TYPE,
        schema: schemas::images::image_schema,
    },
    SageMakerResourceType {
        name: image_version::RESOURCE_TYPE,
        schema: schemas::images::image_version_schema,
    },
    SageMakerResourceType {
        name: workforce::RESOURCE_TYPE,
        schema: schemas::labeling::workforce_schema,
    },
    SageMakerResourceType {
        name: workteam::RESOURCE_TYPE,
        schema: schemas::labeling::workteam_schema,
    },
    SageMakerResourceType {
        name: flow_definition::RESOURCE_TYPE,
        schema: schemas::labeling::flow_definition_schema,
    },
    SageMakerResourceType {
        name: notebook_instance::RESOURCE_TYPE,
        schema: schemas::notebook::notebook_instance_schema,
    },
];

/// Schema of a resource type this provider manages
pub fn schema_for(resource_type: &str) -> Option<ResourceSchema> {
    RESOURCE_TYPES
        .iter()
        .find(|t| t.name == resource_type)
        .map(|t| (t.schema)())
}

fn unknown_type(id: &ResourceId) -> ProviderError {
    ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
        .for_resource(id.clone())
}

/// Reject a desired resource that does not match its schema
fn validated(resource: &Resource) -> ProviderResult<ResourceSchema> {
    let schema = schema_for(&resource.id.resource_type).ok_or_else(|| unknown_type(&resource.id))?;
    schema.validate(&resource.attributes).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        ProviderError::new(format!("invalid attributes: {}", messages.join("; ")))
            .for_resource(resource.id.clone())
    })?;
    Ok(schema)
}

/// SageMaker Provider
pub struct SageMakerProvider {
    api: Arc<dyn SageMakerApi>,
    waiter: Waiter,
    default_tags: Tags,
}

impl SageMakerProvider {
    /// Create a provider backed by the AWS SDK
    pub async fn new(region: &str) -> Self {
        Self::with_api(Arc::new(AwsSageMakerApi::new(region).await))
    }

    /// Create with a specific control-plane implementation
    pub fn with_api(api: Arc<dyn SageMakerApi>) -> Self {
        Self {
            api,
            waiter: Waiter::new(),
            default_tags: Tags::new(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.waiter = Waiter::with_poll_interval(poll_interval);
        self
    }

    /// Tags applied to every resource that supports tagging
    pub fn with_default_tags(mut self, default_tags: Tags) -> Self {
        self.default_tags = default_tags;
        self
    }

    fn context<'a>(&'a self, cancel: &'a CancellationToken) -> Context<'a> {
        Context {
            api: self.api.as_ref(),
            waiter: &self.waiter,
            cancel,
            default_tags: &self.default_tags,
        }
    }

    async fn read_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> ProviderResult<State> {
        let ctx = self.context(cancel);
        match id.resource_type.as_str() {
            domain::RESOURCE_TYPE => domain::read(&ctx, id, identifier).await,
            user_profile::RESOURCE_TYPE => user_profile::read(&ctx, id, identifier).await,
            space::RESOURCE_TYPE => space::read(&ctx, id, identifier).await,
            app::RESOURCE_TYPE => app::read(&ctx, id, identifier).await,
            image::RESOURCE_TYPE => image::read(&ctx, id, identifier).await,
            image_version::RESOURCE_TYPE => image_version::read(&ctx, id, identifier).await,
            workforce::RESOURCE_TYPE => workforce::read(&ctx, id, identifier).await,
            workteam::RESOURCE_TYPE => workteam::read(&ctx, id, identifier).await,
            flow_definition::RESOURCE_TYPE => flow_definition::read(&ctx, id, identifier).await,
            notebook_instance::RESOURCE_TYPE => {
                notebook_instance::read(&ctx, id, identifier).await
            }
            _ => Err(unknown_type(id)),
        }
    }

    async fn create_resource(
        &self,
        resource: &Resource,
        cancel: &CancellationToken,
    ) -> ProviderResult<State> {
        let schema = validated(resource)?;
        let ctx = self.context(cancel);
        let mut state = match resource.id.resource_type.as_str() {
            domain::RESOURCE_TYPE => domain::create(&ctx, resource).await,
            user_profile::RESOURCE_TYPE => user_profile::create(&ctx, resource).await,
            space::RESOURCE_TYPE => space::create(&ctx, resource).await,
            app::RESOURCE_TYPE => app::create(&ctx, resource).await,
            image::RESOURCE_TYPE => image::create(&ctx, resource).await,
            image_version::RESOURCE_TYPE => image_version::create(&ctx, resource).await,
            workforce::RESOURCE_TYPE => workforce::create(&ctx, resource).await,
            workteam::RESOURCE_TYPE => workteam::create(&ctx, resource).await,
            flow_definition::RESOURCE_TYPE => flow_definition::create(&ctx, resource).await,
            notebook_instance::RESOURCE_TYPE => notebook_instance::create(&ctx, resource).await,
            _ => Err(unknown_type(&resource.id)),
        }?;
        schema.carry_write_only(&resource.attributes, &mut state.attributes);
        Ok(state)
    }

    async fn update_resource(
        &self,
        from: &State,
        to: &Resource,
        cancel: &CancellationToken,
    ) -> ProviderResult<State> {
        let schema = validated(to)?;
        let ctx = self.context(cancel);
        let mut state = match to.id.resource_type.as_str() {
            domain::RESOURCE_TYPE => domain::update(&ctx, from, to).await,
            user_profile::RESOURCE_TYPE => user_profile::update(&ctx, from, to).await,
            space::RESOURCE_TYPE => space::update(&ctx, from, to).await,
            app::RESOURCE_TYPE => app::update(&ctx, from, to).await,
            image::RESOURCE_TYPE => image::update(&ctx, from, to).await,
            image_version::RESOURCE_TYPE => Err(ProviderError::new(
                "image versions cannot be updated in place",
            )
            .for_resource(to.id.clone())),
            workforce::RESOURCE_TYPE => workforce::update(&ctx, from, to).await,
            workteam::RESOURCE_TYPE => workteam::update(&ctx, from, to).await,
            flow_definition::RESOURCE_TYPE => flow_definition::update(&ctx, from, to).await,
            notebook_instance::RESOURCE_TYPE => notebook_instance::update(&ctx, from, to).await,
            _ => Err(unknown_type(&to.id)),
        }?;
        schema.carry_write_only(&to.attributes, &mut state.attributes);
        Ok(state)
    }

    async fn delete_resource(
        &self,
        state: &State,
        cancel: &CancellationToken,
    ) -> ProviderResult<()> {
        let ctx = self.context(cancel);
        match state.id.resource_type.as_str() {
            domain::RESOURCE_TYPE => domain::delete(&ctx, state).await,
            user_profile::RESOURCE_TYPE => user_profile::delete(&ctx, state).await,
            space::RESOURCE_TYPE => space::delete(&ctx, state).await,
            app::RESOURCE_TYPE => app::delete(&ctx, state).await,
            image::RESOURCE_TYPE => image::delete(&ctx, state).await,
            image_version::RESOURCE_TYPE => image_version::delete(&ctx, state).await,
            workforce::RESOURCE_TYPE => workforce::delete(&ctx, state).await,
            workteam::RESOURCE_TYPE => workteam::delete(&ctx, state).await,
            flow_definition::RESOURCE_TYPE => flow_definition::delete(&ctx, state).await,
            notebook_instance::RESOURCE_TYPE => notebook_instance::delete(&ctx, state).await,
            _ => Err(unknown_type(&state.id)),
        }
    }
}

impl Provider for SageMakerProvider {
    fn name(&self) -> &'static str {
        "sagemaker"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        RESOURCE_TYPES
            .into_iter()
            .map(|t| Box::new(t) as Box<dyn ResourceType>)
            .collect()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
        cancel: &CancellationToken,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(str::to_string);
        let cancel = cancel.clone();
        Box::pin(async move {
            match identifier {
                Some(identifier) => self.read_resource(&id, &identifier, &cancel).await,
                None => Ok(State::not_found(id)),
            }
        })
    }

    fn create(
        &self,
        resource: &Resource,
        cancel: &CancellationToken,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        let cancel = cancel.clone();
        Box::pin(async move { self.create_resource(&resource, &cancel).await })
    }

    fn update(
        &self,
        from: &State,
        to: &Resource,
        cancel: &CancellationToken,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let from = from.clone();
        let to = to.clone();
        let cancel = cancel.clone();
        Box::pin(async move { self.update_resource(&from, &to, &cancel).await })
    }

    fn delete(&self, state: &State, cancel: &CancellationToken) -> BoxFuture<'_, ProviderResult<()>> {
        let state = state.clone();
        let cancel = cancel.clone();
        Box::pin(async move { self.delete_resource(&state, &cancel).await })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use settle_core::resource::Value;

    use super::*;
    use crate::api::mock::MockApi;
    use crate::api::status::WorkforceStatus;
    use crate::api::types::*;

    const WORKFORCE_ARN: &str = "arn:aws:sagemaker:us-west-2:123456789012:workforce/labelers";

    fn provider(api: &Arc<MockApi>) -> SageMakerProvider {
        SageMakerProvider::with_api(api.clone()).with_poll_interval(Duration::from_secs(5))
    }

    fn oidc_block(with_secret: bool) -> Value {
        let mut block = HashMap::new();
        for key in [
            "client_id",
            "issuer",
            "authorization_endpoint",
            "token_endpoint",
            "user_info_endpoint",
            "logout_endpoint",
            "jwks_uri",
        ] {
            block.insert(key.to_string(), Value::from(format!("https://idp/{}", key)));
        }
        if with_secret {
            block.insert("client_secret".to_string(), Value::from("s3cret"));
        }
        Value::Map(block)
    }

    fn workforce() -> WorkforceDescription {
        WorkforceDescription {
            workforce_name: "labelers".to_string(),
            arn: WORKFORCE_ARN.to_string(),
            status: WorkforceStatus::Active,
            failure_reason: None,
            cognito_config: None,
            oidc_config: Some(OidcConfig {
                client_id: "https://idp/client_id".to_string(),
                client_secret: None,
                issuer: "https://idp/issuer".to_string(),
                authorization_endpoint: "https://idp/authorization_endpoint".to_string(),
                token_endpoint: "https://idp/token_endpoint".to_string(),
                user_info_endpoint: "https://idp/user_info_endpoint".to_string(),
                logout_endpoint: "https://idp/logout_endpoint".to_string(),
                jwks_uri: "https://idp/jwks_uri".to_string(),
            }),
            source_ip_cidrs: Vec::new(),
            subdomain: None,
        }
    }

    #[test]
    fn every_type_has_a_schema() {
        let provider = SageMakerProvider::with_api(Arc::new(MockApi::new()));
        let types = provider.resource_types();
        assert_eq!(types.len(), 10);
        for t in types {
            assert_eq!(t.schema().resource_type, t.name());
        }
        assert!(schema_for("sagemaker_pipeline").is_none());
    }

    #[tokio::test]
    async fn unknown_resource_type_is_rejected() {
        let api = Arc::new(MockApi::new());
        let resource = Resource::new("sagemaker_pipeline", "main");
        let err = provider(&api)
            .create(&resource, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown resource type: sagemaker_pipeline"));
    }

    #[tokio::test]
    async fn invalid_attributes_fail_before_any_call() {
        let api = Arc::new(MockApi::new());
        let resource = Resource::new(notebook_instance::RESOURCE_TYPE, "analysis")
            .with_attribute("notebook_instance_name", "analysis")
            .with_attribute("instance_type", "ml.t3.medium");
        let err = provider(&api)
            .create(&resource, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("role_arn"));
        assert_eq!(api.count("create_notebook_instance"), 0);
    }

    #[tokio::test]
    async fn read_without_identifier_is_absent() {
        let api = Arc::new(MockApi::new());
        let id = ResourceId::new(domain::RESOURCE_TYPE, "research");
        let state = provider(&api)
            .read(&id, None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!state.exists);
        assert_eq!(api.count("describe_domain"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn create_keeps_write_only_secret() {
        let api = Arc::new(MockApi::new());
        api.create_workforce.ok(WORKFORCE_ARN.to_string());
        api.describe_workforce.ok(workforce());
        let resource = Resource::new(workforce::RESOURCE_TYPE, "labelers")
            .with_attribute("workforce_name", "labelers")
            .with_attribute("oidc_config", oidc_block(true));

        let state = provider(&api)
            .create(&resource, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(state.attributes.get("oidc_config"), Some(&oidc_block(true)));
        assert_eq!(state.identifier.as_deref(), Some("labelers"));
    }
}
