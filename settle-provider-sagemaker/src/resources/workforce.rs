//! SageMaker private labeling workforce
//!
//! Backed by either a Cognito user pool or an OIDC identity provider. The
//! OIDC client secret is never reported back.

use std::collections::HashMap;
use std::time::Duration;

use log::{info, warn};
use settle_core::provider::{ProviderError, ProviderResult};
use settle_core::resource::{Resource, ResourceId, State, Value};
use settle_core::waiter::{Probe, WaitSpec};

use super::{
    AttributeMap, Attributes, Context, arn_of, disappeared, failed, identifier, probe_result,
    required, tolerate_not_found,
};
use crate::api::status::WorkforceStatus;
use crate::api::types::*;
use crate::api::{ApiResult, SageMakerApi};

pub const RESOURCE_TYPE: &str = "sagemaker_workforce";

pub const ACTIVE: WaitSpec<WorkforceStatus> = WaitSpec::new(
    &[WorkforceStatus::Initializing, WorkforceStatus::Updating],
    &[WorkforceStatus::Active],
    Duration::from_secs(10 * 60),
);

pub const DELETED: WaitSpec<WorkforceStatus> = WaitSpec::new(
    &[WorkforceStatus::Deleting],
    &[],
    Duration::from_secs(10 * 60),
);

pub async fn probe(
    api: &dyn SageMakerApi,
    workforce_name: &str,
) -> ApiResult<Probe<WorkforceDescription, WorkforceStatus>> {
    probe_result(api.describe_workforce(workforce_name).await, |w| {
        (w.status, w.failure_reason.clone())
    })
}

fn cognito_config(resource: &Resource) -> ProviderResult<Option<CognitoConfig>> {
    let Some(block) = resource.block("cognito_config") else {
        return Ok(None);
    };
    Ok(Some(CognitoConfig {
        client_id: block_field(resource, block, "cognito_config", "client_id")?,
        user_pool: block_field(resource, block, "cognito_config", "user_pool")?,
    }))
}

fn oidc_config(resource: &Resource) -> ProviderResult<Option<OidcConfig>> {
    let Some(block) = resource.block("oidc_config") else {
        return Ok(None);
    };
    let field = |key| block_field(resource, block, "oidc_config", key);
    Ok(Some(OidcConfig {
        client_id: field("client_id")?,
        client_secret: block.string("client_secret"),
        issuer: field("issuer")?,
        authorization_endpoint: field("authorization_endpoint")?,
        token_endpoint: field("token_endpoint")?,
        user_info_endpoint: field("user_info_endpoint")?,
        logout_endpoint: field("logout_endpoint")?,
        jwks_uri: field("jwks_uri")?,
    }))
}

fn block_field(
    resource: &Resource,
    block: &HashMap<String, Value>,
    name: &str,
    key: &str,
) -> ProviderResult<String> {
    block.string(key).ok_or_else(|| {
        ProviderError::new(format!("'{}.{}' is required", name, key))
            .for_resource(resource.id.clone())
    })
}

fn source_ip_cidrs(resource: &Resource) -> Vec<String> {
    resource
        .block("source_ip_config")
        .map(|block| block.strings("cidrs"))
        .unwrap_or_default()
}

pub async fn create(ctx: &Context<'_>, resource: &Resource) -> ProviderResult<State> {
    let workforce_name = required(resource, "workforce_name")?;
    let cognito_config = cognito_config(resource)?;
    let oidc_config = oidc_config(resource)?;
    if cognito_config.is_some() == oidc_config.is_some() {
        return Err(ProviderError::new(
            "exactly one of 'cognito_config' and 'oidc_config' must be set",
        )
        .for_resource(resource.id.clone()));
    }

    let request = CreateWorkforceRequest {
        workforce_name: workforce_name.clone(),
        cognito_config,
        oidc_config,
        source_ip_cidrs: source_ip_cidrs(resource),
        tags: ctx.create_tags(resource),
    };

    ctx.api
        .create_workforce(request)
        .await
        .map_err(failed(&resource.id, None, "creating SageMaker workforce"))?;
    info!("created SageMaker workforce {}", workforce_name);

    let workforce = ctx
        .waiter
        .wait(&ACTIVE, ctx.cancel, || probe(ctx.api, &workforce_name))
        .await
        .map_err(failed(
            &resource.id,
            Some(&workforce_name),
            "waiting for SageMaker workforce creation",
        ))?
        .ok_or_else(|| disappeared(&resource.id, &workforce_name))?;

    to_state(ctx, &resource.id, &workforce).await
}

pub async fn read(
    ctx: &Context<'_>,
    id: &ResourceId,
    workforce_name: &str,
) -> ProviderResult<State> {
    match probe(ctx.api, workforce_name)
        .await
        .map_err(failed(id, Some(workforce_name), "reading SageMaker workforce"))?
    {
        Probe::NotFound => {
            warn!(
                "SageMaker workforce {} not found, removing from state",
                workforce_name
            );
            Ok(State::not_found(id.clone()))
        }
        Probe::Found { described, .. } => to_state(ctx, id, &described).await,
    }
}

pub async fn update(ctx: &Context<'_>, from: &State, to: &Resource) -> ProviderResult<State> {
    let workforce_name = identifier(&to.id, from.identifier.as_deref())?;

    let mut request = UpdateWorkforceRequest {
        workforce_name: workforce_name.to_string(),
        ..Default::default()
    };
    if to.changed(&from.attributes, "source_ip_config") {
        request.source_ip_cidrs = Some(source_ip_cidrs(to));
    }
    if to.changed(&from.attributes, "oidc_config") {
        request.oidc_config = oidc_config(to)?;
    }

    if request.source_ip_cidrs.is_some() || request.oidc_config.is_some() {
        ctx.api
            .update_workforce(request)
            .await
            .map_err(failed(&to.id, Some(workforce_name), "updating SageMaker workforce"))?;
        ctx.waiter
            .wait(&ACTIVE, ctx.cancel, || probe(ctx.api, workforce_name))
            .await
            .map_err(failed(
                &to.id,
                Some(workforce_name),
                "waiting for SageMaker workforce update",
            ))?;
    }

    ctx.sync_tags(arn_of(from)?, to)
        .await
        .map_err(failed(&to.id, Some(workforce_name), "updating tags"))?;

    read(ctx, &to.id, workforce_name).await
}

pub async fn delete(ctx: &Context<'_>, state: &State) -> ProviderResult<()> {
    let workforce_name = identifier(&state.id, state.identifier.as_deref())?;

    tolerate_not_found(ctx.api.delete_workforce(workforce_name).await).map_err(failed(
        &state.id,
        Some(workforce_name),
        "deleting SageMaker workforce",
    ))?;
    ctx.waiter
        .wait(&DELETED, ctx.cancel, || probe(ctx.api, workforce_name))
        .await
        .map_err(failed(
            &state.id,
            Some(workforce_name),
            "waiting for SageMaker workforce deletion",
        ))?;
    info!("deleted SageMaker workforce {}", workforce_name);
    Ok(())
}

async fn to_state(
    ctx: &Context<'_>,
    id: &ResourceId,
    workforce: &WorkforceDescription,
) -> ProviderResult<State> {
    let mut attributes = Attributes::new();
    attributes
        .set("arn", workforce.arn.clone())
        .set("workforce_name", workforce.workforce_name.clone())
        .set_opt("subdomain", workforce.subdomain.clone())
        .set("status", workforce.status.to_string());

    if let Some(cognito) = &workforce.cognito_config {
        let mut block = Attributes::new();
        block
            .set("client_id", cognito.client_id.clone())
            .set("user_pool", cognito.user_pool.clone());
        attributes.set("cognito_config", Value::Map(block.into_inner()));
    }
    if let Some(oidc) = &workforce.oidc_config {
        let mut block = Attributes::new();
        block
            .set("client_id", oidc.client_id.clone())
            .set("issuer", oidc.issuer.clone())
            .set("authorization_endpoint", oidc.authorization_endpoint.clone())
            .set("token_endpoint", oidc.token_endpoint.clone())
            .set("user_info_endpoint", oidc.user_info_endpoint.clone())
            .set("logout_endpoint", oidc.logout_endpoint.clone())
            .set("jwks_uri", oidc.jwks_uri.clone());
        attributes.set("oidc_config", Value::Map(block.into_inner()));
    }
    if !workforce.source_ip_cidrs.is_empty() {
        let mut block = Attributes::new();
        block.set_list("cidrs", &workforce.source_ip_cidrs);
        attributes.set("source_ip_config", Value::Map(block.into_inner()));
    }

    ctx.read_tags(&workforce.arn, &mut attributes)
        .await
        .map_err(failed(id, Some(&workforce.workforce_name), "listing tags"))?;

    Ok(State::existing(id.clone(), attributes.into_inner())
        .with_identifier(&workforce.workforce_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::api::mock::MockApi;
    use crate::resources::testing::*;
    use settle_core::tags::Tags;
    use tokio_util::sync::CancellationToken;

    fn described(status: WorkforceStatus) -> WorkforceDescription {
        WorkforceDescription {
            workforce_name: "labelers".to_string(),
            arn: format!("{}:workforce/labelers", REGION_ARN),
            status,
            failure_reason: None,
            cognito_config: Some(CognitoConfig {
                client_id: "client".to_string(),
                user_pool: "us-west-2_pool".to_string(),
            }),
            oidc_config: None,
            source_ip_cidrs: vec!["10.0.0.0/16".to_string()],
            subdomain: Some("abc.labeling.us-west-2.sagemaker.aws".to_string()),
        }
    }

    fn cognito_block() -> Value {
        let mut block = HashMap::new();
        block.insert("client_id".to_string(), Value::from("client"));
        block.insert("user_pool".to_string(), Value::from("us-west-2_pool"));
        Value::Map(block)
    }

    fn cidrs(items: &[&str]) -> Value {
        let mut block = HashMap::new();
        block.insert(
            "cidrs".to_string(),
            Value::string_list(items.iter().copied()),
        );
        Value::Map(block)
    }

    fn desired() -> Resource {
        Resource::new(RESOURCE_TYPE, "labelers")
            .with_attribute("workforce_name", "labelers")
            .with_attribute("cognito_config", cognito_block())
            .with_attribute("source_ip_config", cidrs(&["10.0.0.0/16"]))
    }

    #[tokio::test(start_paused = true)]
    async fn create_waits_for_active() {
        let api = MockApi::new();
        api.create_workforce.ok(format!("{}:workforce/labelers", REGION_ARN));
        api.describe_workforce
            .ok(described(WorkforceStatus::Initializing))
            .ok(described(WorkforceStatus::Active));
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let state = create(&ctx, &desired()).await.unwrap();
        assert_eq!(state.identifier.as_deref(), Some("labelers"));
        assert_eq!(state.attributes.get("cognito_config"), Some(&cognito_block()));
        assert_eq!(
            state.attributes.get("source_ip_config"),
            Some(&cidrs(&["10.0.0.0/16"]))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn create_requires_one_identity_provider() {
        let api = MockApi::new();
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let resource = Resource::new(RESOURCE_TYPE, "labelers").with_attribute("workforce_name", "labelers");
        let err = create(&ctx, &resource).await.unwrap_err();
        assert!(err.to_string().contains("exactly one of"));
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cidr_change_updates_and_waits() {
        let api = MockApi::new();
        api.describe_workforce
            .ok(described(WorkforceStatus::Updating))
            .ok(described(WorkforceStatus::Active));
        api.update_workforce.ok(());
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let mut attributes = desired().attributes;
        attributes.insert("arn".to_string(), Value::from("arn:workforce"));
        let from = State::existing(ResourceId::new(RESOURCE_TYPE, "labelers"), attributes)
            .with_identifier("labelers");
        let to = desired().with_attribute("source_ip_config", cidrs(&["10.0.0.0/16", "10.1.0.0/16"]));

        update(&ctx, &from, &to).await.unwrap();
        assert_eq!(api.mutations(), vec!["update_workforce"]);
        assert!(api.arguments("update_workforce")[0].contains("10.1.0.0/16"));
        assert_eq!(api.count("describe_workforce"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_workforce_reads_as_absent() {
        let api = MockApi::new();
        api.describe_workforce
            .err(ApiError::NotFound("No workforce found".to_string()));
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let state = read(&ctx, &ResourceId::new(RESOURCE_TYPE, "labelers"), "labelers")
            .await
            .unwrap();
        assert!(!state.exists);
    }

    #[test]
    fn wait_tables_are_disjoint() {
        assert!(ACTIVE.validate().is_ok());
        assert!(DELETED.validate().is_ok());
    }
}
