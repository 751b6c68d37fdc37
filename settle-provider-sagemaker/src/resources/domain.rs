//! SageMaker Studio domain
//!
//! The create call only returns the domain ARN. The domain id used by every
//! other call is the ARN's resource path below `domain/`.

use std::time::Duration;

use log::{info, warn};
use settle_core::arn::{Arn, IdentifierError};
use settle_core::provider::ProviderResult;
use settle_core::resource::{Resource, ResourceId, State};
use settle_core::waiter::{Probe, WaitSpec};

use super::{
    AttributeMap, Attributes, Context, arn_of, disappeared, failed, identifier, probe_result,
    required, settings, tolerate_not_found,
};
use crate::api::status::DomainStatus;
use crate::api::types::*;
use crate::api::{ApiResult, SageMakerApi};

pub const RESOURCE_TYPE: &str = "sagemaker_domain";

pub const IN_SERVICE: WaitSpec<DomainStatus> = WaitSpec::new(
    &[DomainStatus::Pending, DomainStatus::Updating],
    &[DomainStatus::InService],
    Duration::from_secs(20 * 60),
);

pub const DELETED: WaitSpec<DomainStatus> = WaitSpec::new(
    &[DomainStatus::Deleting],
    &[],
    Duration::from_secs(20 * 60),
);

/// Everything else but tags forces a new domain. A group the manifest leaves
/// out keeps whatever the control plane reports.
const UPDATABLE: [&str; 3] = [
    "default_user_settings",
    "domain_settings",
    "default_space_settings",
];

/// Parts of `domain_settings` that UpdateDomain does not accept
const FIXED_DOMAIN_SETTINGS: [&str; 2] = ["security_group_ids", "r_studio_server_pro_domain_settings"];

fn warn_fixed_domain_settings(domain_id: &str, from: &State, to: &Resource) {
    let before = from.attributes.block("domain_settings");
    let after = to.block("domain_settings");
    for key in FIXED_DOMAIN_SETTINGS {
        if before.and_then(|b| b.value(key)) != after.and_then(|b| b.value(key)) {
            warn!(
                "domain_settings.{} of SageMaker domain {} cannot change in place",
                key, domain_id
            );
        }
    }
}

/// Recover the domain id from `arn:...:domain/<id>`
pub fn decode_domain_id(arn: &str) -> Result<String, IdentifierError> {
    Ok(Arn::parse(arn)?.resource_path("domain")?.to_string())
}

pub async fn probe(
    api: &dyn SageMakerApi,
    domain_id: &str,
) -> ApiResult<Probe<DomainDescription, DomainStatus>> {
    probe_result(api.describe_domain(domain_id).await, |d| {
        (d.status, d.failure_reason.clone())
    })
}

pub async fn create(ctx: &Context<'_>, resource: &Resource) -> ProviderResult<State> {
    let request = CreateDomainRequest {
        domain_name: required(resource, "domain_name")?,
        auth_mode: required(resource, "auth_mode")?,
        vpc_id: required(resource, "vpc_id")?,
        subnet_ids: resource.strings("subnet_ids"),
        app_network_access_type: resource.string("app_network_access_type"),
        app_security_group_management: resource.string("app_security_group_management"),
        kms_key_id: resource.string("kms_key_id"),
        default_user_settings: resource
            .block("default_user_settings")
            .map(settings::user_settings)
            .unwrap_or_default(),
        domain_settings: resource.block("domain_settings").map(settings::domain_settings),
        default_space_settings: resource
            .block("default_space_settings")
            .map(settings::default_space_settings),
        tags: ctx.create_tags(resource),
    };

    let arn = ctx
        .api
        .create_domain(request)
        .await
        .map_err(failed(&resource.id, None, "creating SageMaker domain"))?;
    let domain_id = decode_domain_id(&arn)
        .map_err(failed(&resource.id, Some(&arn), "creating SageMaker domain"))?;
    info!("created SageMaker domain {}", domain_id);

    let domain = ctx
        .waiter
        .wait(&IN_SERVICE, ctx.cancel, || probe(ctx.api, &domain_id))
        .await
        .map_err(failed(
            &resource.id,
            Some(&domain_id),
            "waiting for SageMaker domain creation",
        ))?
        .ok_or_else(|| disappeared(&resource.id, &domain_id))?;

    to_state(ctx, &resource.id, &domain).await
}

pub async fn read(ctx: &Context<'_>, id: &ResourceId, domain_id: &str) -> ProviderResult<State> {
    match probe(ctx.api, domain_id)
        .await
        .map_err(failed(id, Some(domain_id), "reading SageMaker domain"))?
    {
        Probe::NotFound => {
            warn!("SageMaker domain {} not found, removing from state", domain_id);
            Ok(State::not_found(id.clone()))
        }
        Probe::Found { described, .. } => to_state(ctx, id, &described).await,
    }
}

pub async fn update(ctx: &Context<'_>, from: &State, to: &Resource) -> ProviderResult<State> {
    let domain_id = identifier(&to.id, from.identifier.as_deref())?;

    let changed = |key: &&str| to.value(key).is_some() && to.changed(&from.attributes, key);
    if UPDATABLE.iter().any(changed) {
        warn_fixed_domain_settings(domain_id, from, to);
        let request = UpdateDomainRequest {
            domain_id: domain_id.to_string(),
            default_user_settings: to
                .block("default_user_settings")
                .map(settings::user_settings),
            domain_settings: to.block("domain_settings").map(|block| DomainSettingsUpdate {
                execution_role_identity_config: block.string("execution_role_identity_config"),
            }),
            default_space_settings: to
                .block("default_space_settings")
                .map(settings::default_space_settings),
        };
        ctx.api
            .update_domain(request)
            .await
            .map_err(failed(&to.id, Some(domain_id), "updating SageMaker domain"))?;
        ctx.waiter
            .wait(&IN_SERVICE, ctx.cancel, || probe(ctx.api, domain_id))
            .await
            .map_err(failed(
                &to.id,
                Some(domain_id),
                "waiting for SageMaker domain update",
            ))?;
    }

    ctx.sync_tags(arn_of(from)?, to)
        .await
        .map_err(failed(&to.id, Some(domain_id), "updating tags"))?;

    read(ctx, &to.id, domain_id).await
}

pub async fn delete(ctx: &Context<'_>, state: &State) -> ProviderResult<()> {
    let domain_id = identifier(&state.id, state.identifier.as_deref())?;
    let request = DeleteDomainRequest {
        domain_id: domain_id.to_string(),
        home_efs_file_system: state
            .attributes
            .block("retention_policy")
            .and_then(|policy| policy.string("home_efs_file_system")),
    };

    tolerate_not_found(ctx.api.delete_domain(request).await)
        .map_err(failed(&state.id, Some(domain_id), "deleting SageMaker domain"))?;
    ctx.waiter
        .wait(&DELETED, ctx.cancel, || probe(ctx.api, domain_id))
        .await
        .map_err(failed(
            &state.id,
            Some(domain_id),
            "waiting for SageMaker domain deletion",
        ))?;
    info!("deleted SageMaker domain {}", domain_id);
    Ok(())
}

async fn to_state(
    ctx: &Context<'_>,
    id: &ResourceId,
    domain: &DomainDescription,
) -> ProviderResult<State> {
    let mut attributes = Attributes::new();
    attributes
        .set("id", domain.domain_id.clone())
        .set("arn", domain.domain_arn.clone())
        .set_opt("domain_name", domain.domain_name.clone())
        .set_opt("auth_mode", domain.auth_mode.clone())
        .set_opt("vpc_id", domain.vpc_id.clone())
        .set_list("subnet_ids", &domain.subnet_ids)
        .set_opt(
            "app_network_access_type",
            domain.app_network_access_type.clone(),
        )
        .set_opt(
            "app_security_group_management",
            domain.app_security_group_management.clone(),
        )
        .set_opt("kms_key_id", domain.kms_key_id.clone())
        .set_opt("url", domain.url.clone())
        .set_opt(
            "home_efs_file_system_id",
            domain.home_efs_file_system_id.clone(),
        )
        .set_opt(
            "single_sign_on_managed_application_instance_id",
            domain.single_sign_on_managed_application_instance_id.clone(),
        )
        .set_opt(
            "security_group_id_for_domain_boundary",
            domain.security_group_id_for_domain_boundary.clone(),
        )
        .set_opt(
            "default_user_settings",
            domain
                .default_user_settings
                .as_ref()
                .map(settings::user_settings_value),
        )
        .set_opt(
            "domain_settings",
            domain.domain_settings.as_ref().map(settings::domain_settings_value),
        )
        .set_opt(
            "default_space_settings",
            domain
                .default_space_settings
                .as_ref()
                .map(settings::default_space_settings_value),
        )
        .set("status", domain.status.to_string());

    ctx.read_tags(&domain.domain_arn, &mut attributes)
        .await
        .map_err(failed(id, Some(&domain.domain_id), "listing tags"))?;

    Ok(State::existing(id.clone(), attributes.into_inner()).with_identifier(&domain.domain_id))
}
