//! SageMaker Studio shared space

use std::time::Duration;

use log::{info, warn};
use settle_core::arn::{Arn, IdentifierError, split_id};
use settle_core::provider::ProviderResult;
use settle_core::resource::{Resource, ResourceId, State};
use settle_core::waiter::{Probe, WaitSpec};

use super::{
    AttributeMap, Attributes, Context, disappeared, failed, identifier, probe_result, required,
    settings, tolerate_not_found,
};
use crate::api::status::SpaceStatus;
use crate::api::types::*;
use crate::api::{ApiResult, SageMakerApi};

pub const RESOURCE_TYPE: &str = "sagemaker_space";

pub const IN_SERVICE: WaitSpec<SpaceStatus> = WaitSpec::new(
    &[SpaceStatus::Pending, SpaceStatus::Updating],
    &[SpaceStatus::InService],
    Duration::from_secs(10 * 60),
);

pub const DELETED: WaitSpec<SpaceStatus> =
    WaitSpec::new(&[SpaceStatus::Deleting], &[], Duration::from_secs(10 * 60));

/// `space/<domain-id>/<space-name>`
pub fn decode_key(arn: &str) -> Result<SpaceKey, IdentifierError> {
    let arn = Arn::parse(arn)?;
    let [domain_id, space_name] =
        split_id::<2>(arn.resource_path("space")?, "DOMAIN-ID/SPACE-NAME")?;
    Ok(SpaceKey {
        domain_id: domain_id.to_string(),
        space_name: space_name.to_string(),
    })
}

pub async fn probe(
    api: &dyn SageMakerApi,
    key: &SpaceKey,
) -> ApiResult<Probe<SpaceDescription, SpaceStatus>> {
    probe_result(api.describe_space(key).await, |s| {
        (s.status, s.failure_reason.clone())
    })
}

pub async fn create(ctx: &Context<'_>, resource: &Resource) -> ProviderResult<State> {
    let request = CreateSpaceRequest {
        key: SpaceKey {
            domain_id: required(resource, "domain_id")?,
            space_name: required(resource, "space_name")?,
        },
        space_settings: resource.block("space_settings").map(settings::space_settings),
        tags: ctx.create_tags(resource),
    };

    let arn = ctx
        .api
        .create_space(request)
        .await
        .map_err(failed(&resource.id, None, "creating SageMaker space"))?;
    info!("created SageMaker space {}", arn);

    let key =
        decode_key(&arn).map_err(failed(&resource.id, Some(&arn), "creating SageMaker space"))?;

    let space = ctx
        .waiter
        .wait(&IN_SERVICE, ctx.cancel, || probe(ctx.api, &key))
        .await
        .map_err(failed(
            &resource.id,
            Some(&arn),
            "waiting for SageMaker space creation",
        ))?
        .ok_or_else(|| disappeared(&resource.id, &arn))?;

    to_state(ctx, &resource.id, &space).await
}

pub async fn read(ctx: &Context<'_>, id: &ResourceId, arn: &str) -> ProviderResult<State> {
    let key = decode_key(arn).map_err(failed(id, Some(arn), "reading SageMaker space"))?;
    match probe(ctx.api, &key)
        .await
        .map_err(failed(id, Some(arn), "reading SageMaker space"))?
    {
        Probe::NotFound => {
            warn!("SageMaker space {} not found, removing from state", arn);
            Ok(State::not_found(id.clone()))
        }
        Probe::Found { described, .. } => to_state(ctx, id, &described).await,
    }
}

pub async fn update(ctx: &Context<'_>, from: &State, to: &Resource) -> ProviderResult<State> {
    let arn = identifier(&to.id, from.identifier.as_deref())?;
    let key = decode_key(arn).map_err(failed(&to.id, Some(arn), "updating SageMaker space"))?;

    if to.changed(&from.attributes, "space_settings") {
        let request = UpdateSpaceRequest {
            key: key.clone(),
            space_settings: to.block("space_settings").map(settings::space_settings),
        };
        ctx.api
            .update_space(request)
            .await
            .map_err(failed(&to.id, Some(arn), "updating SageMaker space"))?;
        ctx.waiter
            .wait(&IN_SERVICE, ctx.cancel, || probe(ctx.api, &key))
            .await
            .map_err(failed(&to.id, Some(arn), "waiting for SageMaker space update"))?;
    }

    ctx.sync_tags(arn, to)
        .await
        .map_err(failed(&to.id, Some(arn), "updating tags"))?;

    read(ctx, &to.id, arn).await
}

pub async fn delete(ctx: &Context<'_>, state: &State) -> ProviderResult<()> {
    let arn = identifier(&state.id, state.identifier.as_deref())?;
    let key = decode_key(arn).map_err(failed(&state.id, Some(arn), "deleting SageMaker space"))?;

    tolerate_not_found(ctx.api.delete_space(&key).await)
        .map_err(failed(&state.id, Some(arn), "deleting SageMaker space"))?;
    ctx.waiter
        .wait(&DELETED, ctx.cancel, || probe(ctx.api, &key))
        .await
        .map_err(failed(
            &state.id,
            Some(arn),
            "waiting for SageMaker space deletion",
        ))?;
    info!("deleted SageMaker space {}", arn);
    Ok(())
}

async fn to_state(
    ctx: &Context<'_>,
    id: &ResourceId,
    space: &SpaceDescription,
) -> ProviderResult<State> {
    let mut attributes = Attributes::new();
    attributes
        .set("arn", space.arn.clone())
        .set("domain_id", space.key.domain_id.clone())
        .set("space_name", space.key.space_name.clone())
        .set_opt(
            "home_efs_file_system_uid",
            space.home_efs_file_system_uid.clone(),
        )
        .set_opt(
            "space_settings",
            space
                .space_settings
                .as_ref()
                .map(settings::space_settings_value),
        )
        .set("status", space.status.to_string());

    ctx.read_tags(&space.arn, &mut attributes)
        .await
        .map_err(failed(id, Some(&space.arn), "listing tags"))?;

    Ok(State::existing(id.clone(), attributes.into_inner()).with_identifier(&space.arn))
}
