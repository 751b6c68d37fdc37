//! SageMaker image version
//!
//! Identified by the image name; describe calls report the image's latest
//! version. Every attribute forces a new version.

use std::time::Duration;

use log::{info, warn};
use settle_core::provider::ProviderResult;
use settle_core::resource::{Resource, ResourceId, State};
use settle_core::waiter::{Probe, WaitSpec};

use super::{
    AttributeMap, Attributes, Context, disappeared, failed, identifier, probe_result, required,
    tolerate_not_found,
};
use crate::api::status::ImageVersionStatus;
use crate::api::types::*;
use crate::api::{ApiResult, SageMakerApi};

pub const RESOURCE_TYPE: &str = "sagemaker_image_version";

pub const CREATED: WaitSpec<ImageVersionStatus> = WaitSpec::new(
    &[ImageVersionStatus::Creating],
    &[ImageVersionStatus::Created],
    Duration::from_secs(10 * 60),
);

pub const DELETED: WaitSpec<ImageVersionStatus> = WaitSpec::new(
    &[ImageVersionStatus::Deleting],
    &[],
    Duration::from_secs(10 * 60),
);

pub async fn probe(
    api: &dyn SageMakerApi,
    image_name: &str,
) -> ApiResult<Probe<ImageVersionDescription, ImageVersionStatus>> {
    probe_result(api.describe_image_version(image_name).await, |v| {
        (v.status, v.failure_reason.clone())
    })
}

/// Probe one specific version; once the latest version is another one, ours is gone
async fn probe_version(
    api: &dyn SageMakerApi,
    image_name: &str,
    version: Option<i32>,
) -> ApiResult<Probe<ImageVersionDescription, ImageVersionStatus>> {
    let observed = probe(api, image_name).await?;
    if let (Probe::Found { described, .. }, Some(version)) = (&observed, version)
        && described.version != Some(version)
    {
        return Ok(Probe::NotFound);
    }
    Ok(observed)
}

pub async fn create(ctx: &Context<'_>, resource: &Resource) -> ProviderResult<State> {
    let image_name = required(resource, "image_name")?;
    let request = CreateImageVersionRequest {
        image_name: image_name.clone(),
        base_image: required(resource, "base_image")?,
    };

    let arn = ctx
        .api
        .create_image_version(request)
        .await
        .map_err(failed(&resource.id, None, "creating SageMaker image version"))?;
    info!("created SageMaker image version {}", arn);

    let version = ctx
        .waiter
        .wait(&CREATED, ctx.cancel, || probe(ctx.api, &image_name))
        .await
        .map_err(failed(
            &resource.id,
            Some(&image_name),
            "waiting for SageMaker image version creation",
        ))?
        .ok_or_else(|| disappeared(&resource.id, &image_name))?;

    Ok(to_state(&resource.id, &version))
}

pub async fn read(ctx: &Context<'_>, id: &ResourceId, image_name: &str) -> ProviderResult<State> {
    match probe(ctx.api, image_name)
        .await
        .map_err(failed(id, Some(image_name), "reading SageMaker image version"))?
    {
        Probe::NotFound => {
            warn!(
                "SageMaker image version of {} not found, removing from state",
                image_name
            );
            Ok(State::not_found(id.clone()))
        }
        Probe::Found { described, .. } => Ok(to_state(id, &described)),
    }
}

pub async fn delete(ctx: &Context<'_>, state: &State) -> ProviderResult<()> {
    let image_name = identifier(&state.id, state.identifier.as_deref())?;
    let version = state.attributes.int32("version");

    tolerate_not_found(ctx.api.delete_image_version(image_name, version).await).map_err(
        failed(&state.id, Some(image_name), "deleting SageMaker image version"),
    )?;
    ctx.waiter
        .wait(&DELETED, ctx.cancel, || {
            probe_version(ctx.api, image_name, version)
        })
        .await
        .map_err(failed(
            &state.id,
            Some(image_name),
            "waiting for SageMaker image version deletion",
        ))?;
    info!("deleted SageMaker image version {}", image_name);
    Ok(())
}

/// Image versions carry no tags of their own
fn to_state(id: &ResourceId, version: &ImageVersionDescription) -> State {
    let mut attributes = Attributes::new();
    attributes
        .set("arn", version.arn.clone())
        .set("image_name", version.image_name.clone())
        .set_opt("image_arn", version.image_arn.clone())
        .set_opt("version", version.version.map(i64::from))
        .set_opt("base_image", version.base_image.clone())
        .set_opt("container_image", version.container_image.clone())
        .set("status", version.status.to_string());

    State::existing(id.clone(), attributes.into_inner()).with_identifier(&version.image_name)
}
