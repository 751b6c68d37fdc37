//! SageMaker image
//!
//! A named container for image versions. Identified by its name.

use std::time::Duration;

use log::{info, warn};
use settle_core::provider::ProviderResult;
use settle_core::resource::{Resource, ResourceId, State};
use settle_core::waiter::{Probe, WaitSpec};

use super::{
    AttributeMap, Attributes, Context, arn_of, disappeared, failed, identifier, probe_result, required,
    tolerate_not_found,
};
use crate::api::status::ImageStatus;
use crate::api::types::*;
use crate::api::{ApiResult, SageMakerApi};

pub const RESOURCE_TYPE: &str = "sagemaker_image";

pub const CREATED: WaitSpec<ImageStatus> = WaitSpec::new(
    &[ImageStatus::Creating, ImageStatus::Updating],
    &[ImageStatus::Created],
    Duration::from_secs(10 * 60),
);

pub const DELETED: WaitSpec<ImageStatus> =
    WaitSpec::new(&[ImageStatus::Deleting], &[], Duration::from_secs(10 * 60));

pub async fn probe(
    api: &dyn SageMakerApi,
    image_name: &str,
) -> ApiResult<Probe<ImageDescription, ImageStatus>> {
    probe_result(api.describe_image(image_name).await, |i| {
        (i.status, i.failure_reason.clone())
    })
}

pub async fn create(ctx: &Context<'_>, resource: &Resource) -> ProviderResult<State> {
    let image_name = required(resource, "image_name")?;
    let request = CreateImageRequest {
        image_name: image_name.clone(),
        role_arn: required(resource, "role_arn")?,
        display_name: resource.string("display_name"),
        description: resource.string("description"),
        tags: ctx.create_tags(resource),
    };

    ctx.api
        .create_image(request)
        .await
        .map_err(failed(&resource.id, None, "creating SageMaker image"))?;
    info!("created SageMaker image {}", image_name);

    let image = ctx
        .waiter
        .wait(&CREATED, ctx.cancel, || probe(ctx.api, &image_name))
        .await
        .map_err(failed(
            &resource.id,
            Some(&image_name),
            "waiting for SageMaker image creation",
        ))?
        .ok_or_else(|| disappeared(&resource.id, &image_name))?;

    to_state(ctx, &resource.id, &image).await
}

pub async fn read(ctx: &Context<'_>, id: &ResourceId, image_name: &str) -> ProviderResult<State> {
    match probe(ctx.api, image_name)
        .await
        .map_err(failed(id, Some(image_name), "reading SageMaker image"))?
    {
        Probe::NotFound => {
            warn!("SageMaker image {} not found, removing from state", image_name);
            Ok(State::not_found(id.clone()))
        }
        Probe::Found { described, .. } => to_state(ctx, id, &described).await,
    }
}

pub async fn update(ctx: &Context<'_>, from: &State, to: &Resource) -> ProviderResult<State> {
    let image_name = identifier(&to.id, from.identifier.as_deref())?;

    let request = update_request(image_name, from, to);
    if request.has_changes() {
        ctx.api
            .update_image(request)
            .await
            .map_err(failed(&to.id, Some(image_name), "updating SageMaker image"))?;
        ctx.waiter
            .wait(&CREATED, ctx.cancel, || probe(ctx.api, image_name))
            .await
            .map_err(failed(
                &to.id,
                Some(image_name),
                "waiting for SageMaker image update",
            ))?;
    }

    ctx.sync_tags(arn_of(from)?, to)
        .await
        .map_err(failed(&to.id, Some(image_name), "updating tags"))?;

    read(ctx, &to.id, image_name).await
}

/// Changed fields are sent; fields removed from the manifest are cleared
fn update_request(image_name: &str, from: &State, to: &Resource) -> UpdateImageRequest {
    let mut request = UpdateImageRequest {
        image_name: image_name.to_string(),
        ..Default::default()
    };

    if to.changed(&from.attributes, "role_arn") {
        request.role_arn = to.string("role_arn");
    }
    if to.changed(&from.attributes, "display_name") {
        match to.string("display_name") {
            Some(display_name) => request.display_name = Some(display_name),
            None => request.delete_properties.push("DisplayName".to_string()),
        }
    }
    if to.changed(&from.attributes, "description") {
        match to.string("description") {
            Some(description) => request.description = Some(description),
            None => request.delete_properties.push("Description".to_string()),
        }
    }
    request
}

pub async fn delete(ctx: &Context<'_>, state: &State) -> ProviderResult<()> {
    let image_name = identifier(&state.id, state.identifier.as_deref())?;

    tolerate_not_found(ctx.api.delete_image(image_name).await)
        .map_err(failed(&state.id, Some(image_name), "deleting SageMaker image"))?;
    ctx.waiter
        .wait(&DELETED, ctx.cancel, || probe(ctx.api, image_name))
        .await
        .map_err(failed(
            &state.id,
            Some(image_name),
            "waiting for SageMaker image deletion",
        ))?;
    info!("deleted SageMaker image {}", image_name);
    Ok(())
}

async fn to_state(
    ctx: &Context<'_>,
    id: &ResourceId,
    image: &ImageDescription,
) -> ProviderResult<State> {
    let mut attributes = Attributes::new();
    attributes
        .set("arn", image.arn.clone())
        .set("image_name", image.image_name.clone())
        .set_opt("role_arn", image.role_arn.clone())
        .set_opt("display_name", image.display_name.clone())
        .set_opt("description", image.description.clone())
        .set("status", image.status.to_string());

    ctx.read_tags(&image.arn, &mut attributes)
        .await
        .map_err(failed(id, Some(&image.image_name), "listing tags"))?;

    Ok(State::existing(id.clone(), attributes.into_inner()).with_identifier(&image.image_name))
}
