//! SageMaker Studio user profile
//!
//! Stored under its ARN. The domain id and profile name are recovered from
//! `user-profile/<domain-id>/<user-profile-name>`.

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
use crate::api::status::UserProfileStatus;
use crate::api::types::*;
use crate::api::{ApiResult, SageMakerApi};

pub const RESOURCE_TYPE: &str = "sagemaker_user_profile";

pub const IN_SERVICE: WaitSpec<UserProfileStatus> = WaitSpec::new(
    &[UserProfileStatus::Pending, UserProfileStatus::Updating],
    &[UserProfileStatus::InService],
    Duration::from_secs(10 * 60),
);

pub const DELETED: WaitSpec<UserProfileStatus> = WaitSpec::new(
    &[UserProfileStatus::Deleting],
    &[],
    Duration::from_secs(10 * 60),
);

pub fn decode_key(arn: &str) -> Result<UserProfileKey, IdentifierError> {
    let arn = Arn::parse(arn)?;
    let [domain_id, user_profile_name] = split_id::<2>(
        arn.resource_path("user-profile")?,
        "DOMAIN-ID/USER-PROFILE-NAME",
    )?;
    Ok(UserProfileKey {
        domain_id: domain_id.to_string(),
        user_profile_name: user_profile_name.to_string(),
    })
}

pub async fn probe(
    api: &dyn SageMakerApi,
    key: &UserProfileKey,
) -> ApiResult<Probe<UserProfileDescription, UserProfileStatus>> {
    probe_result(api.describe_user_profile(key).await, |p| {
        (p.status, p.failure_reason.clone())
    })
}

pub async fn create(ctx: &Context<'_>, resource: &Resource) -> ProviderResult<State> {
    let request = CreateUserProfileRequest {
        key: UserProfileKey {
            domain_id: required(resource, "domain_id")?,
            user_profile_name: required(resource, "user_profile_name")?,
        },
        single_sign_on_user_identifier: resource.string("single_sign_on_user_identifier"),
        single_sign_on_user_value: resource.string("single_sign_on_user_value"),
        user_settings: resource.block("user_settings").map(settings::user_settings),
        tags: ctx.create_tags(resource),
    };

    let arn = ctx
        .api
        .create_user_profile(request)
        .await
        .map_err(failed(&resource.id, None, "creating SageMaker user profile"))?;
    info!("created SageMaker user profile {}", arn);

    let key = decode_key(&arn).map_err(failed(
        &resource.id,
        Some(&arn),
        "creating SageMaker user profile",
    ))?;

    let profile = ctx
        .waiter
        .wait(&IN_SERVICE, ctx.cancel, || probe(ctx.api, &key))
        .await
        .map_err(failed(
            &resource.id,
            Some(&arn),
            "waiting for SageMaker user profile creation",
        ))?
        .ok_or_else(|| disappeared(&resource.id, &arn))?;

    to_state(ctx, &resource.id, &profile).await
}

pub async fn read(ctx: &Context<'_>, id: &ResourceId, arn: &str) -> ProviderResult<State> {
    let key = decode_key(arn).map_err(failed(id, Some(arn), "reading SageMaker user profile"))?;
    match probe(ctx.api, &key)
        .await
        .map_err(failed(id, Some(arn), "reading SageMaker user profile"))?
    {
        Probe::NotFound => {
            warn!("SageMaker user profile {} not found, removing from state", arn);
            Ok(State::not_found(id.clone()))
        }
        Probe::Found { described, .. } => to_state(ctx, id, &described).await,
    }
}

pub async fn update(ctx: &Context<'_>, from: &State, to: &Resource) -> ProviderResult<State> {
    let arn = identifier(&to.id, from.identifier.as_deref())?;
    let key = decode_key(arn).map_err(failed(&to.id, Some(arn), "updating SageMaker user profile"))?;

    if to.changed(&from.attributes, "user_settings") {
        let request = UpdateUserProfileRequest {
            key: key.clone(),
            user_settings: to.block("user_settings").map(settings::user_settings),
        };
        ctx.api
            .update_user_profile(request)
            .await
            .map_err(failed(&to.id, Some(arn), "updating SageMaker user profile"))?;
        ctx.waiter
            .wait(&IN_SERVICE, ctx.cancel, || probe(ctx.api, &key))
            .await
            .map_err(failed(
                &to.id,
                Some(arn),
                "waiting for SageMaker user profile update",
            ))?;
    }

    ctx.sync_tags(arn, to)
        .await
        .map_err(failed(&to.id, Some(arn), "updating tags"))?;

    read(ctx, &to.id, arn).await
}

pub async fn delete(ctx: &Context<'_>, state: &State) -> ProviderResult<()> {
    let arn = identifier(&state.id, state.identifier.as_deref())?;
    let key =
        decode_key(arn).map_err(failed(&state.id, Some(arn), "deleting SageMaker user profile"))?;

    tolerate_not_found(ctx.api.delete_user_profile(&key).await)
        .map_err(failed(&state.id, Some(arn), "deleting SageMaker user profile"))?;
    ctx.waiter
        .wait(&DELETED, ctx.cancel, || probe(ctx.api, &key))
        .await
        .map_err(failed(
            &state.id,
            Some(arn),
            "waiting for SageMaker user profile deletion",
        ))?;
    info!("deleted SageMaker user profile {}", arn);
    Ok(())
}

async fn to_state(
    ctx: &Context<'_>,
    id: &ResourceId,
    profile: &UserProfileDescription,
) -> ProviderResult<State> {
    let mut attributes = Attributes::new();
    attributes
        .set("arn", profile.arn.clone())
        .set("domain_id", profile.key.domain_id.clone())
        .set("user_profile_name", profile.key.user_profile_name.clone())
        .set_opt(
            "single_sign_on_user_identifier",
            profile.single_sign_on_user_identifier.clone(),
        )
        .set_opt(
            "single_sign_on_user_value",
            profile.single_sign_on_user_value.clone(),
        )
        .set_opt(
            "home_efs_file_system_uid",
            profile.home_efs_file_system_uid.clone(),
        )
        .set_opt(
            "user_settings",
            profile
                .user_settings
                .as_ref()
                .map(settings::user_settings_value),
        )
        .set("status", profile.status.to_string());

    ctx.read_tags(&profile.arn, &mut attributes)
        .await
        .map_err(failed(id, Some(&profile.arn), "listing tags"))?;

    Ok(State::existing(id.clone(), attributes.into_inner()).with_identifier(&profile.arn))
}
