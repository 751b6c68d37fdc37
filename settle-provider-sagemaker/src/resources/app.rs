//! SageMaker Studio app
//!
//! An app is addressed by four names: domain id, user profile name, app type
//! and app name. The state identifier is the app ARN, whose resource path is
//! `app/<domain-id>/<user-profile-name>/<app-type>/<app-name>` with the app
//! type lower-cased. Apps never change in place; every attribute but the
//! tags forces a replacement.
//!
//! A deleted app keeps answering describe calls with status `Deleted` for a
//! while, so `Deleted` reads as absent.

use std::time::Duration;

use log::{debug, info, warn};
use settle_core::arn::{Arn, IdentifierError, split_id};
use settle_core::provider::{ProviderError, ProviderResult};
use settle_core::resource::{Resource, ResourceId, State};
use settle_core::waiter::{Probe, WaitError, WaitSpec};

use super::{
    AttributeMap, Attributes, Context, disappeared, failed, identifier, probe_result, required,
    settings,
};
use crate::api::status::{AppStatus, AppType};
use crate::api::types::*;
use crate::api::{ApiError, ApiResult, SageMakerApi};
use crate::aws::VALIDATION_EXCEPTION;

pub const RESOURCE_TYPE: &str = "sagemaker_app";

pub const IN_SERVICE: WaitSpec<AppStatus> = WaitSpec::new(
    &[AppStatus::Pending],
    &[AppStatus::InService],
    Duration::from_secs(10 * 60),
);

/// An app that stops answering describe calls is as good as deleted
pub const DELETED: WaitSpec<AppStatus> = WaitSpec::new(
    &[AppStatus::Deleting],
    &[AppStatus::Deleted],
    Duration::from_secs(10 * 60),
)
.with_not_found_checks(0);

/// Validation messages of a delete that raced the service's own cleanup
const ALREADY_DELETED: [&str; 2] = [
    "has already been deleted",
    "previously failed and was automatically deleted",
];

const KEY_FORMAT: &str = "DOMAIN-ID/USER-PROFILE-NAME/APP-TYPE/APP-NAME";

pub fn decode_key(arn: &str) -> Result<AppKey, IdentifierError> {
    let arn = Arn::parse(arn)?;
    let path = arn.resource_path("app")?;
    let [domain_id, user_profile_name, app_type, app_name] = split_id::<4>(path, KEY_FORMAT)?;
    let app_type =
        AppType::from_arn_segment(app_type).ok_or_else(|| IdentifierError::UnexpectedFormat {
            id: path.to_string(),
            format: KEY_FORMAT.to_string(),
        })?;

    Ok(AppKey {
        domain_id: domain_id.to_string(),
        user_profile_name: user_profile_name.to_string(),
        app_type,
        app_name: app_name.to_string(),
    })
}

pub async fn probe(
    api: &dyn SageMakerApi,
    key: &AppKey,
) -> ApiResult<Probe<AppDescription, AppStatus>> {
    probe_result(api.describe_app(key).await, |a| {
        (a.status, a.failure_reason.clone())
    })
}

fn desired_key(resource: &Resource) -> ProviderResult<AppKey> {
    let app_type = required(resource, "app_type")?;
    let app_type = app_type.parse::<AppType>().map_err(|e| {
        ProviderError::new("invalid app_type")
            .for_resource(resource.id.clone())
            .with_cause(e)
    })?;

    Ok(AppKey {
        domain_id: required(resource, "domain_id")?,
        user_profile_name: required(resource, "user_profile_name")?,
        app_type,
        app_name: required(resource, "app_name")?,
    })
}

pub async fn create(ctx: &Context<'_>, resource: &Resource) -> ProviderResult<State> {
    let request = CreateAppRequest {
        key: desired_key(resource)?,
        resource_spec: resource.block("resource_spec").map(settings::resource_spec),
        tags: ctx.create_tags(resource),
    };

    let arn = ctx
        .api
        .create_app(request)
        .await
        .map_err(failed(&resource.id, None, "creating SageMaker app"))?;
    info!("created SageMaker app {}", arn);

    let key =
        decode_key(&arn).map_err(failed(&resource.id, Some(&arn), "creating SageMaker app"))?;

    let app = ctx
        .waiter
        .wait(&IN_SERVICE, ctx.cancel, || probe(ctx.api, &key))
        .await
        .map_err(failed(
            &resource.id,
            Some(&arn),
            "waiting for SageMaker app creation",
        ))?
        .ok_or_else(|| disappeared(&resource.id, &arn))?;

    to_state(ctx, &resource.id, &app).await
}

pub async fn read(ctx: &Context<'_>, id: &ResourceId, arn: &str) -> ProviderResult<State> {
    let key = decode_key(arn).map_err(failed(id, Some(arn), "reading SageMaker app"))?;
    match probe(ctx.api, &key)
        .await
        .map_err(failed(id, Some(arn), "reading SageMaker app"))?
    {
        Probe::Found { described, status, .. } if status != AppStatus::Deleted => {
            to_state(ctx, id, &described).await
        }
        _ => {
            warn!("SageMaker app {} not found, removing from state", arn);
            Ok(State::not_found(id.clone()))
        }
    }
}

/// Only tags change in place
pub async fn update(ctx: &Context<'_>, from: &State, to: &Resource) -> ProviderResult<State> {
    let arn = identifier(&to.id, from.identifier.as_deref())?;
    ctx.sync_tags(arn, to)
        .await
        .map_err(failed(&to.id, Some(arn), "updating tags"))?;
    read(ctx, &to.id, arn).await
}

pub async fn delete(ctx: &Context<'_>, state: &State) -> ProviderResult<()> {
    let arn = identifier(&state.id, state.identifier.as_deref())?;
    let key = decode_key(arn).map_err(failed(&state.id, Some(arn), "deleting SageMaker app"))?;

    let current = probe(ctx.api, &key)
        .await
        .map_err(failed(&state.id, Some(arn), "deleting SageMaker app"))?;
    if matches!(current.status(), None | Some(AppStatus::Deleted)) {
        debug!("SageMaker app {} is already deleted", arn);
        return Ok(());
    }

    match ctx.api.delete_app(&key).await {
        Ok(()) => {}
        Err(e) if is_already_deleted(&e) => {
            debug!("SageMaker app {} already gone: {}", arn, e);
        }
        Err(e) => return Err(failed(&state.id, Some(arn), "deleting SageMaker app")(e)),
    }

    match ctx
        .waiter
        .wait(&DELETED, ctx.cancel, || probe(ctx.api, &key))
        .await
    {
        Ok(_) | Err(WaitError::NotFound { .. }) => {
            info!("deleted SageMaker app {}", arn);
            Ok(())
        }
        Err(e) => Err(failed(
            &state.id,
            Some(arn),
            "waiting for SageMaker app deletion",
        )(e)),
    }
}

fn is_already_deleted(error: &ApiError) -> bool {
    error.is_not_found()
        || ALREADY_DELETED
            .iter()
            .any(|needle| error.is_service_error(VALIDATION_EXCEPTION, needle))
}

async fn to_state(
    ctx: &Context<'_>,
    id: &ResourceId,
    app: &AppDescription,
) -> ProviderResult<State> {
    let mut attributes = Attributes::new();
    attributes
        .set("arn", app.arn.clone())
        .set("domain_id", app.key.domain_id.clone())
        .set("user_profile_name", app.key.user_profile_name.clone())
        .set("app_type", app.key.app_type.to_string())
        .set("app_name", app.key.app_name.clone())
        .set_opt(
            "resource_spec",
            app.resource_spec
                .as_ref()
                .map(settings::resource_spec_value),
        )
        .set("status", app.status.to_string());

    ctx.read_tags(&app.arn, &mut attributes)
        .await
        .map_err(failed(id, Some(&app.arn), "listing tags"))?;

    Ok(State::existing(id.clone(), attributes.into_inner()).with_identifier(&app.arn))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockApi;
    use crate::resources::testing::*;
    use settle_core::tags::Tags;
    use tokio_util::sync::CancellationToken;

    const ARN: &str = "arn:aws:sagemaker:us-west-2:123456789012:app/domain123/user1/jupyterserver/app1";

    fn key() -> AppKey {
        AppKey {
            domain_id: "domain123".to_string(),
            user_profile_name: "user1".to_string(),
            app_type: AppType::JupyterServer,
            app_name: "app1".to_string(),
        }
    }

    fn described(status: AppStatus) -> AppDescription {
        AppDescription {
            key: key(),
            arn: ARN.to_string(),
            status,
            failure_reason: None,
            resource_spec: Some(ResourceSpec {
                instance_type: Some("system".to_string()),
                ..Default::default()
            }),
        }
    }

    fn desired() -> Resource {
        Resource::new(RESOURCE_TYPE, "jupyter")
            .with_attribute("domain_id", "domain123")
            .with_attribute("user_profile_name", "user1")
            .with_attribute("app_type", "JupyterServer")
            .with_attribute("app_name", "app1")
    }

    fn existing() -> State {
        State::existing(ResourceId::new(RESOURCE_TYPE, "jupyter"), Default::default())
            .with_identifier(ARN)
    }

    #[test]
    fn decode_key_from_lower_cased_arn() {
        assert_eq!(decode_key(ARN).unwrap(), key());

        let err = decode_key("arn:aws:sagemaker:us-west-2:123456789012:app/domain123/user1/jupyterserver")
            .unwrap_err();
        assert!(matches!(err, IdentifierError::UnexpectedFormat { .. }));

        let err = decode_key("arn:aws:sagemaker:us-west-2:123456789012:app/domain123/user1/notebook/app1")
            .unwrap_err();
        assert!(matches!(err, IdentifierError::UnexpectedFormat { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn create_waits_until_in_service() {
        let api = MockApi::new();
        api.create_app.ok(ARN.to_string());
        api.describe_app
            .ok(described(AppStatus::Pending))
            .ok(described(AppStatus::Pending))
            .ok(described(AppStatus::InService));
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let state = create(&ctx, &desired()).await.unwrap();

        assert_eq!(api.count("describe_app"), 3);
        assert_eq!(state.identifier.as_deref(), Some(ARN));
        assert_eq!(state.get_str("app_type"), Some("JupyterServer"));
        assert_eq!(state.get_str("status"), Some("InService"));
        assert!(api.arguments("describe_app")[0].contains("JupyterServer"));
    }

    #[tokio::test(start_paused = true)]
    async fn create_waits_on_the_key_decoded_from_the_returned_arn() {
        let api = MockApi::new();
        api.create_app.ok(ARN.to_string());
        api.describe_app.ok(described(AppStatus::InService));
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let desired = desired()
            .with_attribute("domain_id", "d-manifest")
            .with_attribute("app_name", "from-manifest");
        create(&ctx, &desired).await.unwrap();

        let probed = &api.arguments("describe_app")[0];
        assert!(probed.contains("domain123"));
        assert!(probed.contains("app1"));
        assert!(!probed.contains("from-manifest"));
    }

    #[tokio::test(start_paused = true)]
    async fn create_fails_on_a_three_segment_arn() {
        let short = "arn:aws:sagemaker:us-west-2:123456789012:app/domain123/user1/jupyterserver";
        let api = MockApi::new();
        api.create_app.ok(short.to_string());
        api.describe_app.ok(described(AppStatus::InService));
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let err = create(&ctx, &desired()).await.unwrap_err();
        assert_eq!(err.identifier.as_deref(), Some(short));
        assert!(err.to_string().contains("DOMAIN-ID/USER-PROFILE-NAME/APP-TYPE/APP-NAME"));
        assert_eq!(api.count("describe_app"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn create_rejects_unknown_app_type() {
        let api = MockApi::new();
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let err = create(&ctx, &desired().with_attribute("app_type", "jupyterserver"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid app_type"));
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_app_reports_vendor_reason() {
        let api = MockApi::new();
        api.create_app.ok(ARN.to_string());
        api.describe_app.ok(AppDescription {
            failure_reason: Some("Instance type unavailable".to_string()),
            ..described(AppStatus::Failed)
        });
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let err = create(&ctx, &desired()).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("unexpected state 'Failed'"));
        assert!(message.contains("Instance type unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn deleted_app_reads_as_absent() {
        let api = MockApi::new();
        api.describe_app.ok(described(AppStatus::Deleted));
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let state = read(&ctx, &ResourceId::new(RESOURCE_TYPE, "jupyter"), ARN)
            .await
            .unwrap();
        assert!(!state.exists);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_skips_already_deleted_app() {
        let api = MockApi::new();
        api.describe_app.ok(described(AppStatus::Deleted));
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        delete(&ctx, &existing()).await.unwrap();
        assert!(api.mutations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_waits_for_deleted() {
        let api = MockApi::new();
        api.delete_app.ok(());
        api.describe_app
            .ok(described(AppStatus::InService))
            .ok(described(AppStatus::Deleting))
            .ok(described(AppStatus::Deleted));
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        delete(&ctx, &existing()).await.unwrap();
        assert_eq!(api.mutations(), vec!["delete_app"]);
        assert_eq!(api.count("describe_app"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_tolerates_automatic_cleanup() {
        let api = MockApi::new();
        api.describe_app
            .ok(described(AppStatus::Failed))
            .err(not_found());
        api.delete_app.err(ApiError::Service {
            code: "ValidationException".to_string(),
            message: "App previously failed and was automatically deleted".to_string(),
        });
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        delete(&ctx, &existing()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn delete_is_idempotent() {
        let api = MockApi::new();
        api.describe_app.err(not_found());
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        delete(&ctx, &existing()).await.unwrap();
        delete(&ctx, &existing()).await.unwrap();
        assert!(api.mutations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn other_delete_errors_propagate() {
        let api = MockApi::new();
        api.describe_app.ok(described(AppStatus::InService));
        api.delete_app.err(ApiError::Service {
            code: "ValidationException".to_string(),
            message: "App is in use".to_string(),
        });
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let err = delete(&ctx, &existing()).await.unwrap_err();
        assert!(err.to_string().contains("App is in use"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wait_stops_polling() {
        let api = MockApi::new();
        api.create_app.ok(ARN.to_string());
        api.describe_app.ok(described(AppStatus::Pending));
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            token.cancel();
        });

        let err = create(&ctx, &desired()).await.unwrap_err();
        assert!(err.to_string().contains("wait cancelled (last state: 'Pending')"));
        assert_eq!(api.count("describe_app"), 3);
    }

    #[test]
    fn wait_tables_are_disjoint() {
        assert!(IN_SERVICE.validate().is_ok());
        assert!(DELETED.validate().is_ok());
    }
}
