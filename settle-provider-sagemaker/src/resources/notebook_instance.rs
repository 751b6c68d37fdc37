//! SageMaker notebook instance
//!
//! A notebook instance only accepts configuration changes while it is
//! stopped. An update of a running instance stops it, applies the change
//! and starts it again. Deletion also requires a stopped or failed instance.

use std::time::Duration;

use log::{debug, info, warn};
use settle_core::provider::{ProviderError, ProviderResult};
use settle_core::resource::{Resource, ResourceId, State};
use settle_core::waiter::{Probe, WaitSpec};
use tokio::time::Instant;

use super::{
    AttributeMap, Attributes, Context, arn_of, disappeared, failed, identifier, probe_result,
    required, tolerate_not_found,
};
use crate::api::status::NotebookInstanceStatus as Status;
use crate::api::types::*;
use crate::api::{ApiError, ApiResult, SageMakerApi};
use crate::aws::VALIDATION_EXCEPTION;

pub const RESOURCE_TYPE: &str = "sagemaker_notebook_instance";

pub const IN_SERVICE: WaitSpec<Status> = WaitSpec::new(
    &[Status::Pending, Status::Updating, Status::Stopped],
    &[Status::InService],
    Duration::from_secs(60 * 60),
);

pub const STOPPED: WaitSpec<Status> = WaitSpec::new(
    &[Status::Stopping, Status::Updating],
    &[Status::Stopped],
    Duration::from_secs(10 * 60),
);

pub const STARTED: WaitSpec<Status> = WaitSpec::new(
    &[Status::Stopped, Status::Pending],
    &[Status::InService],
    Duration::from_secs(10 * 60),
);

pub const DELETED: WaitSpec<Status> =
    WaitSpec::new(&[Status::Deleting], &[], Duration::from_secs(10 * 60));

/// How long a start call is retried while the instance settles after an update
const START_RETRY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Attributes that are changed through UpdateNotebookInstance
const UPDATABLE: [&str; 6] = [
    "instance_type",
    "role_arn",
    "volume_size_in_gb",
    "lifecycle_config_name",
    "default_code_repository",
    "root_access",
];

pub async fn probe(
    api: &dyn SageMakerApi,
    name: &str,
) -> ApiResult<Probe<NotebookInstanceDescription, Status>> {
    probe_result(api.describe_notebook_instance(name).await, |n| {
        (n.status, n.failure_reason.clone())
    })
}

pub async fn create(ctx: &Context<'_>, resource: &Resource) -> ProviderResult<State> {
    let name = required(resource, "notebook_instance_name")?;
    let request = CreateNotebookInstanceRequest {
        notebook_instance_name: name.clone(),
        instance_type: required(resource, "instance_type")?,
        role_arn: required(resource, "role_arn")?,
        subnet_id: resource.string("subnet_id"),
        security_groups: resource.strings("security_groups"),
        kms_key_id: resource.string("kms_key_id"),
        lifecycle_config_name: resource.string("lifecycle_config_name"),
        direct_internet_access: resource.string("direct_internet_access"),
        root_access: resource.string("root_access"),
        volume_size_in_gb: resource.int32("volume_size_in_gb"),
        default_code_repository: resource.string("default_code_repository"),
        platform_identifier: resource.string("platform_identifier"),
        tags: ctx.create_tags(resource),
    };

    ctx.api
        .create_notebook_instance(request)
        .await
        .map_err(failed(&resource.id, None, "creating SageMaker notebook instance"))?;
    info!("created SageMaker notebook instance {}", name);

    let notebook = ctx
        .waiter
        .wait(&IN_SERVICE, ctx.cancel, || probe(ctx.api, &name))
        .await
        .map_err(failed(
            &resource.id,
            Some(&name),
            "waiting for SageMaker notebook instance creation",
        ))?
        .ok_or_else(|| disappeared(&resource.id, &name))?;

    to_state(ctx, &resource.id, &notebook).await
}

pub async fn read(ctx: &Context<'_>, id: &ResourceId, name: &str) -> ProviderResult<State> {
    match probe(ctx.api, name)
        .await
        .map_err(failed(id, Some(name), "reading SageMaker notebook instance"))?
    {
        Probe::NotFound => {
            warn!(
                "SageMaker notebook instance {} not found, removing from state",
                name
            );
            Ok(State::not_found(id.clone()))
        }
        Probe::Found { described, .. } => to_state(ctx, id, &described).await,
    }
}

fn update_request(name: &str, from: &State, to: &Resource) -> Option<UpdateNotebookInstanceRequest> {
    if !UPDATABLE.iter().any(|key| to.changed(&from.attributes, key)) {
        return None;
    }

    let lifecycle_config_name = to.string("lifecycle_config_name");
    Some(UpdateNotebookInstanceRequest {
        notebook_instance_name: name.to_string(),
        instance_type: to.string("instance_type"),
        role_arn: to.string("role_arn"),
        volume_size_in_gb: to.int32("volume_size_in_gb"),
        disassociate_lifecycle_config: lifecycle_config_name.is_none()
            && from.attributes.string("lifecycle_config_name").is_some(),
        lifecycle_config_name,
        default_code_repository: to.string("default_code_repository"),
        root_access: to.string("root_access"),
    })
}

pub async fn update(ctx: &Context<'_>, from: &State, to: &Resource) -> ProviderResult<State> {
    let name = identifier(&to.id, from.identifier.as_deref())?;

    if let Some(request) = update_request(name, from, to) {
        let initial = probe(ctx.api, name)
            .await
            .map_err(failed(&to.id, Some(name), "reading SageMaker notebook instance"))?
            .status()
            .ok_or_else(|| disappeared(&to.id, name))?;

        if initial != Status::Stopped {
            stop(ctx, &to.id, name).await?;
        }

        ctx.api
            .update_notebook_instance(request)
            .await
            .map_err(failed(&to.id, Some(name), "updating SageMaker notebook instance"))?;
        ctx.waiter
            .wait(&STOPPED, ctx.cancel, || probe(ctx.api, name))
            .await
            .map_err(failed(
                &to.id,
                Some(name),
                "waiting for SageMaker notebook instance update",
            ))?;

        if initial == Status::InService {
            start(ctx, &to.id, name).await?;
        }
    }

    ctx.sync_tags(arn_of(from)?, to)
        .await
        .map_err(failed(&to.id, Some(name), "updating tags"))?;

    read(ctx, &to.id, name).await
}

async fn stop(ctx: &Context<'_>, id: &ResourceId, name: &str) -> ProviderResult<()> {
    debug!("stopping SageMaker notebook instance {}", name);
    ctx.api
        .stop_notebook_instance(name)
        .await
        .map_err(failed(id, Some(name), "stopping SageMaker notebook instance"))?;
    ctx.waiter
        .wait(&STOPPED, ctx.cancel, || probe(ctx.api, name))
        .await
        .map_err(failed(
            id,
            Some(name),
            "waiting for SageMaker notebook instance to stop",
        ))?;
    Ok(())
}

/// Start a stopped instance. Right after an update the service can still
/// reject the call with a validation error, which is retried for a while.
async fn start(ctx: &Context<'_>, id: &ResourceId, name: &str) -> ProviderResult<()> {
    debug!("starting SageMaker notebook instance {}", name);
    let started = Instant::now();
    loop {
        match ctx.api.start_notebook_instance(name).await {
            Ok(()) => break,
            Err(e) if is_retryable_start(&e) && started.elapsed() < START_RETRY_TIMEOUT => {
                debug!("retrying start of {}: {}", name, e);
                tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => {
                        return Err(ProviderError::new("start of notebook instance cancelled")
                            .for_resource(id.clone())
                            .with_identifier(name));
                    }
                    _ = tokio::time::sleep(ctx.waiter.poll_interval()) => {}
                }
            }
            Err(e) => {
                return Err(failed(id, Some(name), "starting SageMaker notebook instance")(e));
            }
        }
    }

    ctx.waiter
        .wait(&STARTED, ctx.cancel, || probe(ctx.api, name))
        .await
        .map_err(failed(
            id,
            Some(name),
            "waiting for SageMaker notebook instance to start",
        ))?;
    Ok(())
}

fn is_retryable_start(error: &ApiError) -> bool {
    matches!(error, ApiError::Service { code, .. } if code == VALIDATION_EXCEPTION)
}

pub async fn delete(ctx: &Context<'_>, state: &State) -> ProviderResult<()> {
    let name = identifier(&state.id, state.identifier.as_deref())?;

    let status = match probe(ctx.api, name)
        .await
        .map_err(failed(&state.id, Some(name), "deleting SageMaker notebook instance"))?
        .status()
    {
        Some(status) => status,
        None => {
            debug!("SageMaker notebook instance {} is already gone", name);
            return Ok(());
        }
    };
    if !matches!(status, Status::Stopped | Status::Failed) {
        stop(ctx, &state.id, name).await?;
    }

    tolerate_not_found(ctx.api.delete_notebook_instance(name).await).map_err(failed(
        &state.id,
        Some(name),
        "deleting SageMaker notebook instance",
    ))?;
    ctx.waiter
        .wait(&DELETED, ctx.cancel, || probe(ctx.api, name))
        .await
        .map_err(failed(
            &state.id,
            Some(name),
            "waiting for SageMaker notebook instance deletion",
        ))?;
    info!("deleted SageMaker notebook instance {}", name);
    Ok(())
}

async fn to_state(
    ctx: &Context<'_>,
    id: &ResourceId,
    notebook: &NotebookInstanceDescription,
) -> ProviderResult<State> {
    let mut attributes = Attributes::new();
    attributes
        .set("arn", notebook.arn.clone())
        .set(
            "notebook_instance_name",
            notebook.notebook_instance_name.clone(),
        )
        .set_opt("url", notebook.url.clone())
        .set_opt("instance_type", notebook.instance_type.clone())
        .set_opt("role_arn", notebook.role_arn.clone())
        .set_opt("subnet_id", notebook.subnet_id.clone())
        .set_list("security_groups", &notebook.security_groups)
        .set_opt("kms_key_id", notebook.kms_key_id.clone())
        .set_opt(
            "network_interface_id",
            notebook.network_interface_id.clone(),
        )
        .set_opt(
            "lifecycle_config_name",
            notebook.lifecycle_config_name.clone(),
        )
        .set_opt(
            "direct_internet_access",
            notebook.direct_internet_access.clone(),
        )
        .set_opt("root_access", notebook.root_access.clone())
        .set_opt("volume_size_in_gb", notebook.volume_size_in_gb.map(i64::from))
        .set_opt(
            "default_code_repository",
            notebook.default_code_repository.clone(),
        )
        .set_opt("platform_identifier", notebook.platform_identifier.clone())
        .set("status", notebook.status.to_string());

    ctx.read_tags(&notebook.arn, &mut attributes)
        .await
        .map_err(failed(id, Some(&notebook.notebook_instance_name), "listing tags"))?;

    Ok(State::existing(id.clone(), attributes.into_inner())
        .with_identifier(&notebook.notebook_instance_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::testing::*;
    use crate::api::mock::MockApi;
    use settle_core::resource::Value;
    use settle_core::tags::Tags;
    use tokio_util::sync::CancellationToken;

    fn described(status: Status) -> NotebookInstanceDescription {
        NotebookInstanceDescription {
            notebook_instance_name: "analysis".to_string(),
            arn: format!("{}:notebook-instance/analysis", REGION_ARN),
            status,
            failure_reason: None,
            url: Some("analysis.notebook.us-west-2.sagemaker.aws".to_string()),
            instance_type: Some("ml.t3.medium".to_string()),
            role_arn: Some("arn:aws:iam::123456789012:role/notebook".to_string()),
            subnet_id: None,
            security_groups: vec![],
            kms_key_id: None,
            network_interface_id: None,
            lifecycle_config_name: Some("bootstrap".to_string()),
            direct_internet_access: Some("Enabled".to_string()),
            root_access: Some("Enabled".to_string()),
            volume_size_in_gb: Some(5),
            default_code_repository: None,
            platform_identifier: Some("notebook-al2-v2".to_string()),
        }
    }

    fn current() -> State {
        let mut attributes = std::collections::HashMap::new();
        attributes.insert("arn".to_string(), Value::from("arn:notebook"));
        attributes.insert("instance_type".to_string(), Value::from("ml.t3.medium"));
        attributes.insert(
            "role_arn".to_string(),
            Value::from("arn:aws:iam::123456789012:role/notebook"),
        );
        attributes.insert("lifecycle_config_name".to_string(), Value::from("bootstrap"));
        State::existing(ResourceId::new(RESOURCE_TYPE, "analysis"), attributes)
            .with_identifier("analysis")
    }

    fn desired(instance_type: &str) -> Resource {
        Resource::new(RESOURCE_TYPE, "analysis")
            .with_attribute("notebook_instance_name", "analysis")
            .with_attribute("instance_type", instance_type)
            .with_attribute("role_arn", "arn:aws:iam::123456789012:role/notebook")
            .with_attribute("lifecycle_config_name", "bootstrap")
    }

    #[tokio::test(start_paused = true)]
    async fn update_of_running_instance_stops_and_restarts() {
        let api = MockApi::new();
        api.describe_notebook_instance
            .ok(described(Status::InService))
            .ok(described(Status::Stopping))
            .ok(described(Status::Stopped))
            .ok(described(Status::Updating))
            .ok(described(Status::Stopped))
            .ok(described(Status::Pending))
            .ok(described(Status::InService));
        api.stop_notebook_instance.ok(());
        api.update_notebook_instance.ok(());
        api.start_notebook_instance.ok(());
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let state = update(&ctx, &current(), &desired("ml.m5.xlarge")).await.unwrap();

        assert_eq!(
            api.mutations(),
            vec![
                "stop_notebook_instance",
                "update_notebook_instance",
                "start_notebook_instance"
            ]
        );
        assert!(api.arguments("update_notebook_instance")[0].contains("ml.m5.xlarge"));
        assert_eq!(state.get_str("status"), Some("InService"));
    }

    #[tokio::test(start_paused = true)]
    async fn update_of_stopped_instance_leaves_it_stopped() {
        let api = MockApi::new();
        api.describe_notebook_instance.ok(described(Status::Stopped));
        api.update_notebook_instance.ok(());
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        update(&ctx, &current(), &desired("ml.m5.xlarge")).await.unwrap();
        assert_eq!(api.mutations(), vec!["update_notebook_instance"]);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_retried_while_instance_settles() {
        let api = MockApi::new();
        api.describe_notebook_instance
            .ok(described(Status::InService))
            .ok(described(Status::Stopped))
            .ok(described(Status::Stopped))
            .ok(described(Status::InService));
        api.stop_notebook_instance.ok(());
        api.update_notebook_instance.ok(());
        api.start_notebook_instance
            .err(ApiError::Service {
                code: "ValidationException".to_string(),
                message: "Status (Updating) not in ([Stopped, Failed])".to_string(),
            })
            .ok(());
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        update(&ctx, &current(), &desired("ml.m5.xlarge")).await.unwrap();
        assert_eq!(api.count("start_notebook_instance"), 2);
    }

    #[test]
    fn removed_lifecycle_config_is_disassociated() {
        let to = Resource::new(RESOURCE_TYPE, "analysis")
            .with_attribute("instance_type", "ml.t3.medium")
            .with_attribute("role_arn", "arn:aws:iam::123456789012:role/notebook");

        let request = update_request("analysis", &current(), &to).unwrap();
        assert!(request.disassociate_lifecycle_config);
        assert!(request.lifecycle_config_name.is_none());

        assert!(update_request("analysis", &current(), &desired("ml.t3.medium")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_stops_running_instance_first() {
        let api = MockApi::new();
        api.describe_notebook_instance
            .ok(described(Status::InService))
            .ok(described(Status::Stopping))
            .ok(described(Status::Stopped))
            .ok(described(Status::Deleting))
            .err(not_found());
        api.stop_notebook_instance.ok(());
        api.delete_notebook_instance.ok(());
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        delete(&ctx, &current()).await.unwrap();
        assert_eq!(
            api.mutations(),
            vec!["stop_notebook_instance", "delete_notebook_instance"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn delete_of_failed_instance_skips_stop() {
        let api = MockApi::new();
        api.describe_notebook_instance
            .ok(described(Status::Failed))
            .err(not_found());
        api.delete_notebook_instance.ok(());
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        delete(&ctx, &current()).await.unwrap();
        assert_eq!(api.mutations(), vec!["delete_notebook_instance"]);
    }

    #[test]
    fn wait_tables_are_disjoint() {
        assert!(IN_SERVICE.validate().is_ok());
        assert!(STOPPED.validate().is_ok());
        assert!(STARTED.validate().is_ok());
        assert!(DELETED.validate().is_ok());
    }
}
