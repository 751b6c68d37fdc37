//! SageMaker Augmented AI flow definition
//!
//! Flow definitions are immutable; only tags change in place.

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
use crate::api::status::FlowDefinitionStatus;
use crate::api::types::*;
use crate::api::{ApiResult, SageMakerApi};

pub const RESOURCE_TYPE: &str = "sagemaker_flow_definition";

pub const ACTIVE: WaitSpec<FlowDefinitionStatus> = WaitSpec::new(
    &[FlowDefinitionStatus::Initializing],
    &[FlowDefinitionStatus::Active],
    Duration::from_secs(2 * 60),
);

pub const DELETED: WaitSpec<FlowDefinitionStatus> = WaitSpec::new(
    &[FlowDefinitionStatus::Deleting],
    &[],
    Duration::from_secs(2 * 60),
);

pub async fn probe(
    api: &dyn SageMakerApi,
    name: &str,
) -> ApiResult<Probe<FlowDefinitionDescription, FlowDefinitionStatus>> {
    probe_result(api.describe_flow_definition(name).await, |f| {
        (f.status, f.failure_reason.clone())
    })
}

fn human_loop_config(resource: &Resource) -> ProviderResult<HumanLoopConfig> {
    let block = resource.block("human_loop_config").ok_or_else(|| {
        ProviderError::new("'human_loop_config' is required").for_resource(resource.id.clone())
    })?;
    let field = |key: &str| {
        block.string(key).ok_or_else(|| {
            ProviderError::new(format!("'human_loop_config.{}' is required", key))
                .for_resource(resource.id.clone())
        })
    };

    Ok(HumanLoopConfig {
        workteam_arn: field("workteam_arn")?,
        human_task_ui_arn: field("human_task_ui_arn")?,
        task_title: field("task_title")?,
        task_description: field("task_description")?,
        task_count: block.int32("task_count").ok_or_else(|| {
            ProviderError::new("'human_loop_config.task_count' is required")
                .for_resource(resource.id.clone())
        })?,
        task_availability_lifetime_in_seconds: block
            .int32("task_availability_lifetime_in_seconds"),
        task_time_limit_in_seconds: block.int32("task_time_limit_in_seconds"),
        task_keywords: block.strings("task_keywords"),
    })
}

fn human_loop_config_value(config: &HumanLoopConfig) -> Value {
    let mut block = Attributes::new();
    block
        .set("workteam_arn", config.workteam_arn.clone())
        .set("human_task_ui_arn", config.human_task_ui_arn.clone())
        .set("task_title", config.task_title.clone())
        .set("task_description", config.task_description.clone())
        .set("task_count", i64::from(config.task_count))
        .set_opt(
            "task_availability_lifetime_in_seconds",
            config.task_availability_lifetime_in_seconds.map(i64::from),
        )
        .set_opt(
            "task_time_limit_in_seconds",
            config.task_time_limit_in_seconds.map(i64::from),
        )
        .set_list("task_keywords", &config.task_keywords);
    Value::Map(block.into_inner())
}

pub async fn create(ctx: &Context<'_>, resource: &Resource) -> ProviderResult<State> {
    let name = required(resource, "flow_definition_name")?;
    let output_config = resource.block("output_config").ok_or_else(|| {
        ProviderError::new("'output_config' is required").for_resource(resource.id.clone())
    })?;

    let request = CreateFlowDefinitionRequest {
        flow_definition_name: name.clone(),
        role_arn: required(resource, "role_arn")?,
        human_loop_config: human_loop_config(resource)?,
        output_s3_path: output_config.string("s3_output_path").ok_or_else(|| {
            ProviderError::new("'output_config.s3_output_path' is required")
                .for_resource(resource.id.clone())
        })?,
        output_kms_key_id: output_config.string("kms_key_id"),
        aws_managed_human_loop_request_source: resource
            .block("human_loop_request_source")
            .and_then(|block| block.string("aws_managed_human_loop_request_source")),
        tags: ctx.create_tags(resource),
    };

    ctx.api
        .create_flow_definition(request)
        .await
        .map_err(failed(&resource.id, None, "creating SageMaker flow definition"))?;
    info!("created SageMaker flow definition {}", name);

    let flow = ctx
        .waiter
        .wait(&ACTIVE, ctx.cancel, || probe(ctx.api, &name))
        .await
        .map_err(failed(
            &resource.id,
            Some(&name),
            "waiting for SageMaker flow definition creation",
        ))?
        .ok_or_else(|| disappeared(&resource.id, &name))?;

    to_state(ctx, &resource.id, &flow).await
}

pub async fn read(ctx: &Context<'_>, id: &ResourceId, name: &str) -> ProviderResult<State> {
    match probe(ctx.api, name)
        .await
        .map_err(failed(id, Some(name), "reading SageMaker flow definition"))?
    {
        Probe::NotFound => {
            warn!(
                "SageMaker flow definition {} not found, removing from state",
                name
            );
            Ok(State::not_found(id.clone()))
        }
        Probe::Found { described, .. } => to_state(ctx, id, &described).await,
    }
}

/// Only tags change in place
pub async fn update(ctx: &Context<'_>, from: &State, to: &Resource) -> ProviderResult<State> {
    let name = identifier(&to.id, from.identifier.as_deref())?;
    ctx.sync_tags(arn_of(from)?, to)
        .await
        .map_err(failed(&to.id, Some(name), "updating tags"))?;
    read(ctx, &to.id, name).await
}

pub async fn delete(ctx: &Context<'_>, state: &State) -> ProviderResult<()> {
    let name = identifier(&state.id, state.identifier.as_deref())?;

    tolerate_not_found(ctx.api.delete_flow_definition(name).await).map_err(failed(
        &state.id,
        Some(name),
        "deleting SageMaker flow definition",
    ))?;
    ctx.waiter
        .wait(&DELETED, ctx.cancel, || probe(ctx.api, name))
        .await
        .map_err(failed(
            &state.id,
            Some(name),
            "waiting for SageMaker flow definition deletion",
        ))?;
    info!("deleted SageMaker flow definition {}", name);
    Ok(())
}

async fn to_state(
    ctx: &Context<'_>,
    id: &ResourceId,
    flow: &FlowDefinitionDescription,
) -> ProviderResult<State> {
    let mut attributes = Attributes::new();
    attributes
        .set("arn", flow.arn.clone())
        .set("flow_definition_name", flow.flow_definition_name.clone())
        .set_opt("role_arn", flow.role_arn.clone())
        .set_opt(
            "human_loop_config",
            flow.human_loop_config.as_ref().map(human_loop_config_value),
        )
        .set("status", flow.status.to_string());

    if let Some(path) = &flow.output_s3_path {
        let mut block = Attributes::new();
        block
            .set("s3_output_path", path.clone())
            .set_opt("kms_key_id", flow.output_kms_key_id.clone());
        attributes.set("output_config", Value::Map(block.into_inner()));
    }
    if let Some(source) = &flow.aws_managed_human_loop_request_source {
        let mut block = HashMap::new();
        block.insert(
            "aws_managed_human_loop_request_source".to_string(),
            Value::from(source.as_str()),
        );
        attributes.set("human_loop_request_source", Value::Map(block));
    }

    ctx.read_tags(&flow.arn, &mut attributes)
        .await
        .map_err(failed(id, Some(&flow.flow_definition_name), "listing tags"))?;

    Ok(State::existing(id.clone(), attributes.into_inner())
        .with_identifier(&flow.flow_definition_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockApi;
    use crate::resources::testing::*;
    use serde_json::json;
    use settle_core::tags::Tags;
    use tokio_util::sync::CancellationToken;

    fn config() -> HumanLoopConfig {
        HumanLoopConfig {
            workteam_arn: format!("{}:workteam/private-crowd/reviewers", REGION_ARN),
            human_task_ui_arn: format!("{}:human-task-ui/review", REGION_ARN),
            task_title: "Review".to_string(),
            task_description: "Review extracted fields".to_string(),
            task_count: 1,
            task_availability_lifetime_in_seconds: None,
            task_time_limit_in_seconds: Some(3600),
            task_keywords: vec![],
        }
    }

    fn described(status: FlowDefinitionStatus) -> FlowDefinitionDescription {
        FlowDefinitionDescription {
            flow_definition_name: "review".to_string(),
            arn: format!("{}:flow-definition/review", REGION_ARN),
            status,
            failure_reason: None,
            role_arn: Some("arn:aws:iam::123456789012:role/a2i".to_string()),
            human_loop_config: Some(config()),
            output_s3_path: Some("s3://bucket/reviews".to_string()),
            output_kms_key_id: None,
            aws_managed_human_loop_request_source: Some(
                "AWS/Textract/AnalyzeDocument/Forms/V1".to_string(),
            ),
        }
    }

    fn desired() -> Resource {
        let attributes = Value::from_json(&json!({
            "flow_definition_name": "review",
            "role_arn": "arn:aws:iam::123456789012:role/a2i",
            "human_loop_config": {
                "workteam_arn": format!("{}:workteam/private-crowd/reviewers", REGION_ARN),
                "human_task_ui_arn": format!("{}:human-task-ui/review", REGION_ARN),
                "task_title": "Review",
                "task_description": "Review extracted fields",
                "task_count": 1,
                "task_time_limit_in_seconds": 3600
            },
            "output_config": { "s3_output_path": "s3://bucket/reviews" },
            "human_loop_request_source": {
                "aws_managed_human_loop_request_source": "AWS/Textract/AnalyzeDocument/Forms/V1"
            }
        }))
        .and_then(|v| v.as_map().cloned())
        .unwrap();
        Resource {
            id: ResourceId::new(RESOURCE_TYPE, "review"),
            attributes,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn create_reports_desired_shape() {
        let api = MockApi::new();
        api.create_flow_definition
            .ok(format!("{}:flow-definition/review", REGION_ARN));
        api.describe_flow_definition
            .ok(described(FlowDefinitionStatus::Initializing))
            .ok(described(FlowDefinitionStatus::Active));
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let resource = desired();
        let state = create(&ctx, &resource).await.unwrap();

        for key in [
            "human_loop_config",
            "output_config",
            "human_loop_request_source",
            "role_arn",
        ] {
            assert_eq!(state.attributes.get(key), resource.attributes.get(key), "{}", key);
        }
        assert!(api.arguments("create_flow_definition")[0].contains("Textract"));
    }

    #[tokio::test(start_paused = true)]
    async fn create_requires_task_count() {
        let api = MockApi::new();
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let mut resource = desired();
        if let Some(Value::Map(block)) = resource.attributes.get_mut("human_loop_config") {
            block.remove("task_count");
        }
        let err = create(&ctx, &resource).await.unwrap_err();
        assert!(err.to_string().contains("human_loop_config.task_count"));
    }

    #[tokio::test(start_paused = true)]
    async fn create_gives_up_after_two_minutes() {
        let api = MockApi::new();
        api.create_flow_definition
            .ok(format!("{}:flow-definition/review", REGION_ARN));
        api.describe_flow_definition
            .ok(described(FlowDefinitionStatus::Initializing));
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let err = create(&ctx, &desired()).await.unwrap_err();
        assert!(err.to_string().contains("last state: 'Initializing'"));
        // one probe at start and one per 5s interval up to the 2 minute limit
        assert_eq!(api.count("describe_flow_definition"), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_waits_until_gone() {
        let api = MockApi::new();
        api.delete_flow_definition.ok(());
        api.describe_flow_definition
            .ok(described(FlowDefinitionStatus::Deleting))
            .err(not_found());
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let state = State::existing(ResourceId::new(RESOURCE_TYPE, "review"), Default::default())
            .with_identifier("review");
        delete(&ctx, &state).await.unwrap();
        assert_eq!(api.count("describe_flow_definition"), 2);
    }

    #[test]
    fn wait_tables_are_disjoint() {
        assert!(ACTIVE.validate().is_ok());
        assert!(DELETED.validate().is_ok());
    }
}
