//! SageMaker private workteam
//!
//! Workteams report no lifecycle status, so no operation waits.

use std::collections::HashMap;

use log::{info, warn};
use settle_core::arn::Arn;
use settle_core::provider::{ProviderError, ProviderResult};
use settle_core::resource::{Resource, ResourceId, State, Value};

use super::{
    AttributeMap, Attributes, Context, arn_of, failed, identifier, required, tolerate_not_found,
};
use crate::api::types::*;

pub const RESOURCE_TYPE: &str = "sagemaker_workteam";

fn members(resource: &Resource) -> ProviderResult<Vec<CognitoMemberDefinition>> {
    resource
        .blocks("cognito_member_definition")
        .into_iter()
        .map(|member| -> ProviderResult<CognitoMemberDefinition> {
            let field = |key: &str| {
                member.string(key).ok_or_else(|| {
                    ProviderError::new(format!("'cognito_member_definition.{}' is required", key))
                        .for_resource(resource.id.clone())
                })
            };
            Ok(CognitoMemberDefinition {
                client_id: field("client_id")?,
                user_group: field("user_group")?,
                user_pool: field("user_pool")?,
            })
        })
        .collect()
}

fn notification_topic_arn(resource: &Resource) -> Option<String> {
    resource
        .block("notification_configuration")
        .and_then(|block| block.string("notification_topic_arn"))
}

pub async fn create(ctx: &Context<'_>, resource: &Resource) -> ProviderResult<State> {
    let workteam_name = required(resource, "workteam_name")?;
    let request = CreateWorkteamRequest {
        workteam_name: workteam_name.clone(),
        workforce_name: resource.string("workforce_name"),
        description: required(resource, "description")?,
        members: members(resource)?,
        notification_topic_arn: notification_topic_arn(resource),
        tags: ctx.create_tags(resource),
    };

    ctx.api
        .create_workteam(request)
        .await
        .map_err(failed(&resource.id, None, "creating SageMaker workteam"))?;
    info!("created SageMaker workteam {}", workteam_name);

    let state = read(ctx, &resource.id, &workteam_name).await?;
    if !state.exists {
        return Err(super::disappeared(&resource.id, &workteam_name));
    }
    Ok(state)
}

pub async fn read(
    ctx: &Context<'_>,
    id: &ResourceId,
    workteam_name: &str,
) -> ProviderResult<State> {
    let workteam = match ctx.api.describe_workteam(workteam_name).await {
        Ok(workteam) => workteam,
        Err(e) if e.is_not_found() => {
            warn!(
                "SageMaker workteam {} not found, removing from state",
                workteam_name
            );
            return Ok(State::not_found(id.clone()));
        }
        Err(e) => return Err(failed(id, Some(workteam_name), "reading SageMaker workteam")(e)),
    };

    let mut attributes = Attributes::new();
    attributes
        .set("arn", workteam.arn.clone())
        .set("workteam_name", workteam.workteam_name.clone())
        .set_opt("description", workteam.description.clone())
        .set_opt("subdomain", workteam.subdomain.clone())
        .set_opt(
            "workforce_name",
            workteam
                .workforce_arn
                .as_deref()
                .and_then(workforce_name_from_arn),
        );

    if !workteam.members.is_empty() {
        let definitions = workteam
            .members
            .iter()
            .map(|member| {
                let mut block = HashMap::new();
                block.insert("client_id".to_string(), Value::from(member.client_id.as_str()));
                block.insert("user_group".to_string(), Value::from(member.user_group.as_str()));
                block.insert("user_pool".to_string(), Value::from(member.user_pool.as_str()));
                Value::Map(block)
            })
            .collect();
        attributes.set("cognito_member_definition", Value::List(definitions));
    }
    if let Some(topic) = &workteam.notification_topic_arn {
        let mut block = HashMap::new();
        block.insert(
            "notification_topic_arn".to_string(),
            Value::from(topic.as_str()),
        );
        attributes.set("notification_configuration", Value::Map(block));
    }

    ctx.read_tags(&workteam.arn, &mut attributes)
        .await
        .map_err(failed(id, Some(workteam_name), "listing tags"))?;

    Ok(State::existing(id.clone(), attributes.into_inner()).with_identifier(workteam_name))
}

/// `workforce/<name>`
fn workforce_name_from_arn(arn: &str) -> Option<String> {
    Arn::parse(arn)
        .ok()?
        .resource_path("workforce")
        .ok()
        .map(str::to_string)
}

pub async fn update(ctx: &Context<'_>, from: &State, to: &Resource) -> ProviderResult<State> {
    let workteam_name = identifier(&to.id, from.identifier.as_deref())?;

    let mut request = UpdateWorkteamRequest {
        workteam_name: workteam_name.to_string(),
        ..Default::default()
    };
    let mut changed = false;
    if to.changed(&from.attributes, "description") {
        request.description = to.string("description");
        changed = true;
    }
    if to.changed(&from.attributes, "cognito_member_definition") {
        request.members = Some(members(to)?);
        changed = true;
    }
    if to.changed(&from.attributes, "notification_configuration") {
        // An empty topic clears the notification target
        request.notification_topic_arn = Some(notification_topic_arn(to).unwrap_or_default());
        changed = true;
    }

    if changed {
        ctx.api
            .update_workteam(request)
            .await
            .map_err(failed(&to.id, Some(workteam_name), "updating SageMaker workteam"))?;
    }

    ctx.sync_tags(arn_of(from)?, to)
        .await
        .map_err(failed(&to.id, Some(workteam_name), "updating tags"))?;

    read(ctx, &to.id, workteam_name).await
}

pub async fn delete(ctx: &Context<'_>, state: &State) -> ProviderResult<()> {
    let workteam_name = identifier(&state.id, state.identifier.as_deref())?;
    tolerate_not_found(ctx.api.delete_workteam(workteam_name).await).map_err(failed(
        &state.id,
        Some(workteam_name),
        "deleting SageMaker workteam",
    ))?;
    info!("deleted SageMaker workteam {}", workteam_name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockApi;
    use crate::resources::testing::*;
    use settle_core::tags::Tags;
    use tokio_util::sync::CancellationToken;

    fn described() -> WorkteamDescription {
        WorkteamDescription {
            workteam_name: "reviewers".to_string(),
            arn: format!("{}:workteam/private-crowd/reviewers", REGION_ARN),
            description: Some("Document reviewers".to_string()),
            members: vec![CognitoMemberDefinition {
                client_id: "client".to_string(),
                user_group: "reviewers".to_string(),
                user_pool: "us-west-2_pool".to_string(),
            }],
            notification_topic_arn: None,
            subdomain: Some("abc.labeling.us-west-2.sagemaker.aws".to_string()),
            workforce_arn: Some(format!("{}:workforce/default", REGION_ARN)),
        }
    }

    fn member() -> Value {
        let mut block = HashMap::new();
        block.insert("client_id".to_string(), Value::from("client"));
        block.insert("user_group".to_string(), Value::from("reviewers"));
        block.insert("user_pool".to_string(), Value::from("us-west-2_pool"));
        Value::Map(block)
    }

    fn desired() -> Resource {
        Resource::new(RESOURCE_TYPE, "reviewers")
            .with_attribute("workteam_name", "reviewers")
            .with_attribute("description", "Document reviewers")
            .with_attribute("cognito_member_definition", Value::List(vec![member()]))
    }

    #[tokio::test]
    async fn create_reads_back_without_waiting() {
        let api = MockApi::new();
        api.create_workteam
            .ok(format!("{}:workteam/private-crowd/reviewers", REGION_ARN));
        api.describe_workteam.ok(described());
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let state = create(&ctx, &desired()).await.unwrap();
        assert_eq!(api.count("describe_workteam"), 1);
        assert_eq!(state.get_str("workforce_name"), Some("default"));
        assert_eq!(
            state.attributes.get("cognito_member_definition"),
            Some(&Value::List(vec![member()]))
        );
    }

    #[tokio::test]
    async fn member_without_user_pool_is_rejected() {
        let api = MockApi::new();
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let mut block = HashMap::new();
        block.insert("client_id".to_string(), Value::from("client"));
        block.insert("user_group".to_string(), Value::from("reviewers"));
        let resource = desired()
            .with_attribute("cognito_member_definition", Value::List(vec![Value::Map(block)]));

        let err = create(&ctx, &resource).await.unwrap_err();
        assert!(err.to_string().contains("'cognito_member_definition.user_pool' is required"));
    }

    #[tokio::test]
    async fn removed_notification_clears_topic() {
        let api = MockApi::new();
        api.describe_workteam.ok(described());
        api.update_workteam.ok(());
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let mut topic = HashMap::new();
        topic.insert(
            "notification_topic_arn".to_string(),
            Value::from("arn:aws:sns:us-west-2:123456789012:labels"),
        );
        let mut attributes = desired().attributes;
        attributes.insert("notification_configuration".to_string(), Value::Map(topic));
        attributes.insert("arn".to_string(), Value::from("arn:workteam"));
        let from = State::existing(ResourceId::new(RESOURCE_TYPE, "reviewers"), attributes)
            .with_identifier("reviewers");

        update(&ctx, &from, &desired()).await.unwrap();
        let arguments = api.arguments("update_workteam");
        assert_eq!(arguments.len(), 1);
        assert!(arguments[0].contains("notification_topic_arn: Some(\"\")"));
        assert!(arguments[0].contains("members: None"));
    }

    #[tokio::test]
    async fn delete_of_missing_workteam_succeeds() {
        let api = MockApi::new();
        api.delete_workteam.err(not_found());
        let (waiter, cancel, defaults) = (waiter(), CancellationToken::new(), Tags::new());
        let ctx = context(&api, &waiter, &cancel, &defaults);

        let state = State::existing(ResourceId::new(RESOURCE_TYPE, "reviewers"), Default::default())
            .with_identifier("reviewers");
        delete(&ctx, &state).await.unwrap();
    }
}
