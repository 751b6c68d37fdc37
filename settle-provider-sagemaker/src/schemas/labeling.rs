//! Human labeling schema definitions: workforces, workteams and flow definitions

use settle_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::studio::{arn_and_status, tags};
use crate::resources::{flow_definition, workforce, workteam};

fn required(name: &str, attr_type: AttributeType) -> AttributeSchema {
    AttributeSchema::new(name, attr_type).required()
}

pub fn workforce_schema() -> ResourceSchema {
    let schema = ResourceSchema::new(workforce::RESOURCE_TYPE)
        .with_description("A private labeling workforce")
        .attribute(
            AttributeSchema::new("workforce_name", types::resource_name())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new(
                "cognito_config",
                AttributeType::Block(vec![
                    required("client_id", AttributeType::String),
                    required("user_pool", AttributeType::String),
                ]),
            )
            .force_new()
            .with_description("Cognito user pool backing the workforce"),
        )
        .attribute(
            AttributeSchema::new(
                "oidc_config",
                AttributeType::Block(vec![
                    required("client_id", AttributeType::String),
                    AttributeSchema::new("client_secret", AttributeType::String)
                        .required()
                        .write_only(),
                    required("issuer", AttributeType::String),
                    required("authorization_endpoint", AttributeType::String),
                    required("token_endpoint", AttributeType::String),
                    required("user_info_endpoint", AttributeType::String),
                    required("logout_endpoint", AttributeType::String),
                    required("jwks_uri", AttributeType::String),
                ]),
            )
            .with_description("OIDC identity provider backing the workforce"),
        )
        .attribute(AttributeSchema::new(
            "source_ip_config",
            AttributeType::Block(vec![required(
                "cidrs",
                AttributeType::List(Box::new(types::cidr())),
            )]),
        ))
        .attribute(AttributeSchema::new("subdomain", AttributeType::String).computed());

    tags()
        .into_iter()
        .chain(arn_and_status())
        .fold(schema, ResourceSchema::attribute)
}

pub fn workteam_schema() -> ResourceSchema {
    let schema = ResourceSchema::new(workteam::RESOURCE_TYPE)
        .with_description("A private workteam drawn from a workforce")
        .attribute(
            AttributeSchema::new("workteam_name", types::resource_name())
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("workforce_name", AttributeType::String).force_new())
        .attribute(required("description", AttributeType::String))
        .attribute(AttributeSchema::new(
            "cognito_member_definition",
            AttributeType::List(Box::new(AttributeType::Block(vec![
                required("client_id", AttributeType::String),
                required("user_group", AttributeType::String),
                required("user_pool", AttributeType::String),
            ]))),
        ))
        .attribute(AttributeSchema::new(
            "notification_configuration",
            AttributeType::Block(vec![AttributeSchema::new(
                "notification_topic_arn",
                types::arn(),
            )]),
        ))
        .attribute(AttributeSchema::new("subdomain", AttributeType::String).computed())
        .attribute(AttributeSchema::new("arn", types::arn()).computed());

    tags().into_iter().fold(schema, ResourceSchema::attribute)
}

/// Flow definitions cannot be modified; every attribute but tags forces
/// replacement.
pub fn flow_definition_schema() -> ResourceSchema {
    let schema = ResourceSchema::new(flow_definition::RESOURCE_TYPE)
        .with_description("A human review workflow")
        .attribute(
            AttributeSchema::new("flow_definition_name", types::resource_name())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("role_arn", types::arn())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new(
                "human_loop_config",
                AttributeType::Block(vec![
                    required("workteam_arn", types::arn()),
                    required("human_task_ui_arn", types::arn()),
                    required("task_title", AttributeType::String),
                    required("task_description", AttributeType::String),
                    required("task_count", types::positive_int()),
                    AttributeSchema::new(
                        "task_availability_lifetime_in_seconds",
                        types::positive_int(),
                    ),
                    AttributeSchema::new("task_time_limit_in_seconds", types::positive_int()),
                    AttributeSchema::new("task_keywords", types::string_list()),
                ]),
            )
            .required()
            .force_new(),
        )
        .attribute(
            AttributeSchema::new(
                "output_config",
                AttributeType::Block(vec![
                    required("s3_output_path", AttributeType::String),
                    AttributeSchema::new("kms_key_id", AttributeType::String),
                ]),
            )
            .required()
            .force_new(),
        )
        .attribute(
            AttributeSchema::new(
                "human_loop_request_source",
                AttributeType::Block(vec![required(
                    "aws_managed_human_loop_request_source",
                    types::enumeration(&[
                        "AWS/Rekognition/DetectModerationLabels/Image/V3",
                        "AWS/Textract/AnalyzeDocument/Forms/V1",
                    ]),
                )]),
            )
            .force_new(),
        );

    tags()
        .into_iter()
        .chain(arn_and_status())
        .fold(schema, ResourceSchema::attribute)
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![workforce_schema(), workteam_schema(), flow_definition_schema()]
}
