//! SageMaker Studio schema definitions: domains, user profiles, spaces and apps

use settle_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::api::status::AppType;
use crate::resources::{app, domain, space, user_profile};

fn resource_spec_block() -> AttributeType {
    AttributeType::Block(vec![
        AttributeSchema::new("instance_type", AttributeType::String),
        AttributeSchema::new("lifecycle_config_arn", types::arn()),
        AttributeSchema::new("sagemaker_image_arn", types::arn()),
        AttributeSchema::new("sagemaker_image_version_arn", types::arn()),
    ])
}

fn default_resource_spec() -> AttributeSchema {
    AttributeSchema::new("default_resource_spec", resource_spec_block())
}

fn lifecycle_config_arns() -> AttributeSchema {
    AttributeSchema::new(
        "lifecycle_config_arns",
        AttributeType::List(Box::new(types::arn())),
    )
}

fn custom_image() -> AttributeSchema {
    AttributeSchema::new(
        "custom_image",
        AttributeType::List(Box::new(AttributeType::Block(vec![
            AttributeSchema::new("app_image_config_name", AttributeType::String).required(),
            AttributeSchema::new("image_name", AttributeType::String).required(),
            AttributeSchema::new("image_version_number", AttributeType::Int),
        ]))),
    )
}

fn jupyter_server_app_settings() -> AttributeSchema {
    AttributeSchema::new(
        "jupyter_server_app_settings",
        AttributeType::Block(vec![
            default_resource_spec(),
            lifecycle_config_arns(),
            AttributeSchema::new(
                "code_repository",
                AttributeType::List(Box::new(AttributeType::Block(vec![
                    AttributeSchema::new("repository_url", AttributeType::String).required(),
                ]))),
            ),
        ]),
    )
}

fn kernel_gateway_app_settings() -> AttributeSchema {
    AttributeSchema::new(
        "kernel_gateway_app_settings",
        AttributeType::Block(vec![
            default_resource_spec(),
            lifecycle_config_arns(),
            custom_image(),
        ]),
    )
}

fn feature_status() -> AttributeType {
    types::enumeration(&["ENABLED", "DISABLED"])
}

fn canvas_app_settings() -> AttributeSchema {
    let status_only = || {
        AttributeType::Block(vec![AttributeSchema::new("status", feature_status())])
    };
    AttributeSchema::new(
        "canvas_app_settings",
        AttributeType::Block(vec![
            AttributeSchema::new(
                "time_series_forecasting_settings",
                AttributeType::Block(vec![
                    AttributeSchema::new("status", feature_status()),
                    AttributeSchema::new("amazon_forecast_role_arn", types::arn()),
                ]),
            ),
            AttributeSchema::new(
                "model_register_settings",
                AttributeType::Block(vec![
                    AttributeSchema::new("status", feature_status()),
                    AttributeSchema::new("cross_account_model_register_role_arn", types::arn()),
                ]),
            ),
            AttributeSchema::new(
                "workspace_settings",
                AttributeType::Block(vec![
                    AttributeSchema::new("s3_artifact_path", AttributeType::String),
                    AttributeSchema::new("s3_kms_key_id", AttributeType::String),
                ]),
            ),
            AttributeSchema::new("direct_deploy_settings", status_only()),
            AttributeSchema::new("kendra_settings", status_only()),
            AttributeSchema::new(
                "identity_provider_oauth_settings",
                AttributeType::List(Box::new(AttributeType::Block(vec![
                    AttributeSchema::new(
                        "data_source_name",
                        types::enumeration(&["SalesforceGenie", "Snowflake"]),
                    ),
                    AttributeSchema::new("secret_arn", types::arn()).required(),
                    AttributeSchema::new("status", feature_status()),
                ]))),
            ),
        ]),
    )
}

fn user_settings_block() -> AttributeType {
    AttributeType::Block(vec![
        AttributeSchema::new("execution_role", types::arn()),
        AttributeSchema::new("security_groups", types::string_list()),
        AttributeSchema::new(
            "sharing_settings",
            AttributeType::Block(vec![
                AttributeSchema::new(
                    "notebook_output_option",
                    types::enumeration(&["Allowed", "Disabled"]),
                ),
                AttributeSchema::new("s3_output_path", AttributeType::String),
                AttributeSchema::new("s3_kms_key_id", AttributeType::String),
            ]),
        ),
        jupyter_server_app_settings(),
        kernel_gateway_app_settings(),
        AttributeSchema::new(
            "tensor_board_app_settings",
            AttributeType::Block(vec![default_resource_spec()]),
        ),
        AttributeSchema::new(
            "r_session_app_settings",
            AttributeType::Block(vec![default_resource_spec(), custom_image()]),
        ),
        AttributeSchema::new(
            "r_studio_server_pro_app_settings",
            AttributeType::Block(vec![
                AttributeSchema::new("access_status", feature_status()),
                AttributeSchema::new(
                    "user_group",
                    types::enumeration(&["R_STUDIO_ADMIN", "R_STUDIO_USER"]),
                ),
            ]),
        ),
        canvas_app_settings(),
    ])
}

fn space_settings_block() -> AttributeType {
    AttributeType::Block(vec![
        jupyter_server_app_settings(),
        kernel_gateway_app_settings(),
    ])
}

fn default_space_settings_block() -> AttributeType {
    AttributeType::Block(vec![
        AttributeSchema::new("execution_role", types::arn()).required(),
        AttributeSchema::new("security_groups", types::string_list()),
        jupyter_server_app_settings(),
        kernel_gateway_app_settings(),
    ])
}

fn domain_settings_block() -> AttributeType {
    AttributeType::Block(vec![
        AttributeSchema::new(
            "execution_role_identity_config",
            types::enumeration(&["USER_PROFILE_NAME", "DISABLED"]),
        ),
        AttributeSchema::new("security_group_ids", types::string_list()),
        AttributeSchema::new(
            "r_studio_server_pro_domain_settings",
            AttributeType::Block(vec![
                AttributeSchema::new("domain_execution_role_arn", types::arn()).required(),
                AttributeSchema::new("r_studio_connect_url", AttributeType::String),
                AttributeSchema::new("r_studio_package_manager_url", AttributeType::String),
                default_resource_spec(),
            ]),
        ),
    ])
}

pub(super) fn tags() -> [AttributeSchema; 2] {
    [
        AttributeSchema::new("tags", types::tags()).with_description("Tags of the resource"),
        AttributeSchema::new("tags_all", types::tags())
            .computed()
            .with_description("Tags including provider default tags"),
    ]
}

/// Common computed attributes
pub(super) fn arn_and_status() -> [AttributeSchema; 2] {
    [
        AttributeSchema::new("arn", types::arn()).computed(),
        AttributeSchema::new("status", AttributeType::String).computed(),
    ]
}

pub fn domain_schema() -> ResourceSchema {
    let schema = ResourceSchema::new(domain::RESOURCE_TYPE)
        .with_description("A SageMaker Studio domain")
        .attribute(
            AttributeSchema::new("domain_name", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("auth_mode", types::enumeration(&["IAM", "SSO"]))
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("vpc_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("subnet_ids", types::string_list())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new(
                "app_network_access_type",
                types::enumeration(&["PublicInternetOnly", "VpcOnly"]),
            )
            .force_new(),
        )
        .attribute(
            AttributeSchema::new(
                "app_security_group_management",
                types::enumeration(&["Service", "Customer"]),
            )
            .force_new(),
        )
        .attribute(AttributeSchema::new("kms_key_id", AttributeType::String).force_new())
        .attribute(
            AttributeSchema::new("default_user_settings", user_settings_block())
                .required()
                .with_description("Settings applied to every user profile of the domain"),
        )
        .attribute(AttributeSchema::new("domain_settings", domain_settings_block()))
        .attribute(
            AttributeSchema::new("default_space_settings", default_space_settings_block())
                .with_description("Settings applied to every space of the domain"),
        )
        .attribute(
            AttributeSchema::new(
                "retention_policy",
                AttributeType::Block(vec![AttributeSchema::new(
                    "home_efs_file_system",
                    types::enumeration(&["Retain", "Delete"]),
                )]),
            )
            .write_only()
            .with_description("What happens to the home EFS file system on deletion"),
        )
        .attribute(AttributeSchema::new("id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("url", AttributeType::String).computed())
        .attribute(AttributeSchema::new("home_efs_file_system_id", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new(
                "single_sign_on_managed_application_instance_id",
                AttributeType::String,
            )
            .computed(),
        )
        .attribute(
            AttributeSchema::new("security_group_id_for_domain_boundary", AttributeType::String)
                .computed(),
        );
    with_common(schema)
}

pub fn user_profile_schema() -> ResourceSchema {
    let schema = ResourceSchema::new(user_profile::RESOURCE_TYPE)
        .with_description("A user of a SageMaker Studio domain")
        .attribute(
            AttributeSchema::new("domain_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("user_profile_name", types::resource_name())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("single_sign_on_user_identifier", AttributeType::String)
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("single_sign_on_user_value", AttributeType::String).force_new(),
        )
        .attribute(AttributeSchema::new("user_settings", user_settings_block()))
        .attribute(
            AttributeSchema::new("home_efs_file_system_uid", AttributeType::String).computed(),
        );
    with_common(schema)
}

pub fn space_schema() -> ResourceSchema {
    let schema = ResourceSchema::new(space::RESOURCE_TYPE)
        .with_description("A shared space of a SageMaker Studio domain")
        .attribute(
            AttributeSchema::new("domain_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("space_name", types::resource_name())
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("space_settings", space_settings_block()))
        .attribute(
            AttributeSchema::new("home_efs_file_system_uid", AttributeType::String).computed(),
        );
    with_common(schema)
}

pub fn app_schema() -> ResourceSchema {
    let app_types: Vec<&str> = AppType::ALL.iter().map(AppType::as_str).collect();
    let schema = ResourceSchema::new(app::RESOURCE_TYPE)
        .with_description("An app launched for a SageMaker Studio user profile")
        .attribute(
            AttributeSchema::new("domain_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("user_profile_name", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("app_type", types::enumeration(&app_types))
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("app_name", types::resource_name())
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("resource_spec", resource_spec_block()).force_new());
    with_common(schema)
}

fn with_common(schema: ResourceSchema) -> ResourceSchema {
    tags()
        .into_iter()
        .chain(arn_and_status())
        .fold(schema, ResourceSchema::attribute)
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        domain_schema(),
        user_profile_schema(),
        space_schema(),
        app_schema(),
    ]
}
