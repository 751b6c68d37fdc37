//! Studio settings blocks shared by domains, user profiles, spaces and apps

use std::collections::HashMap;

use settle_core::resource::Value;

use super::{AttributeMap, Attributes};
use crate::api::types::*;

type Block = HashMap<String, Value>;

pub fn resource_spec(block: &Block) -> ResourceSpec {
    ResourceSpec {
        instance_type: block.string("instance_type"),
        lifecycle_config_arn: block.string("lifecycle_config_arn"),
        sagemaker_image_arn: block.string("sagemaker_image_arn"),
        sagemaker_image_version_arn: block.string("sagemaker_image_version_arn"),
    }
}

pub fn resource_spec_value(spec: &ResourceSpec) -> Value {
    string_block(&[
        ("instance_type", &spec.instance_type),
        ("lifecycle_config_arn", &spec.lifecycle_config_arn),
        ("sagemaker_image_arn", &spec.sagemaker_image_arn),
        ("sagemaker_image_version_arn", &spec.sagemaker_image_version_arn),
    ])
}

/// A block of optional string attributes
fn string_block(fields: &[(&str, &Option<String>)]) -> Value {
    let mut attrs = Attributes::new();
    for (key, value) in fields {
        attrs.set_opt(key, (*value).clone());
    }
    Value::Map(attrs.into_inner())
}

/// Omitted when empty, like every other list the provider reports
fn block_list<T>(items: &[T], value: impl Fn(&T) -> Value) -> Option<Value> {
    (!items.is_empty()).then(|| Value::List(items.iter().map(value).collect()))
}

/// `{ default_resource_spec, lifecycle_config_arns, code_repository, custom_image }`
fn app_settings(block: &Block) -> AppSettings {
    AppSettings {
        default_resource_spec: block.block("default_resource_spec").map(resource_spec),
        lifecycle_config_arns: block.strings("lifecycle_config_arns"),
        code_repositories: block
            .blocks("code_repository")
            .into_iter()
            .filter_map(|repo| repo.string("repository_url"))
            .map(|repository_url| CodeRepository { repository_url })
            .collect(),
        custom_images: block
            .blocks("custom_image")
            .into_iter()
            .map(|image| CustomImage {
                app_image_config_name: image.string("app_image_config_name").unwrap_or_default(),
                image_name: image.string("image_name").unwrap_or_default(),
                image_version_number: image.int32("image_version_number"),
            })
            .collect(),
    }
}

fn app_settings_value(settings: &AppSettings) -> Value {
    let mut attrs = Attributes::new();
    attrs
        .set_opt(
            "default_resource_spec",
            settings.default_resource_spec.as_ref().map(resource_spec_value),
        )
        .set_list("lifecycle_config_arns", &settings.lifecycle_config_arns)
        .set_opt(
            "code_repository",
            block_list(&settings.code_repositories, |repo| {
                string_block(&[("repository_url", &Some(repo.repository_url.clone()))])
            }),
        )
        .set_opt(
            "custom_image",
            block_list(&settings.custom_images, |image| {
                let mut block = Attributes::new();
                block
                    .set("app_image_config_name", image.app_image_config_name.clone())
                    .set("image_name", image.image_name.clone())
                    .set_opt("image_version_number", image.image_version_number.map(i64::from));
                Value::Map(block.into_inner())
            }),
        );
    Value::Map(attrs.into_inner())
}

fn canvas_app_settings(block: &Block) -> CanvasAppSettings {
    let status_of = |key: &str| block.block(key).and_then(|b| b.string("status"));
    CanvasAppSettings {
        time_series_forecasting: block.block("time_series_forecasting_settings").map(|b| {
            TimeSeriesForecastingSettings {
                status: b.string("status"),
                amazon_forecast_role_arn: b.string("amazon_forecast_role_arn"),
            }
        }),
        model_register: block
            .block("model_register_settings")
            .map(|b| ModelRegisterSettings {
                status: b.string("status"),
                cross_account_model_register_role_arn: b
                    .string("cross_account_model_register_role_arn"),
            }),
        workspace: block
            .block("workspace_settings")
            .map(|b| CanvasWorkspaceSettings {
                s3_artifact_path: b.string("s3_artifact_path"),
                s3_kms_key_id: b.string("s3_kms_key_id"),
            }),
        direct_deploy_status: status_of("direct_deploy_settings"),
        kendra_status: status_of("kendra_settings"),
        identity_provider_oauth: block
            .blocks("identity_provider_oauth_settings")
            .into_iter()
            .map(|b| IdentityProviderOAuthSetting {
                data_source_name: b.string("data_source_name"),
                secret_arn: b.string("secret_arn"),
                status: b.string("status"),
            })
            .collect(),
    }
}

fn canvas_app_settings_value(canvas: &CanvasAppSettings) -> Value {
    let status_block = |status: &Option<String>| {
        status.as_ref().map(|_| string_block(&[("status", status)]))
    };
    let mut attrs = Attributes::new();
    attrs
        .set_opt(
            "time_series_forecasting_settings",
            canvas.time_series_forecasting.as_ref().map(|s| {
                string_block(&[
                    ("status", &s.status),
                    ("amazon_forecast_role_arn", &s.amazon_forecast_role_arn),
                ])
            }),
        )
        .set_opt(
            "model_register_settings",
            canvas.model_register.as_ref().map(|s| {
                string_block(&[
                    ("status", &s.status),
                    (
                        "cross_account_model_register_role_arn",
                        &s.cross_account_model_register_role_arn,
                    ),
                ])
            }),
        )
        .set_opt(
            "workspace_settings",
            canvas.workspace.as_ref().map(|s| {
                string_block(&[
                    ("s3_artifact_path", &s.s3_artifact_path),
                    ("s3_kms_key_id", &s.s3_kms_key_id),
                ])
            }),
        )
        .set_opt("direct_deploy_settings", status_block(&canvas.direct_deploy_status))
        .set_opt("kendra_settings", status_block(&canvas.kendra_status))
        .set_opt(
            "identity_provider_oauth_settings",
            block_list(&canvas.identity_provider_oauth, |s| {
                string_block(&[
                    ("data_source_name", &s.data_source_name),
                    ("secret_arn", &s.secret_arn),
                    ("status", &s.status),
                ])
            }),
        );
    Value::Map(attrs.into_inner())
}

pub fn user_settings(block: &Block) -> UserSettings {
    UserSettings {
        execution_role: block.string("execution_role"),
        security_groups: block.strings("security_groups"),
        sharing_settings: block.block("sharing_settings").map(|s| SharingSettings {
            notebook_output_option: s.string("notebook_output_option"),
            s3_output_path: s.string("s3_output_path"),
            s3_kms_key_id: s.string("s3_kms_key_id"),
        }),
        jupyter_server_app_settings: block.block("jupyter_server_app_settings").map(app_settings),
        kernel_gateway_app_settings: block.block("kernel_gateway_app_settings").map(app_settings),
        tensor_board_app_settings: block.block("tensor_board_app_settings").map(app_settings),
        r_session_app_settings: block.block("r_session_app_settings").map(app_settings),
        r_studio_server_pro_app_settings: block.block("r_studio_server_pro_app_settings").map(
            |s| RStudioServerProAppSettings {
                access_status: s.string("access_status"),
                user_group: s.string("user_group"),
            },
        ),
        canvas_app_settings: block.block("canvas_app_settings").map(canvas_app_settings),
    }
}

pub fn user_settings_value(settings: &UserSettings) -> Value {
    let mut attrs = Attributes::new();
    attrs
        .set_opt("execution_role", settings.execution_role.clone())
        .set_list("security_groups", &settings.security_groups)
        .set_opt(
            "sharing_settings",
            settings.sharing_settings.as_ref().map(|s| {
                string_block(&[
                    ("notebook_output_option", &s.notebook_output_option),
                    ("s3_output_path", &s.s3_output_path),
                    ("s3_kms_key_id", &s.s3_kms_key_id),
                ])
            }),
        )
        .set_opt(
            "jupyter_server_app_settings",
            settings.jupyter_server_app_settings.as_ref().map(app_settings_value),
        )
        .set_opt(
            "kernel_gateway_app_settings",
            settings.kernel_gateway_app_settings.as_ref().map(app_settings_value),
        )
        .set_opt(
            "tensor_board_app_settings",
            settings.tensor_board_app_settings.as_ref().map(app_settings_value),
        )
        .set_opt(
            "r_session_app_settings",
            settings.r_session_app_settings.as_ref().map(app_settings_value),
        )
        .set_opt(
            "r_studio_server_pro_app_settings",
            settings.r_studio_server_pro_app_settings.as_ref().map(|s| {
                string_block(&[
                    ("access_status", &s.access_status),
                    ("user_group", &s.user_group),
                ])
            }),
        )
        .set_opt(
            "canvas_app_settings",
            settings.canvas_app_settings.as_ref().map(canvas_app_settings_value),
        );
    Value::Map(attrs.into_inner())
}

pub fn space_settings(block: &Block) -> SpaceSettings {
    SpaceSettings {
        jupyter_server_app_settings: block.block("jupyter_server_app_settings").map(app_settings),
        kernel_gateway_app_settings: block.block("kernel_gateway_app_settings").map(app_settings),
    }
}

pub fn space_settings_value(settings: &SpaceSettings) -> Value {
    let mut attrs = Attributes::new();
    attrs
        .set_opt(
            "jupyter_server_app_settings",
            settings.jupyter_server_app_settings.as_ref().map(app_settings_value),
        )
        .set_opt(
            "kernel_gateway_app_settings",
            settings.kernel_gateway_app_settings.as_ref().map(app_settings_value),
        );
    Value::Map(attrs.into_inner())
}

pub fn default_space_settings(block: &Block) -> DefaultSpaceSettings {
    DefaultSpaceSettings {
        execution_role: block.string("execution_role"),
        security_groups: block.strings("security_groups"),
        jupyter_server_app_settings: block.block("jupyter_server_app_settings").map(app_settings),
        kernel_gateway_app_settings: block.block("kernel_gateway_app_settings").map(app_settings),
    }
}

pub fn default_space_settings_value(settings: &DefaultSpaceSettings) -> Value {
    let mut attrs = Attributes::new();
    attrs
        .set_opt("execution_role", settings.execution_role.clone())
        .set_list("security_groups", &settings.security_groups)
        .set_opt(
            "jupyter_server_app_settings",
            settings.jupyter_server_app_settings.as_ref().map(app_settings_value),
        )
        .set_opt(
            "kernel_gateway_app_settings",
            settings.kernel_gateway_app_settings.as_ref().map(app_settings_value),
        );
    Value::Map(attrs.into_inner())
}

pub fn domain_settings(block: &Block) -> DomainSettings {
    DomainSettings {
        execution_role_identity_config: block.string("execution_role_identity_config"),
        security_group_ids: block.strings("security_group_ids"),
        r_studio_server_pro_domain_settings: block
            .block("r_studio_server_pro_domain_settings")
            .map(|r| RStudioServerProDomainSettings {
                domain_execution_role_arn: r.string("domain_execution_role_arn").unwrap_or_default(),
                r_studio_connect_url: r.string("r_studio_connect_url"),
                r_studio_package_manager_url: r.string("r_studio_package_manager_url"),
                default_resource_spec: r.block("default_resource_spec").map(resource_spec),
            }),
    }
}

pub fn domain_settings_value(settings: &DomainSettings) -> Value {
    let mut attrs = Attributes::new();
    attrs
        .set_opt(
            "execution_role_identity_config",
            settings.execution_role_identity_config.clone(),
        )
        .set_list("security_group_ids", &settings.security_group_ids)
        .set_opt(
            "r_studio_server_pro_domain_settings",
            settings.r_studio_server_pro_domain_settings.as_ref().map(|r| {
                let mut block = Attributes::new();
                block
                    .set("domain_execution_role_arn", r.domain_execution_role_arn.clone())
                    .set_opt("r_studio_connect_url", r.r_studio_connect_url.clone())
                    .set_opt(
                        "r_studio_package_manager_url",
                        r.r_studio_package_manager_url.clone(),
                    )
                    .set_opt(
                        "default_resource_spec",
                        r.default_resource_spec.as_ref().map(resource_spec_value),
                    );
                Value::Map(block.into_inner())
            }),
        );
    Value::Map(attrs.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(json: serde_json::Value) -> Block {
        Value::from_json(&json)
            .and_then(|v| v.as_map().cloned())
            .unwrap()
    }

    #[test]
    fn user_settings_from_nested_blocks() {
        let settings = user_settings(&block(json!({
            "execution_role": "arn:aws:iam::123456789012:role/studio",
            "security_groups": ["sg-1"],
            "sharing_settings": { "notebook_output_option": "Allowed" },
            "kernel_gateway_app_settings": {
                "default_resource_spec": { "instance_type": "ml.t3.medium" }
            }
        })));

        assert_eq!(
            settings.execution_role.as_deref(),
            Some("arn:aws:iam::123456789012:role/studio")
        );
        assert_eq!(settings.security_groups, vec!["sg-1".to_string()]);
        assert_eq!(
            settings
                .sharing_settings
                .as_ref()
                .and_then(|s| s.notebook_output_option.as_deref()),
            Some("Allowed")
        );
        assert_eq!(
            settings
                .kernel_gateway_app_settings
                .as_ref()
                .and_then(|s| s.default_resource_spec.as_ref())
                .and_then(|s| s.instance_type.as_deref()),
            Some("ml.t3.medium")
        );
        assert!(settings.jupyter_server_app_settings.is_none());
    }

    #[test]
    fn reported_settings_use_manifest_shape() {
        let settings = UserSettings {
            execution_role: Some("role".to_string()),
            tensor_board_app_settings: Some(AppSettings {
                default_resource_spec: Some(ResourceSpec {
                    instance_type: Some("ml.t3.medium".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(
            user_settings_value(&settings).to_json(),
            json!({
                "execution_role": "role",
                "tensor_board_app_settings": {
                    "default_resource_spec": { "instance_type": "ml.t3.medium" }
                }
            })
        );
    }

    #[test]
    fn app_images_and_repositories() {
        let settings = user_settings(&block(json!({
            "jupyter_server_app_settings": {
                "lifecycle_config_arns": ["arn:aws:sagemaker:us-west-2:123456789012:studio-lifecycle-config/lc"],
                "code_repository": [{ "repository_url": "https://github.com/example/notebooks" }]
            },
            "kernel_gateway_app_settings": {
                "custom_image": [{
                    "app_image_config_name": "conda",
                    "image_name": "conda-env",
                    "image_version_number": 3
                }]
            }
        })));

        let jupyter = settings.jupyter_server_app_settings.unwrap();
        assert_eq!(
            jupyter.code_repositories,
            vec![CodeRepository {
                repository_url: "https://github.com/example/notebooks".to_string()
            }]
        );
        assert_eq!(jupyter.lifecycle_config_arns.len(), 1);
        assert!(jupyter.default_resource_spec.is_none());

        let kernel = settings.kernel_gateway_app_settings.unwrap();
        assert_eq!(kernel.custom_images[0].image_name, "conda-env");
        assert_eq!(kernel.custom_images[0].image_version_number, Some(3));
    }

    #[test]
    fn canvas_settings_keep_manifest_shape() {
        let manifest = json!({
            "canvas_app_settings": {
                "time_series_forecasting_settings": { "status": "ENABLED" },
                "direct_deploy_settings": { "status": "DISABLED" },
                "identity_provider_oauth_settings": [{
                    "data_source_name": "Snowflake",
                    "secret_arn": "arn:aws:secretsmanager:us-west-2:123456789012:secret:sf",
                    "status": "ENABLED"
                }]
            },
            "r_studio_server_pro_app_settings": {
                "access_status": "ENABLED",
                "user_group": "R_STUDIO_USER"
            }
        });
        let settings = user_settings(&block(manifest.clone()));

        let canvas = settings.canvas_app_settings.as_ref().unwrap();
        assert_eq!(canvas.direct_deploy_status.as_deref(), Some("DISABLED"));
        assert!(canvas.kendra_status.is_none());
        assert_eq!(
            canvas.identity_provider_oauth[0].data_source_name.as_deref(),
            Some("Snowflake")
        );
        assert_eq!(user_settings_value(&settings).to_json(), manifest);
    }

    #[test]
    fn domain_settings_with_rstudio() {
        let settings = domain_settings(&block(json!({
            "execution_role_identity_config": "USER_PROFILE_NAME",
            "security_group_ids": ["sg-1"],
            "r_studio_server_pro_domain_settings": {
                "domain_execution_role_arn": "arn:aws:iam::123456789012:role/rstudio",
                "default_resource_spec": { "instance_type": "system" }
            }
        })));

        assert_eq!(
            settings.execution_role_identity_config.as_deref(),
            Some("USER_PROFILE_NAME")
        );
        let rstudio = settings.r_studio_server_pro_domain_settings.as_ref().unwrap();
        assert_eq!(
            rstudio.domain_execution_role_arn,
            "arn:aws:iam::123456789012:role/rstudio"
        );
        assert!(rstudio.r_studio_connect_url.is_none());
        assert_eq!(
            domain_settings_value(&settings).to_json()["r_studio_server_pro_domain_settings"]
                ["default_resource_spec"],
            json!({ "instance_type": "system" })
        );
    }
}
