//! Conversions between the control-plane models and SDK shapes

use aws_sdk_sagemaker::types as sdk;

use super::{field, owned, strings};
use crate::api::types::*;

pub(super) fn resource_spec_to_sdk(spec: &ResourceSpec) -> sdk::ResourceSpec {
    sdk::ResourceSpec::builder()
        .set_instance_type(spec.instance_type.as_deref().map(sdk::AppInstanceType::from))
        .set_lifecycle_config_arn(spec.lifecycle_config_arn.clone())
        .set_sage_maker_image_arn(spec.sagemaker_image_arn.clone())
        .set_sage_maker_image_version_arn(spec.sagemaker_image_version_arn.clone())
        .build()
}

pub(super) fn resource_spec_from_sdk(spec: &sdk::ResourceSpec) -> ResourceSpec {
    ResourceSpec {
        instance_type: field(spec.instance_type()).map(|t| t.as_str().to_string()),
        lifecycle_config_arn: owned(spec.lifecycle_config_arn()),
        sagemaker_image_arn: owned(spec.sage_maker_image_arn()),
        sagemaker_image_version_arn: owned(spec.sage_maker_image_version_arn()),
    }
}

/// `None` for an empty list, so the field is left out of the request
fn list_to_sdk<T, S>(items: &[T], convert: impl Fn(&T) -> S) -> Option<Vec<S>> {
    (!items.is_empty()).then(|| items.iter().map(convert).collect())
}

fn items<'a, T>(value: impl Into<Option<&'a [T]>>) -> &'a [T] {
    value.into().unwrap_or_default()
}

fn enum_string<T: AsRef<str>>(value: Option<&T>) -> Option<String> {
    value.map(|v| v.as_ref().to_string())
}

fn spec_to_sdk(settings: &AppSettings) -> Option<sdk::ResourceSpec> {
    settings.default_resource_spec.as_ref().map(resource_spec_to_sdk)
}

fn custom_images_to_sdk(images: &[CustomImage]) -> Option<Vec<sdk::CustomImage>> {
    list_to_sdk(images, |image| {
        sdk::CustomImage::builder()
            .app_image_config_name(&image.app_image_config_name)
            .image_name(&image.image_name)
            .set_image_version_number(image.image_version_number)
            .build()
    })
}

fn custom_images_from_sdk(images: &[sdk::CustomImage]) -> Vec<CustomImage> {
    images
        .iter()
        .map(|image| CustomImage {
            app_image_config_name: owned(image.app_image_config_name()).unwrap_or_default(),
            image_name: owned(image.image_name()).unwrap_or_default(),
            image_version_number: image.image_version_number(),
        })
        .collect()
}

fn jupyter_to_sdk(settings: &AppSettings) -> sdk::JupyterServerAppSettings {
    sdk::JupyterServerAppSettings::builder()
        .set_default_resource_spec(spec_to_sdk(settings))
        .set_lifecycle_config_arns(list_to_sdk(&settings.lifecycle_config_arns, String::clone))
        .set_code_repositories(list_to_sdk(&settings.code_repositories, |repo| {
            sdk::CodeRepository::builder()
                .repository_url(&repo.repository_url)
                .build()
        }))
        .build()
}

fn jupyter_from_sdk(settings: &sdk::JupyterServerAppSettings) -> AppSettings {
    AppSettings {
        default_resource_spec: field(settings.default_resource_spec()).map(resource_spec_from_sdk),
        lifecycle_config_arns: strings(settings.lifecycle_config_arns()),
        code_repositories: items(settings.code_repositories())
            .iter()
            .filter_map(|repo| owned(repo.repository_url()))
            .map(|repository_url| CodeRepository { repository_url })
            .collect(),
        custom_images: Vec::new(),
    }
}

fn kernel_gateway_to_sdk(settings: &AppSettings) -> sdk::KernelGatewayAppSettings {
    sdk::KernelGatewayAppSettings::builder()
        .set_default_resource_spec(spec_to_sdk(settings))
        .set_lifecycle_config_arns(list_to_sdk(&settings.lifecycle_config_arns, String::clone))
        .set_custom_images(custom_images_to_sdk(&settings.custom_images))
        .build()
}

fn kernel_gateway_from_sdk(settings: &sdk::KernelGatewayAppSettings) -> AppSettings {
    AppSettings {
        default_resource_spec: field(settings.default_resource_spec()).map(resource_spec_from_sdk),
        lifecycle_config_arns: strings(settings.lifecycle_config_arns()),
        code_repositories: Vec::new(),
        custom_images: custom_images_from_sdk(items(settings.custom_images())),
    }
}

fn canvas_to_sdk(canvas: &CanvasAppSettings) -> sdk::CanvasAppSettings {
    let feature = |status: &Option<String>| status.as_deref().map(sdk::FeatureStatus::from);

    let forecasting = canvas.time_series_forecasting.as_ref().map(|s| {
        sdk::TimeSeriesForecastingSettings::builder()
            .set_status(feature(&s.status))
            .set_amazon_forecast_role_arn(s.amazon_forecast_role_arn.clone())
            .build()
    });
    let model_register = canvas.model_register.as_ref().map(|s| {
        sdk::ModelRegisterSettings::builder()
            .set_status(feature(&s.status))
            .set_cross_account_model_register_role_arn(
                s.cross_account_model_register_role_arn.clone(),
            )
            .build()
    });
    let workspace = canvas.workspace.as_ref().map(|s| {
        sdk::WorkspaceSettings::builder()
            .set_s3_artifact_path(s.s3_artifact_path.clone())
            .set_s3_kms_key_id(s.s3_kms_key_id.clone())
            .build()
    });
    let direct_deploy = feature(&canvas.direct_deploy_status)
        .map(|status| sdk::DirectDeploySettings::builder().status(status).build());
    let kendra = feature(&canvas.kendra_status)
        .map(|status| sdk::KendraSettings::builder().status(status).build());
    let oauth = list_to_sdk(&canvas.identity_provider_oauth, |s| {
        sdk::IdentityProviderOAuthSetting::builder()
            .set_data_source_name(s.data_source_name.as_deref().map(sdk::DataSourceName::from))
            .set_secret_arn(s.secret_arn.clone())
            .set_status(feature(&s.status))
            .build()
    });

    sdk::CanvasAppSettings::builder()
        .set_time_series_forecasting_settings(forecasting)
        .set_model_register_settings(model_register)
        .set_workspace_settings(workspace)
        .set_direct_deploy_settings(direct_deploy)
        .set_kendra_settings(kendra)
        .set_identity_provider_o_auth_settings(oauth)
        .build()
}

fn canvas_from_sdk(canvas: &sdk::CanvasAppSettings) -> CanvasAppSettings {
    CanvasAppSettings {
        time_series_forecasting: field(canvas.time_series_forecasting_settings()).map(|s| {
            TimeSeriesForecastingSettings {
                status: enum_string(field(s.status())),
                amazon_forecast_role_arn: owned(s.amazon_forecast_role_arn()),
            }
        }),
        model_register: field(canvas.model_register_settings()).map(|s| ModelRegisterSettings {
            status: enum_string(field(s.status())),
            cross_account_model_register_role_arn: owned(s.cross_account_model_register_role_arn()),
        }),
        workspace: field(canvas.workspace_settings()).map(|s| CanvasWorkspaceSettings {
            s3_artifact_path: owned(s.s3_artifact_path()),
            s3_kms_key_id: owned(s.s3_kms_key_id()),
        }),
        direct_deploy_status: field(canvas.direct_deploy_settings())
            .and_then(|s| enum_string(field(s.status()))),
        kendra_status: field(canvas.kendra_settings()).and_then(|s| enum_string(field(s.status()))),
        identity_provider_oauth: items(canvas.identity_provider_o_auth_settings())
            .iter()
            .map(|s| IdentityProviderOAuthSetting {
                data_source_name: enum_string(field(s.data_source_name())),
                secret_arn: owned(s.secret_arn()),
                status: enum_string(field(s.status())),
            })
            .collect(),
    }
}

pub(super) fn user_settings_to_sdk(settings: &UserSettings) -> sdk::UserSettings {
    let sharing = settings.sharing_settings.as_ref().map(|s| {
        sdk::SharingSettings::builder()
            .set_notebook_output_option(
                s.notebook_output_option
                    .as_deref()
                    .map(sdk::NotebookOutputOption::from),
            )
            .set_s3_output_path(s.s3_output_path.clone())
            .set_s3_kms_key_id(s.s3_kms_key_id.clone())
            .build()
    });
    let tensor_board = settings.tensor_board_app_settings.as_ref().map(|s| {
        sdk::TensorBoardAppSettings::builder()
            .set_default_resource_spec(spec_to_sdk(s))
            .build()
    });
    let r_session = settings.r_session_app_settings.as_ref().map(|s| {
        sdk::RSessionAppSettings::builder()
            .set_default_resource_spec(spec_to_sdk(s))
            .set_custom_images(custom_images_to_sdk(&s.custom_images))
            .build()
    });
    let r_studio = settings.r_studio_server_pro_app_settings.as_ref().map(|s| {
        sdk::RStudioServerProAppSettings::builder()
            .set_access_status(
                s.access_status
                    .as_deref()
                    .map(sdk::RStudioServerProAccessStatus::from),
            )
            .set_user_group(s.user_group.as_deref().map(sdk::RStudioServerProUserGroup::from))
            .build()
    });

    sdk::UserSettings::builder()
        .set_execution_role(settings.execution_role.clone())
        .set_security_groups(list_to_sdk(&settings.security_groups, String::clone))
        .set_sharing_settings(sharing)
        .set_jupyter_server_app_settings(
            settings.jupyter_server_app_settings.as_ref().map(jupyter_to_sdk),
        )
        .set_kernel_gateway_app_settings(
            settings
                .kernel_gateway_app_settings
                .as_ref()
                .map(kernel_gateway_to_sdk),
        )
        .set_tensor_board_app_settings(tensor_board)
        .set_r_session_app_settings(r_session)
        .set_r_studio_server_pro_app_settings(r_studio)
        .set_canvas_app_settings(settings.canvas_app_settings.as_ref().map(canvas_to_sdk))
        .build()
}

pub(super) fn user_settings_from_sdk(settings: &sdk::UserSettings) -> UserSettings {
    UserSettings {
        execution_role: owned(settings.execution_role()),
        security_groups: strings(settings.security_groups()),
        sharing_settings: field(settings.sharing_settings()).map(|s| SharingSettings {
            notebook_output_option: enum_string(field(s.notebook_output_option())),
            s3_output_path: owned(s.s3_output_path()),
            s3_kms_key_id: owned(s.s3_kms_key_id()),
        }),
        jupyter_server_app_settings: field(settings.jupyter_server_app_settings())
            .map(jupyter_from_sdk),
        kernel_gateway_app_settings: field(settings.kernel_gateway_app_settings())
            .map(kernel_gateway_from_sdk),
        tensor_board_app_settings: field(settings.tensor_board_app_settings()).map(|s| {
            AppSettings {
                default_resource_spec: field(s.default_resource_spec()).map(resource_spec_from_sdk),
                ..Default::default()
            }
        }),
        r_session_app_settings: field(settings.r_session_app_settings()).map(|s| AppSettings {
            default_resource_spec: field(s.default_resource_spec()).map(resource_spec_from_sdk),
            custom_images: custom_images_from_sdk(items(s.custom_images())),
            ..Default::default()
        }),
        r_studio_server_pro_app_settings: field(settings.r_studio_server_pro_app_settings()).map(
            |s| RStudioServerProAppSettings {
                access_status: enum_string(field(s.access_status())),
                user_group: enum_string(field(s.user_group())),
            },
        ),
        canvas_app_settings: field(settings.canvas_app_settings()).map(canvas_from_sdk),
    }
}

pub(super) fn space_settings_to_sdk(settings: &SpaceSettings) -> sdk::SpaceSettings {
    sdk::SpaceSettings::builder()
        .set_jupyter_server_app_settings(
            settings.jupyter_server_app_settings.as_ref().map(jupyter_to_sdk),
        )
        .set_kernel_gateway_app_settings(
            settings
                .kernel_gateway_app_settings
                .as_ref()
                .map(kernel_gateway_to_sdk),
        )
        .build()
}

pub(super) fn space_settings_from_sdk(settings: &sdk::SpaceSettings) -> SpaceSettings {
    SpaceSettings {
        jupyter_server_app_settings: field(settings.jupyter_server_app_settings())
            .map(jupyter_from_sdk),
        kernel_gateway_app_settings: field(settings.kernel_gateway_app_settings())
            .map(kernel_gateway_from_sdk),
    }
}

pub(super) fn default_space_settings_to_sdk(
    settings: &DefaultSpaceSettings,
) -> sdk::DefaultSpaceSettings {
    sdk::DefaultSpaceSettings::builder()
        .set_execution_role(settings.execution_role.clone())
        .set_security_groups(list_to_sdk(&settings.security_groups, String::clone))
        .set_jupyter_server_app_settings(
            settings.jupyter_server_app_settings.as_ref().map(jupyter_to_sdk),
        )
        .set_kernel_gateway_app_settings(
            settings
                .kernel_gateway_app_settings
                .as_ref()
                .map(kernel_gateway_to_sdk),
        )
        .build()
}

pub(super) fn default_space_settings_from_sdk(
    settings: &sdk::DefaultSpaceSettings,
) -> DefaultSpaceSettings {
    DefaultSpaceSettings {
        execution_role: owned(settings.execution_role()),
        security_groups: strings(settings.security_groups()),
        jupyter_server_app_settings: field(settings.jupyter_server_app_settings())
            .map(jupyter_from_sdk),
        kernel_gateway_app_settings: field(settings.kernel_gateway_app_settings())
            .map(kernel_gateway_from_sdk),
    }
}

pub(super) fn domain_settings_to_sdk(settings: &DomainSettings) -> sdk::DomainSettings {
    let r_studio = settings.r_studio_server_pro_domain_settings.as_ref().map(|r| {
        sdk::RStudioServerProDomainSettings::builder()
            .domain_execution_role_arn(&r.domain_execution_role_arn)
            .set_r_studio_connect_url(r.r_studio_connect_url.clone())
            .set_r_studio_package_manager_url(r.r_studio_package_manager_url.clone())
            .set_default_resource_spec(r.default_resource_spec.as_ref().map(resource_spec_to_sdk))
            .build()
    });

    sdk::DomainSettings::builder()
        .set_execution_role_identity_config(
            settings
                .execution_role_identity_config
                .as_deref()
                .map(sdk::ExecutionRoleIdentityConfig::from),
        )
        .set_security_group_ids(list_to_sdk(&settings.security_group_ids, String::clone))
        .set_r_studio_server_pro_domain_settings(r_studio)
        .build()
}

pub(super) fn domain_settings_from_sdk(settings: &sdk::DomainSettings) -> DomainSettings {
    DomainSettings {
        execution_role_identity_config: enum_string(field(
            settings.execution_role_identity_config(),
        )),
        security_group_ids: strings(settings.security_group_ids()),
        r_studio_server_pro_domain_settings: field(settings.r_studio_server_pro_domain_settings())
            .map(|r| RStudioServerProDomainSettings {
                domain_execution_role_arn: owned(r.domain_execution_role_arn()).unwrap_or_default(),
                r_studio_connect_url: owned(r.r_studio_connect_url()),
                r_studio_package_manager_url: owned(r.r_studio_package_manager_url()),
                default_resource_spec: field(r.default_resource_spec()).map(resource_spec_from_sdk),
            }),
    }
}

pub(super) fn domain_settings_update_to_sdk(
    update: &DomainSettingsUpdate,
) -> sdk::DomainSettingsForUpdate {
    sdk::DomainSettingsForUpdate::builder()
        .set_execution_role_identity_config(
            update
                .execution_role_identity_config
                .as_deref()
                .map(sdk::ExecutionRoleIdentityConfig::from),
        )
        .build()
}

pub(super) fn cognito_config_to_sdk(config: &CognitoConfig) -> sdk::CognitoConfig {
    sdk::CognitoConfig::builder()
        .client_id(&config.client_id)
        .user_pool(&config.user_pool)
        .build()
}

pub(super) fn oidc_config_to_sdk(config: &OidcConfig) -> sdk::OidcConfig {
    sdk::OidcConfig::builder()
        .client_id(&config.client_id)
        .set_client_secret(config.client_secret.clone())
        .issuer(&config.issuer)
        .authorization_endpoint(&config.authorization_endpoint)
        .token_endpoint(&config.token_endpoint)
        .user_info_endpoint(&config.user_info_endpoint)
        .logout_endpoint(&config.logout_endpoint)
        .jwks_uri(&config.jwks_uri)
        .build()
}

pub(super) fn source_ip_config_to_sdk(cidrs: &[String]) -> sdk::SourceIpConfig {
    sdk::SourceIpConfig::builder()
        .set_cidrs(Some(cidrs.to_vec()))
        .build()
}

pub(super) fn members_to_sdk(
    members: &[CognitoMemberDefinition],
) -> Vec<sdk::MemberDefinition> {
    members
        .iter()
        .map(|m| {
            let cognito = sdk::CognitoMemberDefinition::builder()
                .client_id(&m.client_id)
                .user_group(&m.user_group)
                .user_pool(&m.user_pool)
                .build();
            sdk::MemberDefinition::builder()
                .cognito_member_definition(cognito)
                .build()
        })
        .collect()
}

pub(super) fn members_from_sdk(members: &[sdk::MemberDefinition]) -> Vec<CognitoMemberDefinition> {
    members
        .iter()
        .filter_map(|m| field(m.cognito_member_definition()))
        .map(|c| CognitoMemberDefinition {
            client_id: owned(c.client_id()).unwrap_or_default(),
            user_group: owned(c.user_group()).unwrap_or_default(),
            user_pool: owned(c.user_pool()).unwrap_or_default(),
        })
        .collect()
}

pub(super) fn notification_to_sdk(topic_arn: Option<&str>) -> sdk::NotificationConfiguration {
    sdk::NotificationConfiguration::builder()
        .set_notification_topic_arn(topic_arn.map(str::to_string))
        .build()
}

pub(super) fn human_loop_config_to_sdk(
    config: &HumanLoopConfig,
) -> sdk::HumanLoopConfig {
    sdk::HumanLoopConfig::builder()
        .workteam_arn(&config.workteam_arn)
        .human_task_ui_arn(&config.human_task_ui_arn)
        .task_title(&config.task_title)
        .task_description(&config.task_description)
        .task_count(config.task_count)
        .set_task_availability_lifetime_in_seconds(config.task_availability_lifetime_in_seconds)
        .set_task_time_limit_in_seconds(config.task_time_limit_in_seconds)
        .set_task_keywords(
            (!config.task_keywords.is_empty()).then(|| config.task_keywords.clone()),
        )
        .build()
}

pub(super) fn human_loop_config_from_sdk(config: &sdk::HumanLoopConfig) -> HumanLoopConfig {
    HumanLoopConfig {
        workteam_arn: owned(config.workteam_arn()).unwrap_or_default(),
        human_task_ui_arn: owned(config.human_task_ui_arn()).unwrap_or_default(),
        task_title: owned(config.task_title()).unwrap_or_default(),
        task_description: owned(config.task_description()).unwrap_or_default(),
        task_count: number(config.task_count()).unwrap_or_default(),
        task_availability_lifetime_in_seconds: number(
            config.task_availability_lifetime_in_seconds(),
        ),
        task_time_limit_in_seconds: number(config.task_time_limit_in_seconds()),
        task_keywords: strings(config.task_keywords()),
    }
}

/// Required integers are plain `i32`, optional ones `Option<i32>`
fn number(value: impl Into<Option<i32>>) -> Option<i32> {
    value.into()
}
