//! AWS SDK binding of [`SageMakerApi`]
//!
//! Every call is a single request. Errors are classified once here so the
//! probers only ever see [`ApiError`].

mod convert;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_sagemaker::Client;
use aws_sdk_sagemaker::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sagemaker::types as sdk;
use log::debug;
use settle_core::tags::Tags;

use self::convert::*;
use crate::api::types::*;
use crate::api::{ApiError, ApiResult, SageMakerApi};

/// Error code of a missing resource
const RESOURCE_NOT_FOUND: &str = "ResourceNotFound";
pub(crate) const VALIDATION_EXCEPTION: &str = "ValidationException";

/// Messages of validation errors that mean the resource is missing. Some
/// describe calls report it this way instead of ResourceNotFound; matching
/// on message text breaks if the service rewords it.
const NOT_FOUND_MESSAGES: [&str; 2] = ["RecordNotFound", "No workforce"];

/// Map a service error code and message to an [`ApiError`]
pub fn classify_service_error(code: &str, message: &str) -> ApiError {
    let not_found = code == RESOURCE_NOT_FOUND
        || (code == VALIDATION_EXCEPTION && NOT_FOUND_MESSAGES.iter().any(|m| message.contains(m)));

    if not_found {
        ApiError::NotFound(message.to_string())
    } else {
        ApiError::Service {
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

fn classify<E, R>(err: SdkError<E, R>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(_) => classify_service_error(
            err.code().unwrap_or_default(),
            err.message().unwrap_or_default(),
        ),
        _ => ApiError::Transport(DisplayErrorContext(&err).to_string()),
    }
}

/// Members the service marks required come back as `&T`, optional ones as
/// `Option<&T>`; both read the same way through these helpers.
fn field<'a, T: ?Sized>(value: impl Into<Option<&'a T>>) -> Option<&'a T> {
    value.into()
}

fn owned<'a>(value: impl Into<Option<&'a str>>) -> Option<String> {
    value.into().map(str::to_string)
}

fn strings<'a>(value: impl Into<Option<&'a [String]>>) -> Vec<String> {
    value.into().map(<[String]>::to_vec).unwrap_or_default()
}

fn required<'a>(value: impl Into<Option<&'a str>>, name: &'static str) -> ApiResult<String> {
    owned(value).ok_or(ApiError::MissingField(name))
}

/// Parse a vendor status through its closed enum
fn status<S: std::str::FromStr<Err = ApiError>>(
    value: Option<&str>,
    name: &'static str,
) -> ApiResult<S> {
    value.ok_or(ApiError::MissingField(name))?.parse()
}

fn sdk_tags(tags: &Tags) -> Option<Vec<sdk::Tag>> {
    if tags.is_empty() {
        return None;
    }
    Some(
        tags.iter()
            .map(|(k, v)| sdk::Tag::builder().key(k).value(v).build())
            .collect(),
    )
}

/// SageMaker control plane reached through the AWS SDK
pub struct AwsSageMakerApi {
    client: Client,
}

impl AwsSageMakerApi {
    /// Build a client from the default credential chain
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self {
            client: Client::new(&config),
        }
    }

    /// Create with a specific client (for testing)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SageMakerApi for AwsSageMakerApi {
    async fn create_domain(&self, request: CreateDomainRequest) -> ApiResult<String> {
        debug!("CreateDomain {}", request.domain_name);
        let output = self
            .client
            .create_domain()
            .domain_name(request.domain_name)
            .auth_mode(sdk::AuthMode::from(request.auth_mode.as_str()))
            .vpc_id(request.vpc_id)
            .set_subnet_ids(Some(request.subnet_ids))
            .set_app_network_access_type(
                request
                    .app_network_access_type
                    .as_deref()
                    .map(sdk::AppNetworkAccessType::from),
            )
            .set_app_security_group_management(
                request
                    .app_security_group_management
                    .as_deref()
                    .map(sdk::AppSecurityGroupManagement::from),
            )
            .set_kms_key_id(request.kms_key_id)
            .default_user_settings(user_settings_to_sdk(&request.default_user_settings))
            .set_domain_settings(request.domain_settings.as_ref().map(domain_settings_to_sdk))
            .set_default_space_settings(
                request
                    .default_space_settings
                    .as_ref()
                    .map(default_space_settings_to_sdk),
            )
            .set_tags(sdk_tags(&request.tags))
            .send()
            .await
            .map_err(classify)?;
        required(output.domain_arn(), "DomainArn")
    }

    async fn describe_domain(&self, domain_id: &str) -> ApiResult<DomainDescription> {
        let output = self
            .client
            .describe_domain()
            .domain_id(domain_id)
            .send()
            .await
            .map_err(classify)?;

        Ok(DomainDescription {
            domain_id: owned(output.domain_id()).unwrap_or_else(|| domain_id.to_string()),
            domain_arn: required(output.domain_arn(), "DomainArn")?,
            domain_name: owned(output.domain_name()),
            status: status(field(output.status()).map(|s| s.as_str()), "Status")?,
            failure_reason: owned(output.failure_reason()),
            auth_mode: field(output.auth_mode()).map(|m| m.as_str().to_string()),
            vpc_id: owned(output.vpc_id()),
            subnet_ids: strings(output.subnet_ids()),
            app_network_access_type: field(output.app_network_access_type())
                .map(|t| t.as_str().to_string()),
            app_security_group_management: field(output.app_security_group_management())
                .map(|m| m.as_str().to_string()),
            kms_key_id: owned(output.kms_key_id()),
            url: owned(output.url()),
            home_efs_file_system_id: owned(output.home_efs_file_system_id()),
            single_sign_on_managed_application_instance_id: owned(
                output.single_sign_on_managed_application_instance_id(),
            ),
            security_group_id_for_domain_boundary: owned(
                output.security_group_id_for_domain_boundary(),
            ),
            default_user_settings: field(output.default_user_settings())
                .map(user_settings_from_sdk),
            domain_settings: field(output.domain_settings()).map(domain_settings_from_sdk),
            default_space_settings: field(output.default_space_settings())
                .map(default_space_settings_from_sdk),
        })
    }

    async fn update_domain(&self, request: UpdateDomainRequest) -> ApiResult<()> {
        debug!("UpdateDomain {}", request.domain_id);
        self.client
            .update_domain()
            .domain_id(request.domain_id)
            .set_default_user_settings(request.default_user_settings.as_ref().map(user_settings_to_sdk))
            .set_domain_settings_for_update(
                request
                    .domain_settings
                    .as_ref()
                    .map(domain_settings_update_to_sdk),
            )
            .set_default_space_settings(
                request
                    .default_space_settings
                    .as_ref()
                    .map(default_space_settings_to_sdk),
            )
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_domain(&self, request: DeleteDomainRequest) -> ApiResult<()> {
        debug!("DeleteDomain {}", request.domain_id);
        let retention = request.home_efs_file_system.as_deref().map(|r| {
            sdk::RetentionPolicy::builder()
                .home_efs_file_system(sdk::RetentionType::from(r))
                .build()
        });
        self.client
            .delete_domain()
            .domain_id(request.domain_id)
            .set_retention_policy(retention)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn create_user_profile(&self, request: CreateUserProfileRequest) -> ApiResult<String> {
        debug!(
            "CreateUserProfile {}/{}",
            request.key.domain_id, request.key.user_profile_name
        );
        let output = self
            .client
            .create_user_profile()
            .domain_id(request.key.domain_id)
            .user_profile_name(request.key.user_profile_name)
            .set_single_sign_on_user_identifier(request.single_sign_on_user_identifier)
            .set_single_sign_on_user_value(request.single_sign_on_user_value)
            .set_user_settings(request.user_settings.as_ref().map(user_settings_to_sdk))
            .set_tags(sdk_tags(&request.tags))
            .send()
            .await
            .map_err(classify)?;
        required(output.user_profile_arn(), "UserProfileArn")
    }

    async fn describe_user_profile(
        &self,
        key: &UserProfileKey,
    ) -> ApiResult<UserProfileDescription> {
        let output = self
            .client
            .describe_user_profile()
            .domain_id(&key.domain_id)
            .user_profile_name(&key.user_profile_name)
            .send()
            .await
            .map_err(classify)?;

        Ok(UserProfileDescription {
            key: key.clone(),
            arn: required(output.user_profile_arn(), "UserProfileArn")?,
            status: status(field(output.status()).map(|s| s.as_str()), "Status")?,
            failure_reason: owned(output.failure_reason()),
            home_efs_file_system_uid: owned(output.home_efs_file_system_uid()),
            single_sign_on_user_identifier: owned(output.single_sign_on_user_identifier()),
            single_sign_on_user_value: owned(output.single_sign_on_user_value()),
            user_settings: field(output.user_settings()).map(user_settings_from_sdk),
        })
    }

    async fn update_user_profile(&self, request: UpdateUserProfileRequest) -> ApiResult<()> {
        self.client
            .update_user_profile()
            .domain_id(request.key.domain_id)
            .user_profile_name(request.key.user_profile_name)
            .set_user_settings(request.user_settings.as_ref().map(user_settings_to_sdk))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_user_profile(&self, key: &UserProfileKey) -> ApiResult<()> {
        self.client
            .delete_user_profile()
            .domain_id(&key.domain_id)
            .user_profile_name(&key.user_profile_name)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn create_space(&self, request: CreateSpaceRequest) -> ApiResult<String> {
        debug!(
            "CreateSpace {}/{}",
            request.key.domain_id, request.key.space_name
        );
        let output = self
            .client
            .create_space()
            .domain_id(request.key.domain_id)
            .space_name(request.key.space_name)
            .set_space_settings(request.space_settings.as_ref().map(space_settings_to_sdk))
            .set_tags(sdk_tags(&request.tags))
            .send()
            .await
            .map_err(classify)?;
        required(output.space_arn(), "SpaceArn")
    }

    async fn describe_space(&self, key: &SpaceKey) -> ApiResult<SpaceDescription> {
        let output = self
            .client
            .describe_space()
            .domain_id(&key.domain_id)
            .space_name(&key.space_name)
            .send()
            .await
            .map_err(classify)?;

        Ok(SpaceDescription {
            key: key.clone(),
            arn: required(output.space_arn(), "SpaceArn")?,
            status: status(field(output.status()).map(|s| s.as_str()), "Status")?,
            failure_reason: owned(output.failure_reason()),
            home_efs_file_system_uid: owned(output.home_efs_file_system_uid()),
            space_settings: field(output.space_settings()).map(space_settings_from_sdk),
        })
    }

    async fn update_space(&self, request: UpdateSpaceRequest) -> ApiResult<()> {
        self.client
            .update_space()
            .domain_id(request.key.domain_id)
            .space_name(request.key.space_name)
            .set_space_settings(request.space_settings.as_ref().map(space_settings_to_sdk))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_space(&self, key: &SpaceKey) -> ApiResult<()> {
        self.client
            .delete_space()
            .domain_id(&key.domain_id)
            .space_name(&key.space_name)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn create_app(&self, request: CreateAppRequest) -> ApiResult<String> {
        let key = request.key;
        debug!(
            "CreateApp {}/{}/{}/{}",
            key.domain_id, key.user_profile_name, key.app_type, key.app_name
        );
        let output = self
            .client
            .create_app()
            .domain_id(key.domain_id)
            .user_profile_name(key.user_profile_name)
            .app_type(sdk::AppType::from(key.app_type.as_str()))
            .app_name(key.app_name)
            .set_resource_spec(request.resource_spec.as_ref().map(resource_spec_to_sdk))
            .set_tags(sdk_tags(&request.tags))
            .send()
            .await
            .map_err(classify)?;
        required(output.app_arn(), "AppArn")
    }

    async fn describe_app(&self, key: &AppKey) -> ApiResult<AppDescription> {
        let output = self
            .client
            .describe_app()
            .domain_id(&key.domain_id)
            .user_profile_name(&key.user_profile_name)
            .app_type(sdk::AppType::from(key.app_type.as_str()))
            .app_name(&key.app_name)
            .send()
            .await
            .map_err(classify)?;

        Ok(AppDescription {
            key: key.clone(),
            arn: required(output.app_arn(), "AppArn")?,
            status: status(field(output.status()).map(|s| s.as_str()), "Status")?,
            failure_reason: owned(output.failure_reason()),
            resource_spec: field(output.resource_spec()).map(resource_spec_from_sdk),
        })
    }

    async fn delete_app(&self, key: &AppKey) -> ApiResult<()> {
        self.client
            .delete_app()
            .domain_id(&key.domain_id)
            .user_profile_name(&key.user_profile_name)
            .app_type(sdk::AppType::from(key.app_type.as_str()))
            .app_name(&key.app_name)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn create_image(&self, request: CreateImageRequest) -> ApiResult<String> {
        debug!("CreateImage {}", request.image_name);
        let output = self
            .client
            .create_image()
            .image_name(request.image_name)
            .role_arn(request.role_arn)
            .set_display_name(request.display_name)
            .set_description(request.description)
            .set_tags(sdk_tags(&request.tags))
            .send()
            .await
            .map_err(classify)?;
        required(output.image_arn(), "ImageArn")
    }

    async fn describe_image(&self, image_name: &str) -> ApiResult<ImageDescription> {
        let output = self
            .client
            .describe_image()
            .image_name(image_name)
            .send()
            .await
            .map_err(classify)?;

        Ok(ImageDescription {
            image_name: owned(output.image_name()).unwrap_or_else(|| image_name.to_string()),
            arn: required(output.image_arn(), "ImageArn")?,
            status: status(field(output.image_status()).map(|s| s.as_str()), "ImageStatus")?,
            failure_reason: owned(output.failure_reason()),
            role_arn: owned(output.role_arn()),
            display_name: owned(output.display_name()),
            description: owned(output.description()),
        })
    }

    async fn update_image(&self, request: UpdateImageRequest) -> ApiResult<()> {
        debug!("UpdateImage {}", request.image_name);
        self.client
            .update_image()
            .image_name(request.image_name)
            .set_role_arn(request.role_arn)
            .set_display_name(request.display_name)
            .set_description(request.description)
            .set_delete_properties(
                (!request.delete_properties.is_empty()).then_some(request.delete_properties),
            )
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_image(&self, image_name: &str) -> ApiResult<()> {
        self.client
            .delete_image()
            .image_name(image_name)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn create_image_version(&self, request: CreateImageVersionRequest) -> ApiResult<String> {
        debug!("CreateImageVersion {}", request.image_name);
        let output = self
            .client
            .create_image_version()
            .image_name(request.image_name)
            .base_image(request.base_image)
            .send()
            .await
            .map_err(classify)?;
        required(output.image_version_arn(), "ImageVersionArn")
    }

    async fn describe_image_version(
        &self,
        image_name: &str,
    ) -> ApiResult<ImageVersionDescription> {
        let output = self
            .client
            .describe_image_version()
            .image_name(image_name)
            .send()
            .await
            .map_err(classify)?;

        Ok(ImageVersionDescription {
            image_name: image_name.to_string(),
            image_arn: owned(output.image_arn()),
            arn: required(output.image_version_arn(), "ImageVersionArn")?,
            version: output.version(),
            status: status(
                field(output.image_version_status()).map(|s| s.as_str()),
                "ImageVersionStatus",
            )?,
            failure_reason: owned(output.failure_reason()),
            base_image: owned(output.base_image()),
            container_image: owned(output.container_image()),
        })
    }

    async fn delete_image_version(&self, image_name: &str, version: Option<i32>) -> ApiResult<()> {
        self.client
            .delete_image_version()
            .image_name(image_name)
            .set_version(version)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn create_workforce(&self, request: CreateWorkforceRequest) -> ApiResult<String> {
        debug!("CreateWorkforce {}", request.workforce_name);
        let source_ip = match request.source_ip_cidrs.is_empty() {
            true => None,
            false => Some(source_ip_config_to_sdk(&request.source_ip_cidrs)),
        };
        let output = self
            .client
            .create_workforce()
            .workforce_name(request.workforce_name)
            .set_cognito_config(
                request.cognito_config.as_ref().map(cognito_config_to_sdk),
            )
            .set_oidc_config(request.oidc_config.as_ref().map(oidc_config_to_sdk))
            .set_source_ip_config(source_ip)
            .set_tags(sdk_tags(&request.tags))
            .send()
            .await
            .map_err(classify)?;
        required(output.workforce_arn(), "WorkforceArn")
    }

    async fn describe_workforce(&self, workforce_name: &str) -> ApiResult<WorkforceDescription> {
        let output = self
            .client
            .describe_workforce()
            .workforce_name(workforce_name)
            .send()
            .await
            .map_err(classify)?;
        let workforce = field(output.workforce())
            .ok_or_else(|| ApiError::NotFound(format!("workforce {}", workforce_name)))?;

        Ok(WorkforceDescription {
            workforce_name: owned(workforce.workforce_name())
                .unwrap_or_else(|| workforce_name.to_string()),
            arn: required(workforce.workforce_arn(), "WorkforceArn")?,
            status: status(field(workforce.status()).map(|s| s.as_str()), "Status")?,
            failure_reason: owned(workforce.failure_reason()),
            cognito_config: field(workforce.cognito_config()).map(|c| CognitoConfig {
                client_id: owned(c.client_id()).unwrap_or_default(),
                user_pool: owned(c.user_pool()).unwrap_or_default(),
            }),
            oidc_config: field(workforce.oidc_config()).map(|c| OidcConfig {
                client_id: owned(c.client_id()).unwrap_or_default(),
                client_secret: None,
                issuer: owned(c.issuer()).unwrap_or_default(),
                authorization_endpoint: owned(c.authorization_endpoint()).unwrap_or_default(),
                token_endpoint: owned(c.token_endpoint()).unwrap_or_default(),
                user_info_endpoint: owned(c.user_info_endpoint()).unwrap_or_default(),
                logout_endpoint: owned(c.logout_endpoint()).unwrap_or_default(),
                jwks_uri: owned(c.jwks_uri()).unwrap_or_default(),
            }),
            source_ip_cidrs: field(workforce.source_ip_config())
                .map(|c| strings(c.cidrs()))
                .unwrap_or_default(),
            subdomain: owned(workforce.sub_domain()),
        })
    }

    async fn update_workforce(&self, request: UpdateWorkforceRequest) -> ApiResult<()> {
        debug!("UpdateWorkforce {}", request.workforce_name);
        self.client
            .update_workforce()
            .workforce_name(request.workforce_name)
            .set_source_ip_config(
                request.source_ip_cidrs.as_deref().map(source_ip_config_to_sdk),
            )
            .set_oidc_config(request.oidc_config.as_ref().map(oidc_config_to_sdk))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_workforce(&self, workforce_name: &str) -> ApiResult<()> {
        self.client
            .delete_workforce()
            .workforce_name(workforce_name)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn create_workteam(&self, request: CreateWorkteamRequest) -> ApiResult<String> {
        debug!("CreateWorkteam {}", request.workteam_name);
        let output = self
            .client
            .create_workteam()
            .workteam_name(request.workteam_name)
            .set_workforce_name(request.workforce_name)
            .description(request.description)
            .set_member_definitions(Some(members_to_sdk(&request.members)))
            .set_notification_configuration(
                request
                    .notification_topic_arn
                    .as_deref()
                    .map(|arn| notification_to_sdk(Some(arn))),
            )
            .set_tags(sdk_tags(&request.tags))
            .send()
            .await
            .map_err(classify)?;
        required(output.workteam_arn(), "WorkteamArn")
    }

    async fn describe_workteam(&self, workteam_name: &str) -> ApiResult<WorkteamDescription> {
        let output = self
            .client
            .describe_workteam()
            .workteam_name(workteam_name)
            .send()
            .await
            .map_err(classify)?;
        let workteam = field(output.workteam())
            .ok_or_else(|| ApiError::NotFound(format!("workteam {}", workteam_name)))?;

        Ok(WorkteamDescription {
            workteam_name: owned(workteam.workteam_name())
                .unwrap_or_else(|| workteam_name.to_string()),
            arn: required(workteam.workteam_arn(), "WorkteamArn")?,
            description: owned(workteam.description()),
            members: members_from_sdk(
                field(workteam.member_definitions()).unwrap_or_default(),
            ),
            notification_topic_arn: field(workteam.notification_configuration())
                .and_then(|n| owned(n.notification_topic_arn())),
            subdomain: owned(workteam.sub_domain()),
            workforce_arn: owned(workteam.workforce_arn()),
        })
    }

    async fn update_workteam(&self, request: UpdateWorkteamRequest) -> ApiResult<()> {
        debug!("UpdateWorkteam {}", request.workteam_name);
        let members = request.members.as_deref().map(members_to_sdk);
        self.client
            .update_workteam()
            .workteam_name(request.workteam_name)
            .set_description(request.description)
            .set_member_definitions(members)
            .notification_configuration(notification_to_sdk(
                request.notification_topic_arn.as_deref(),
            ))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_workteam(&self, workteam_name: &str) -> ApiResult<()> {
        self.client
            .delete_workteam()
            .workteam_name(workteam_name)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn create_flow_definition(
        &self,
        request: CreateFlowDefinitionRequest,
    ) -> ApiResult<String> {
        debug!("CreateFlowDefinition {}", request.flow_definition_name);
        let output_config = sdk::FlowDefinitionOutputConfig::builder()
            .s3_output_path(&request.output_s3_path)
            .set_kms_key_id(request.output_kms_key_id.clone())
            .build();
        let request_source = request
            .aws_managed_human_loop_request_source
            .as_deref()
            .map(|source| {
                sdk::HumanLoopRequestSource::builder()
                    .aws_managed_human_loop_request_source(
                        sdk::AwsManagedHumanLoopRequestSource::from(source),
                    )
                    .build()
            });

        let output = self
            .client
            .create_flow_definition()
            .flow_definition_name(request.flow_definition_name)
            .role_arn(request.role_arn)
            .human_loop_config(human_loop_config_to_sdk(&request.human_loop_config))
            .output_config(output_config)
            .set_human_loop_request_source(request_source)
            .set_tags(sdk_tags(&request.tags))
            .send()
            .await
            .map_err(classify)?;
        required(output.flow_definition_arn(), "FlowDefinitionArn")
    }

    async fn describe_flow_definition(&self, name: &str) -> ApiResult<FlowDefinitionDescription> {
        let output = self
            .client
            .describe_flow_definition()
            .flow_definition_name(name)
            .send()
            .await
            .map_err(classify)?;

        Ok(FlowDefinitionDescription {
            flow_definition_name: owned(output.flow_definition_name())
                .unwrap_or_else(|| name.to_string()),
            arn: required(output.flow_definition_arn(), "FlowDefinitionArn")?,
            status: status(
                field(output.flow_definition_status()).map(|s| s.as_str()),
                "FlowDefinitionStatus",
            )?,
            failure_reason: owned(output.failure_reason()),
            role_arn: owned(output.role_arn()),
            human_loop_config: field(output.human_loop_config()).map(human_loop_config_from_sdk),
            output_s3_path: field(output.output_config()).and_then(|c| owned(c.s3_output_path())),
            output_kms_key_id: field(output.output_config()).and_then(|c| owned(c.kms_key_id())),
            aws_managed_human_loop_request_source: field(output.human_loop_request_source())
                .and_then(|source| field(source.aws_managed_human_loop_request_source()))
                .map(|source| source.as_str().to_string()),
        })
    }

    async fn delete_flow_definition(&self, name: &str) -> ApiResult<()> {
        self.client
            .delete_flow_definition()
            .flow_definition_name(name)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn create_notebook_instance(
        &self,
        request: CreateNotebookInstanceRequest,
    ) -> ApiResult<String> {
        debug!("CreateNotebookInstance {}", request.notebook_instance_name);
        let output = self
            .client
            .create_notebook_instance()
            .notebook_instance_name(request.notebook_instance_name)
            .instance_type(sdk::InstanceType::from(request.instance_type.as_str()))
            .role_arn(request.role_arn)
            .set_subnet_id(request.subnet_id)
            .set_security_group_ids(
                (!request.security_groups.is_empty()).then_some(request.security_groups),
            )
            .set_kms_key_id(request.kms_key_id)
            .set_lifecycle_config_name(request.lifecycle_config_name)
            .set_direct_internet_access(
                request
                    .direct_internet_access
                    .as_deref()
                    .map(sdk::DirectInternetAccess::from),
            )
            .set_root_access(request.root_access.as_deref().map(sdk::RootAccess::from))
            .set_volume_size_in_gb(request.volume_size_in_gb)
            .set_default_code_repository(request.default_code_repository)
            .set_platform_identifier(request.platform_identifier)
            .set_tags(sdk_tags(&request.tags))
            .send()
            .await
            .map_err(classify)?;
        required(output.notebook_instance_arn(), "NotebookInstanceArn")
    }

    async fn describe_notebook_instance(
        &self,
        name: &str,
    ) -> ApiResult<NotebookInstanceDescription> {
        let output = self
            .client
            .describe_notebook_instance()
            .notebook_instance_name(name)
            .send()
            .await
            .map_err(classify)?;

        Ok(NotebookInstanceDescription {
            notebook_instance_name: owned(output.notebook_instance_name())
                .unwrap_or_else(|| name.to_string()),
            arn: required(output.notebook_instance_arn(), "NotebookInstanceArn")?,
            status: status(
                field(output.notebook_instance_status()).map(|s| s.as_str()),
                "NotebookInstanceStatus",
            )?,
            failure_reason: owned(output.failure_reason()),
            url: owned(output.url()),
            instance_type: field(output.instance_type()).map(|t| t.as_str().to_string()),
            role_arn: owned(output.role_arn()),
            subnet_id: owned(output.subnet_id()),
            security_groups: strings(output.security_groups()),
            kms_key_id: owned(output.kms_key_id()),
            network_interface_id: owned(output.network_interface_id()),
            lifecycle_config_name: owned(output.notebook_instance_lifecycle_config_name()),
            direct_internet_access: field(output.direct_internet_access())
                .map(|d| d.as_str().to_string()),
            root_access: field(output.root_access()).map(|r| r.as_str().to_string()),
            volume_size_in_gb: output.volume_size_in_gb(),
            default_code_repository: owned(output.default_code_repository()),
            platform_identifier: owned(output.platform_identifier()),
        })
    }

    async fn update_notebook_instance(
        &self,
        request: UpdateNotebookInstanceRequest,
    ) -> ApiResult<()> {
        debug!("UpdateNotebookInstance {}", request.notebook_instance_name);
        self.client
            .update_notebook_instance()
            .notebook_instance_name(request.notebook_instance_name)
            .set_instance_type(request.instance_type.as_deref().map(sdk::InstanceType::from))
            .set_role_arn(request.role_arn)
            .set_volume_size_in_gb(request.volume_size_in_gb)
            .set_lifecycle_config_name(request.lifecycle_config_name)
            .set_disassociate_lifecycle_config(
                request.disassociate_lifecycle_config.then_some(true),
            )
            .set_default_code_repository(request.default_code_repository)
            .set_root_access(request.root_access.as_deref().map(sdk::RootAccess::from))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn start_notebook_instance(&self, name: &str) -> ApiResult<()> {
        debug!("StartNotebookInstance {}", name);
        self.client
            .start_notebook_instance()
            .notebook_instance_name(name)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn stop_notebook_instance(&self, name: &str) -> ApiResult<()> {
        debug!("StopNotebookInstance {}", name);
        self.client
            .stop_notebook_instance()
            .notebook_instance_name(name)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_notebook_instance(&self, name: &str) -> ApiResult<()> {
        self.client
            .delete_notebook_instance()
            .notebook_instance_name(name)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn add_tags(&self, arn: &str, tags: Tags) -> ApiResult<()> {
        self.client
            .add_tags()
            .resource_arn(arn)
            .set_tags(sdk_tags(&tags))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_tags(&self, arn: &str, keys: Vec<String>) -> ApiResult<()> {
        self.client
            .delete_tags()
            .resource_arn(arn)
            .set_tag_keys(Some(keys))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn list_tags(&self, arn: &str) -> ApiResult<Tags> {
        let mut tags = Tags::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_tags()
                .resource_arn(arn)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(classify)?;

            for tag in field(output.tags()).unwrap_or_default() {
                if let (Some(key), Some(value)) = (owned(tag.key()), owned(tag.value())) {
                    tags.insert(key, value);
                }
            }

            match owned(output.next_token()) {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_not_found_code() {
        assert!(classify_service_error("ResourceNotFound", "Domain d-1 not found").is_not_found());
    }

    #[test]
    fn validation_messages_that_mean_missing() {
        for message in ["RecordNotFound", "No workforce found for account"] {
            assert!(
                classify_service_error("ValidationException", message).is_not_found(),
                "{message}"
            );
        }
    }

    #[test]
    fn other_errors_are_service_errors() {
        let err = classify_service_error("ValidationException", "App has already been deleted");
        assert_eq!(
            err,
            ApiError::Service {
                code: "ValidationException".to_string(),
                message: "App has already been deleted".to_string()
            }
        );
        // Message text only counts for validation errors
        assert!(!classify_service_error("ThrottlingException", "RecordNotFound").is_not_found());
        assert!(
            classify_service_error("ResourceNotFound", "Workteam x does not exist").is_not_found()
        );
    }

    #[test]
    fn missing_dependency_is_not_a_missing_resource() {
        let err = classify_service_error(
            "ValidationException",
            "Role arn:aws:iam::123456789012:role/studio does not exist",
        );
        assert!(!err.is_not_found());
        assert!(err.is_service_error("ValidationException", "does not exist"));
    }

    #[test]
    fn empty_tags_are_omitted() {
        assert!(sdk_tags(&Tags::new()).is_none());
        let mut tags = Tags::new();
        tags.insert("team".to_string(), "ml".to_string());
        let sdk = sdk_tags(&tags).unwrap();
        assert_eq!(sdk.len(), 1);
        assert_eq!(sdk[0].key(), Some("team"));
        assert_eq!(sdk[0].value(), Some("ml"));
    }
}
