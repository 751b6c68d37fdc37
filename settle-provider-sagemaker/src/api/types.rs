//! Request and response models of the SageMaker control plane
//!
//! These mirror the subset of the vendor shapes the lifecycle controllers
//! read and write. Keys that address one remote object are their own types so
//! a prober can be handed exactly what its describe call needs.

use settle_core::tags::Tags;

use super::status::*;

/// Compute defaults for one kind of Studio app
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceSpec {
    pub instance_type: Option<String>,
    pub lifecycle_config_arn: Option<String>,
    pub sagemaker_image_arn: Option<String>,
    pub sagemaker_image_version_arn: Option<String>,
}

/// Where notebooks shared from Studio are written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharingSettings {
    pub notebook_output_option: Option<String>,
    pub s3_output_path: Option<String>,
    pub s3_kms_key_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeRepository {
    pub repository_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomImage {
    pub app_image_config_name: String,
    pub image_name: String,
    pub image_version_number: Option<i32>,
}

/// Defaults of one kind of Studio app
///
/// Code repositories apply to Jupyter servers only; custom images to kernel
/// gateways and RSessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppSettings {
    pub default_resource_spec: Option<ResourceSpec>,
    pub lifecycle_config_arns: Vec<String>,
    pub code_repositories: Vec<CodeRepository>,
    pub custom_images: Vec<CustomImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RStudioServerProAppSettings {
    /// `ENABLED` or `DISABLED`
    pub access_status: Option<String>,
    /// `R_STUDIO_ADMIN` or `R_STUDIO_USER`
    pub user_group: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeSeriesForecastingSettings {
    pub status: Option<String>,
    pub amazon_forecast_role_arn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelRegisterSettings {
    pub status: Option<String>,
    pub cross_account_model_register_role_arn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanvasWorkspaceSettings {
    pub s3_artifact_path: Option<String>,
    pub s3_kms_key_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityProviderOAuthSetting {
    pub data_source_name: Option<String>,
    pub secret_arn: Option<String>,
    pub status: Option<String>,
}

/// Canvas features; every status is `ENABLED` or `DISABLED`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanvasAppSettings {
    pub time_series_forecasting: Option<TimeSeriesForecastingSettings>,
    pub model_register: Option<ModelRegisterSettings>,
    pub workspace: Option<CanvasWorkspaceSettings>,
    pub direct_deploy_status: Option<String>,
    pub kendra_status: Option<String>,
    pub identity_provider_oauth: Vec<IdentityProviderOAuthSetting>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSettings {
    pub execution_role: Option<String>,
    pub security_groups: Vec<String>,
    pub sharing_settings: Option<SharingSettings>,
    pub jupyter_server_app_settings: Option<AppSettings>,
    pub kernel_gateway_app_settings: Option<AppSettings>,
    pub tensor_board_app_settings: Option<AppSettings>,
    pub r_session_app_settings: Option<AppSettings>,
    pub r_studio_server_pro_app_settings: Option<RStudioServerProAppSettings>,
    pub canvas_app_settings: Option<CanvasAppSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpaceSettings {
    pub jupyter_server_app_settings: Option<AppSettings>,
    pub kernel_gateway_app_settings: Option<AppSettings>,
}

// Domain

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RStudioServerProDomainSettings {
    pub domain_execution_role_arn: String,
    pub r_studio_connect_url: Option<String>,
    pub r_studio_package_manager_url: Option<String>,
    pub default_resource_spec: Option<ResourceSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSettings {
    /// `USER_PROFILE_NAME` or `DISABLED`
    pub execution_role_identity_config: Option<String>,
    pub security_group_ids: Vec<String>,
    pub r_studio_server_pro_domain_settings: Option<RStudioServerProDomainSettings>,
}

/// Settings every space of the domain starts from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultSpaceSettings {
    pub execution_role: Option<String>,
    pub security_groups: Vec<String>,
    pub jupyter_server_app_settings: Option<AppSettings>,
    pub kernel_gateway_app_settings: Option<AppSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateDomainRequest {
    pub domain_name: String,
    pub auth_mode: String,
    pub vpc_id: String,
    pub subnet_ids: Vec<String>,
    pub app_network_access_type: Option<String>,
    /// `Service` or `Customer`
    pub app_security_group_management: Option<String>,
    pub kms_key_id: Option<String>,
    pub default_user_settings: UserSettings,
    pub domain_settings: Option<DomainSettings>,
    pub default_space_settings: Option<DefaultSpaceSettings>,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDescription {
    pub domain_id: String,
    pub domain_arn: String,
    pub domain_name: Option<String>,
    pub status: DomainStatus,
    pub failure_reason: Option<String>,
    pub auth_mode: Option<String>,
    pub vpc_id: Option<String>,
    pub subnet_ids: Vec<String>,
    pub app_network_access_type: Option<String>,
    pub app_security_group_management: Option<String>,
    pub kms_key_id: Option<String>,
    pub url: Option<String>,
    pub home_efs_file_system_id: Option<String>,
    pub single_sign_on_managed_application_instance_id: Option<String>,
    pub security_group_id_for_domain_boundary: Option<String>,
    pub default_user_settings: Option<UserSettings>,
    pub domain_settings: Option<DomainSettings>,
    pub default_space_settings: Option<DefaultSpaceSettings>,
}

/// Only the execution role identity config of the domain settings can change
/// in place
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSettingsUpdate {
    pub execution_role_identity_config: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateDomainRequest {
    pub domain_id: String,
    pub default_user_settings: Option<UserSettings>,
    pub domain_settings: Option<DomainSettingsUpdate>,
    pub default_space_settings: Option<DefaultSpaceSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteDomainRequest {
    pub domain_id: String,
    /// `Retain` or `Delete` for the home EFS file system
    pub home_efs_file_system: Option<String>,
}

// User profile

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserProfileKey {
    pub domain_id: String,
    pub user_profile_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUserProfileRequest {
    pub key: UserProfileKey,
    pub single_sign_on_user_identifier: Option<String>,
    pub single_sign_on_user_value: Option<String>,
    pub user_settings: Option<UserSettings>,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfileDescription {
    pub key: UserProfileKey,
    pub arn: String,
    pub status: UserProfileStatus,
    pub failure_reason: Option<String>,
    pub home_efs_file_system_uid: Option<String>,
    pub single_sign_on_user_identifier: Option<String>,
    pub single_sign_on_user_value: Option<String>,
    pub user_settings: Option<UserSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateUserProfileRequest {
    pub key: UserProfileKey,
    pub user_settings: Option<UserSettings>,
}

// Space

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpaceKey {
    pub domain_id: String,
    pub space_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSpaceRequest {
    pub key: SpaceKey,
    pub space_settings: Option<SpaceSettings>,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceDescription {
    pub key: SpaceKey,
    pub arn: String,
    pub status: SpaceStatus,
    pub failure_reason: Option<String>,
    pub home_efs_file_system_uid: Option<String>,
    pub space_settings: Option<SpaceSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSpaceRequest {
    pub key: SpaceKey,
    pub space_settings: Option<SpaceSettings>,
}

// App

/// The four names that address an app
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppKey {
    pub domain_id: String,
    pub user_profile_name: String,
    pub app_type: AppType,
    pub app_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAppRequest {
    pub key: AppKey,
    pub resource_spec: Option<ResourceSpec>,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDescription {
    pub key: AppKey,
    pub arn: String,
    pub status: AppStatus,
    pub failure_reason: Option<String>,
    pub resource_spec: Option<ResourceSpec>,
}

// Image

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateImageRequest {
    pub image_name: String,
    pub role_arn: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescription {
    pub image_name: String,
    pub arn: String,
    pub status: ImageStatus,
    pub failure_reason: Option<String>,
    pub role_arn: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateImageRequest {
    pub image_name: String,
    pub role_arn: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    /// Optional properties to clear (`DisplayName`, `Description`)
    pub delete_properties: Vec<String>,
}

impl UpdateImageRequest {
    pub fn has_changes(&self) -> bool {
        self.role_arn.is_some()
            || self.display_name.is_some()
            || self.description.is_some()
            || !self.delete_properties.is_empty()
    }
}

// Image version

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateImageVersionRequest {
    pub image_name: String,
    pub base_image: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageVersionDescription {
    pub image_name: String,
    pub image_arn: Option<String>,
    pub arn: String,
    pub version: Option<i32>,
    pub status: ImageVersionStatus,
    pub failure_reason: Option<String>,
    pub base_image: Option<String>,
    pub container_image: Option<String>,
}

// Workforce

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CognitoConfig {
    pub client_id: String,
    pub user_pool: String,
}

/// OIDC identity provider; the client secret is write-only
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OidcConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub user_info_endpoint: String,
    pub logout_endpoint: String,
    pub jwks_uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateWorkforceRequest {
    pub workforce_name: String,
    pub cognito_config: Option<CognitoConfig>,
    pub oidc_config: Option<OidcConfig>,
    pub source_ip_cidrs: Vec<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkforceDescription {
    pub workforce_name: String,
    pub arn: String,
    pub status: WorkforceStatus,
    pub failure_reason: Option<String>,
    pub cognito_config: Option<CognitoConfig>,
    pub oidc_config: Option<OidcConfig>,
    pub source_ip_cidrs: Vec<String>,
    pub subdomain: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateWorkforceRequest {
    pub workforce_name: String,
    pub source_ip_cidrs: Option<Vec<String>>,
    pub oidc_config: Option<OidcConfig>,
}

// Workteam

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CognitoMemberDefinition {
    pub client_id: String,
    pub user_group: String,
    pub user_pool: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateWorkteamRequest {
    pub workteam_name: String,
    pub workforce_name: Option<String>,
    pub description: String,
    pub members: Vec<CognitoMemberDefinition>,
    pub notification_topic_arn: Option<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkteamDescription {
    pub workteam_name: String,
    pub arn: String,
    pub description: Option<String>,
    pub members: Vec<CognitoMemberDefinition>,
    pub notification_topic_arn: Option<String>,
    pub subdomain: Option<String>,
    pub workforce_arn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateWorkteamRequest {
    pub workteam_name: String,
    pub description: Option<String>,
    pub members: Option<Vec<CognitoMemberDefinition>>,
    pub notification_topic_arn: Option<String>,
}

// Flow definition

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HumanLoopConfig {
    pub workteam_arn: String,
    pub human_task_ui_arn: String,
    pub task_title: String,
    pub task_description: String,
    pub task_count: i32,
    pub task_availability_lifetime_in_seconds: Option<i32>,
    pub task_time_limit_in_seconds: Option<i32>,
    pub task_keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateFlowDefinitionRequest {
    pub flow_definition_name: String,
    pub role_arn: String,
    pub human_loop_config: HumanLoopConfig,
    pub output_s3_path: String,
    pub output_kms_key_id: Option<String>,
    /// `AWS/Rekognition/DetectModerationLabels/Image/V3` or `AWS/Textract/AnalyzeDocument/Forms/V1`
    pub aws_managed_human_loop_request_source: Option<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowDefinitionDescription {
    pub flow_definition_name: String,
    pub arn: String,
    pub status: FlowDefinitionStatus,
    pub failure_reason: Option<String>,
    pub role_arn: Option<String>,
    pub human_loop_config: Option<HumanLoopConfig>,
    pub output_s3_path: Option<String>,
    pub output_kms_key_id: Option<String>,
    pub aws_managed_human_loop_request_source: Option<String>,
}

// Notebook instance

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateNotebookInstanceRequest {
    pub notebook_instance_name: String,
    pub instance_type: String,
    pub role_arn: String,
    pub subnet_id: Option<String>,
    pub security_groups: Vec<String>,
    pub kms_key_id: Option<String>,
    pub lifecycle_config_name: Option<String>,
    pub direct_internet_access: Option<String>,
    pub root_access: Option<String>,
    pub volume_size_in_gb: Option<i32>,
    pub default_code_repository: Option<String>,
    pub platform_identifier: Option<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookInstanceDescription {
    pub notebook_instance_name: String,
    pub arn: String,
    pub status: NotebookInstanceStatus,
    pub failure_reason: Option<String>,
    pub url: Option<String>,
    pub instance_type: Option<String>,
    pub role_arn: Option<String>,
    pub subnet_id: Option<String>,
    pub security_groups: Vec<String>,
    pub kms_key_id: Option<String>,
    pub network_interface_id: Option<String>,
    pub lifecycle_config_name: Option<String>,
    pub direct_internet_access: Option<String>,
    pub root_access: Option<String>,
    pub volume_size_in_gb: Option<i32>,
    pub default_code_repository: Option<String>,
    pub platform_identifier: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateNotebookInstanceRequest {
    pub notebook_instance_name: String,
    pub instance_type: Option<String>,
    pub role_arn: Option<String>,
    pub volume_size_in_gb: Option<i32>,
    pub lifecycle_config_name: Option<String>,
    pub disassociate_lifecycle_config: bool,
    pub default_code_repository: Option<String>,
    pub root_access: Option<String>,
}
