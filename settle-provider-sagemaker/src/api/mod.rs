//! Control-plane boundary
//!
//! [`SageMakerApi`] is the only way lifecycle controllers reach SageMaker.
//! The AWS SDK binding lives in `crate::aws`; tests drive the controllers
//! with a scripted implementation.

pub mod status;
pub mod types;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use settle_core::tags::Tags;
use thiserror::Error;

use self::types::*;

/// Errors returned by control-plane calls
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The addressed resource does not exist (or no longer exists)
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The service rejected the request
    #[error("{code}: {message}")]
    Service { code: String, message: String },

    /// The request never produced a service response
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unrecognized {kind} status '{value}'")]
    UnrecognizedStatus { kind: &'static str, value: String },

    #[error("response is missing {0}")]
    MissingField(&'static str),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// A service error of `code` whose message contains `needle`
    pub fn is_service_error(&self, code: &str, needle: &str) -> bool {
        matches!(self, ApiError::Service { code: c, message } if c == code && message.contains(needle))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Typed SageMaker operations used by the lifecycle controllers
///
/// Create calls return the ARN of the new resource.
#[async_trait]
pub trait SageMakerApi: Send + Sync {
    async fn create_domain(&self, request: CreateDomainRequest) -> ApiResult<String>;
    async fn describe_domain(&self, domain_id: &str) -> ApiResult<DomainDescription>;
    async fn update_domain(&self, request: UpdateDomainRequest) -> ApiResult<()>;
    async fn delete_domain(&self, request: DeleteDomainRequest) -> ApiResult<()>;

    async fn create_user_profile(&self, request: CreateUserProfileRequest) -> ApiResult<String>;
    async fn describe_user_profile(&self, key: &UserProfileKey)
    -> ApiResult<UserProfileDescription>;
    async fn update_user_profile(&self, request: UpdateUserProfileRequest) -> ApiResult<()>;
    async fn delete_user_profile(&self, key: &UserProfileKey) -> ApiResult<()>;

    async fn create_space(&self, request: CreateSpaceRequest) -> ApiResult<String>;
    async fn describe_space(&self, key: &SpaceKey) -> ApiResult<SpaceDescription>;
    async fn update_space(&self, request: UpdateSpaceRequest) -> ApiResult<()>;
    async fn delete_space(&self, key: &SpaceKey) -> ApiResult<()>;

    async fn create_app(&self, request: CreateAppRequest) -> ApiResult<String>;
    async fn describe_app(&self, key: &AppKey) -> ApiResult<AppDescription>;
    async fn delete_app(&self, key: &AppKey) -> ApiResult<()>;

    async fn create_image(&self, request: CreateImageRequest) -> ApiResult<String>;
    async fn describe_image(&self, image_name: &str) -> ApiResult<ImageDescription>;
    async fn update_image(&self, request: UpdateImageRequest) -> ApiResult<()>;
    async fn delete_image(&self, image_name: &str) -> ApiResult<()>;

    async fn create_image_version(&self, request: CreateImageVersionRequest) -> ApiResult<String>;
    async fn describe_image_version(&self, image_name: &str)
    -> ApiResult<ImageVersionDescription>;
    async fn delete_image_version(&self, image_name: &str, version: Option<i32>)
    -> ApiResult<()>;

    async fn create_workforce(&self, request: CreateWorkforceRequest) -> ApiResult<String>;
    async fn describe_workforce(&self, workforce_name: &str) -> ApiResult<WorkforceDescription>;
    async fn update_workforce(&self, request: UpdateWorkforceRequest) -> ApiResult<()>;
    async fn delete_workforce(&self, workforce_name: &str) -> ApiResult<()>;

    async fn create_workteam(&self, request: CreateWorkteamRequest) -> ApiResult<String>;
    async fn describe_workteam(&self, workteam_name: &str) -> ApiResult<WorkteamDescription>;
    async fn update_workteam(&self, request: UpdateWorkteamRequest) -> ApiResult<()>;
    async fn delete_workteam(&self, workteam_name: &str) -> ApiResult<()>;

    async fn create_flow_definition(
        &self,
        request: CreateFlowDefinitionRequest,
    ) -> ApiResult<String>;
    async fn describe_flow_definition(&self, name: &str) -> ApiResult<FlowDefinitionDescription>;
    async fn delete_flow_definition(&self, name: &str) -> ApiResult<()>;

    async fn create_notebook_instance(
        &self,
        request: CreateNotebookInstanceRequest,
    ) -> ApiResult<String>;
    async fn describe_notebook_instance(
        &self,
        name: &str,
    ) -> ApiResult<NotebookInstanceDescription>;
    async fn update_notebook_instance(&self, request: UpdateNotebookInstanceRequest)
    -> ApiResult<()>;
    async fn start_notebook_instance(&self, name: &str) -> ApiResult<()>;
    async fn stop_notebook_instance(&self, name: &str) -> ApiResult<()>;
    async fn delete_notebook_instance(&self, name: &str) -> ApiResult<()>;

    async fn add_tags(&self, arn: &str, tags: Tags) -> ApiResult<()>;
    async fn delete_tags(&self, arn: &str, keys: Vec<String>) -> ApiResult<()>;
    async fn list_tags(&self, arn: &str) -> ApiResult<Tags>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_matching() {
        let err = ApiError::Service {
            code: "ValidationException".to_string(),
            message: "App has already been deleted".to_string(),
        };
        assert!(err.is_service_error("ValidationException", "has already been deleted"));
        assert!(!err.is_service_error("ResourceInUse", "has already been deleted"));
        assert!(!err.is_not_found());
        assert!(ApiError::NotFound("d-1".to_string()).is_not_found());
    }
}
