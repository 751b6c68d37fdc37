//! Scripted [`SageMakerApi`] for controller tests
//!
//! Every operation replays its own queue of results and repeats the last one
//! once the queue is down to a single entry. Calls are recorded in order
//! with their debug-formatted arguments.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use settle_core::tags::Tags;

use super::types::*;
use super::{ApiError, ApiResult, SageMakerApi};

pub struct Script<T> {
    steps: Mutex<VecDeque<ApiResult<T>>>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T: Clone> Script<T> {
    pub fn push(&self, step: ApiResult<T>) -> &Self {
        self.steps.lock().unwrap().push_back(step);
        self
    }

    pub fn ok(&self, value: T) -> &Self {
        self.push(Ok(value))
    }

    pub fn err(&self, error: ApiError) -> &Self {
        self.push(Err(error))
    }

    fn next(&self, operation: &str) -> ApiResult<T> {
        let mut steps = self.steps.lock().unwrap();
        match steps.len() {
            0 => Err(ApiError::Service {
                code: "Unscripted".to_string(),
                message: format!("no response scripted for {}", operation),
            }),
            1 => steps[0].clone(),
            _ => steps.pop_front().unwrap(),
        }
    }
}

macro_rules! scripted_api {
    ($( fn $method:ident ( $($arg:ident : $ty:ty),* ) -> $out:ty; )*) => {
        #[derive(Default)]
        pub struct MockApi {
            calls: Mutex<Vec<(String, String)>>,
            $( pub $method: Script<$out>, )*
        }

        #[async_trait]
        impl SageMakerApi for MockApi {
            $(
                async fn $method(&self, $($arg: $ty),*) -> ApiResult<$out> {
                    self.record(stringify!($method), format!("{:?}", ($(&$arg,)*)));
                    self.$method.next(stringify!($method))
                }
            )*
        }
    };
}

scripted_api! {
    fn create_domain(request: CreateDomainRequest) -> String;
    fn describe_domain(domain_id: &str) -> DomainDescription;
    fn update_domain(request: UpdateDomainRequest) -> ();
    fn delete_domain(request: DeleteDomainRequest) -> ();
    fn create_user_profile(request: CreateUserProfileRequest) -> String;
    fn describe_user_profile(key: &UserProfileKey) -> UserProfileDescription;
    fn update_user_profile(request: UpdateUserProfileRequest) -> ();
    fn delete_user_profile(key: &UserProfileKey) -> ();
    fn create_space(request: CreateSpaceRequest) -> String;
    fn describe_space(key: &SpaceKey) -> SpaceDescription;
    fn update_space(request: UpdateSpaceRequest) -> ();
    fn delete_space(key: &SpaceKey) -> ();
    fn create_app(request: CreateAppRequest) -> String;
    fn describe_app(key: &AppKey) -> AppDescription;
    fn delete_app(key: &AppKey) -> ();
    fn create_image(request: CreateImageRequest) -> String;
    fn describe_image(image_name: &str) -> ImageDescription;
    fn update_image(request: UpdateImageRequest) -> ();
    fn delete_image(image_name: &str) -> ();
    fn create_image_version(request: CreateImageVersionRequest) -> String;
    fn describe_image_version(image_name: &str) -> ImageVersionDescription;
    fn delete_image_version(image_name: &str, version: Option<i32>) -> ();
    fn create_workforce(request: CreateWorkforceRequest) -> String;
    fn describe_workforce(workforce_name: &str) -> WorkforceDescription;
    fn update_workforce(request: UpdateWorkforceRequest) -> ();
    fn delete_workforce(workforce_name: &str) -> ();
    fn create_workteam(request: CreateWorkteamRequest) -> String;
    fn describe_workteam(workteam_name: &str) -> WorkteamDescription;
    fn update_workteam(request: UpdateWorkteamRequest) -> ();
    fn delete_workteam(workteam_name: &str) -> ();
    fn create_flow_definition(request: CreateFlowDefinitionRequest) -> String;
    fn describe_flow_definition(name: &str) -> FlowDefinitionDescription;
    fn delete_flow_definition(name: &str) -> ();
    fn create_notebook_instance(request: CreateNotebookInstanceRequest) -> String;
    fn describe_notebook_instance(name: &str) -> NotebookInstanceDescription;
    fn update_notebook_instance(request: UpdateNotebookInstanceRequest) -> ();
    fn start_notebook_instance(name: &str) -> ();
    fn stop_notebook_instance(name: &str) -> ();
    fn delete_notebook_instance(name: &str) -> ();
    fn add_tags(arn: &str, tags: Tags) -> ();
    fn delete_tags(arn: &str, keys: Vec<String>) -> ();
    fn list_tags(arn: &str) -> Tags;
}

impl MockApi {
    pub fn new() -> Self {
        let api = Self::default();
        // Untagged unless a test says otherwise
        api.list_tags.ok(Tags::new());
        api
    }

    fn record(&self, operation: &str, arguments: String) {
        self.calls
            .lock()
            .unwrap()
            .push((operation.to_string(), arguments));
    }

    /// Names of the operations called so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(op, _)| op.clone())
            .collect()
    }

    /// Operations other than describe and list calls
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|op| !op.starts_with("describe_") && !op.starts_with("list_"))
            .collect()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|op| *op == operation).count()
    }

    /// Debug-formatted arguments of every call to `operation`
    pub fn arguments(&self, operation: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(op, _)| op == operation)
            .map(|(_, args)| args.clone())
            .collect()
    }
}
