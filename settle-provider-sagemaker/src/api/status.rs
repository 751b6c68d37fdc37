//! Closed lifecycle vocabularies reported by the SageMaker control plane
//!
//! Vendor strings are parsed into these enums at the API boundary. A string
//! outside the vocabulary is an error rather than a silently unknown state.

use std::fmt;
use std::str::FromStr;

use settle_core::waiter::StatusToken;

use super::ApiError;

macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => $token:literal),+ $(,)?
        }
        failed: [$($failed:ident),*]
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $token),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ApiError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($token => Ok(Self::$variant),)+
                    other => Err(ApiError::UnrecognizedStatus {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl StatusToken for $name {
            fn is_failure(&self) -> bool {
                matches!(self, $(Self::$failed)|*)
            }
        }
    };
}

status_enum! {
    DomainStatus {
        Deleting => "Deleting",
        Failed => "Failed",
        InService => "InService",
        Pending => "Pending",
        Updating => "Updating",
        UpdateFailed => "Update_Failed",
        DeleteFailed => "Delete_Failed",
    }
    failed: [Failed, UpdateFailed, DeleteFailed]
}

status_enum! {
    UserProfileStatus {
        Deleting => "Deleting",
        Failed => "Failed",
        InService => "InService",
        Pending => "Pending",
        Updating => "Updating",
        UpdateFailed => "Update_Failed",
        DeleteFailed => "Delete_Failed",
    }
    failed: [Failed, UpdateFailed, DeleteFailed]
}

status_enum! {
    SpaceStatus {
        Deleting => "Deleting",
        Failed => "Failed",
        InService => "InService",
        Pending => "Pending",
        Updating => "Updating",
        UpdateFailed => "Update_Failed",
        DeleteFailed => "Delete_Failed",
    }
    failed: [Failed, UpdateFailed, DeleteFailed]
}

status_enum! {
    /// `Deleted` is a soft-deleted terminal status: the app stays describable
    AppStatus {
        Deleted => "Deleted",
        Deleting => "Deleting",
        Failed => "Failed",
        InService => "InService",
        Pending => "Pending",
    }
    failed: [Failed]
}

status_enum! {
    ImageStatus {
        Creating => "CREATING",
        Created => "CREATED",
        CreateFailed => "CREATE_FAILED",
        Updating => "UPDATING",
        UpdateFailed => "UPDATE_FAILED",
        Deleting => "DELETING",
        DeleteFailed => "DELETE_FAILED",
    }
    failed: [CreateFailed, UpdateFailed, DeleteFailed]
}

status_enum! {
    ImageVersionStatus {
        Creating => "CREATING",
        Created => "CREATED",
        CreateFailed => "CREATE_FAILED",
        Deleting => "DELETING",
        DeleteFailed => "DELETE_FAILED",
    }
    failed: [CreateFailed, DeleteFailed]
}

status_enum! {
    WorkforceStatus {
        Initializing => "Initializing",
        Updating => "Updating",
        Deleting => "Deleting",
        Failed => "Failed",
        Active => "Active",
    }
    failed: [Failed]
}

status_enum! {
    FlowDefinitionStatus {
        Initializing => "Initializing",
        Active => "Active",
        Failed => "Failed",
        Deleting => "Deleting",
    }
    failed: [Failed]
}

status_enum! {
    NotebookInstanceStatus {
        Pending => "Pending",
        InService => "InService",
        Stopping => "Stopping",
        Stopped => "Stopped",
        Failed => "Failed",
        Deleting => "Deleting",
        Updating => "Updating",
    }
    failed: [Failed]
}

/// Kind of a Studio app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppType {
    JupyterServer,
    KernelGateway,
    TensorBoard,
    RStudioServerPro,
    RSessionGateway,
}

impl AppType {
    pub const ALL: [AppType; 5] = [
        AppType::JupyterServer,
        AppType::KernelGateway,
        AppType::TensorBoard,
        AppType::RStudioServerPro,
        AppType::RSessionGateway,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppType::JupyterServer => "JupyterServer",
            AppType::KernelGateway => "KernelGateway",
            AppType::TensorBoard => "TensorBoard",
            AppType::RStudioServerPro => "RStudioServerPro",
            AppType::RSessionGateway => "RSessionGateway",
        }
    }

    /// Decode the app type segment of an app ARN, which is lower-cased
    /// (`jupyterserver` for `JupyterServer`)
    pub fn from_arn_segment(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(segment))
    }
}

impl FromStr for AppType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ApiError::UnrecognizedStatus {
                kind: "AppType",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
