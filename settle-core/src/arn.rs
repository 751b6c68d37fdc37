//! ARN and composite identifier parsing
//!
//! Some resources are addressed by several names at once (a domain id, a
//! user profile name, an app type and an app name). The create call only
//! returns an ARN, so the individual parts are recovered from the ARN's
//! resource path.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced while decoding identifiers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("invalid ARN '{0}'")]
    InvalidArn(String),

    #[error("ARN resource '{resource}' is not of type '{expected}'")]
    UnexpectedResourceType { resource: String, expected: String },

    #[error("unexpected format of ID ({id:?}), expected {format}")]
    UnexpectedFormat { id: String, format: String },
}

/// An Amazon Resource Name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    /// Everything after the account id, e.g. `app/d-123/user/jupyterserver/default`
    pub resource: String,
}

impl Arn {
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        s.parse()
    }

    /// The resource path below `resource_type/`
    pub fn resource_path(&self, resource_type: &str) -> Result<&str, IdentifierError> {
        self.resource
            .strip_prefix(resource_type)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| IdentifierError::UnexpectedResourceType {
                resource: self.resource.clone(),
                expected: resource_type.to_string(),
            })
    }
}

impl FromStr for Arn {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(6, ':');
        let (Some("arn"), Some(partition), Some(service), Some(region), Some(account), Some(resource)) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(IdentifierError::InvalidArn(s.to_string()));
        };

        if partition.is_empty() || service.is_empty() || resource.is_empty() {
            return Err(IdentifierError::InvalidArn(s.to_string()));
        }

        Ok(Self {
            partition: partition.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            account_id: account.to_string(),
            resource: resource.to_string(),
        })
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}

/// Split a `/`-separated composite identifier into exactly `N` non-empty parts.
///
/// `format` describes the expected shape for the error message, e.g.
/// `"DOMAIN-ID/USER-PROFILE-NAME"`.
pub fn split_id<'a, const N: usize>(
    id: &'a str,
    format: &str,
) -> Result<[&'a str; N], IdentifierError> {
    let parts: Vec<&str> = id.split('/').collect();
    let error = || IdentifierError::UnexpectedFormat {
        id: id.to_string(),
        format: format.to_string(),
    };

    if parts.iter().any(|p| p.is_empty()) {
        return Err(error());
    }
    parts.try_into().map_err(|_| error())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_app_arn() {
        let arn =
            Arn::parse("arn:aws:sagemaker:us-west-2:123456789012:app/domain123/user1/jupyterserver/app1")
                .unwrap();
        assert_eq!(arn.partition, "aws");
        assert_eq!(arn.service, "sagemaker");
        assert_eq!(arn.region, "us-west-2");
        assert_eq!(arn.account_id, "123456789012");
        assert_eq!(
            arn.resource_path("app").unwrap(),
            "domain123/user1/jupyterserver/app1"
        );
        assert_eq!(
            arn.to_string(),
            "arn:aws:sagemaker:us-west-2:123456789012:app/domain123/user1/jupyterserver/app1"
        );
    }

    #[test]
    fn resource_path_checks_type() {
        let arn = Arn::parse("arn:aws:sagemaker:us-west-2:123456789012:domain/d-abc").unwrap();
        assert_eq!(arn.resource_path("domain").unwrap(), "d-abc");
        assert!(matches!(
            arn.resource_path("app"),
            Err(IdentifierError::UnexpectedResourceType { .. })
        ));
        // "domain-x" must not match the "domain" prefix
        let arn = Arn::parse("arn:aws:sagemaker:us-west-2:123456789012:domainx/d-abc").unwrap();
        assert!(arn.resource_path("domain").is_err());
    }

    #[test]
    fn invalid_arns() {
        assert!(Arn::parse("d-abc").is_err());
        assert!(Arn::parse("arn:aws:sagemaker").is_err());
        assert!(Arn::parse("urn:aws:sagemaker:us-west-2:1:domain/d").is_err());
        assert!(Arn::parse("arn::sagemaker:us-west-2:1:domain/d").is_err());
    }

    #[test]
    fn split_four_segments() {
        let [domain, user, app_type, name] =
            split_id::<4>("domain123/user1/JupyterServer/app1", "A/B/C/D").unwrap();
        assert_eq!(
            (domain, user, app_type, name),
            ("domain123", "user1", "JupyterServer", "app1")
        );
    }

    #[test]
    fn split_wrong_segment_count() {
        let err = split_id::<4>("domain123/user1/JupyterServer", "A/B/C/D").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unexpected format of ID (\"domain123/user1/JupyterServer\"), expected A/B/C/D"
        );
        assert!(split_id::<2>("a/b/c", "A/B").is_err());
        assert!(split_id::<2>("a//", "A/B").is_err());
        assert!(split_id::<2>("a/", "A/B").is_err());
    }
}
