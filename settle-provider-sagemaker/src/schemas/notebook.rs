//! SageMaker notebook instance schema definitions

use settle_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::studio::{arn_and_status, tags};
use crate::resources::notebook_instance;

pub fn notebook_instance_schema() -> ResourceSchema {
    let schema = ResourceSchema::new(notebook_instance::RESOURCE_TYPE)
        .with_description("A SageMaker notebook instance")
        .attribute(
            AttributeSchema::new("notebook_instance_name", types::resource_name())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("instance_type", AttributeType::String)
                .required()
                .with_description("ML compute instance type (e.g., ml.t3.medium)"),
        )
        .attribute(AttributeSchema::new("role_arn", types::arn()).required())
        .attribute(AttributeSchema::new("subnet_id", AttributeType::String).force_new())
        .attribute(AttributeSchema::new("security_groups", types::string_list()).force_new())
        .attribute(AttributeSchema::new("kms_key_id", AttributeType::String).force_new())
        .attribute(AttributeSchema::new("lifecycle_config_name", AttributeType::String))
        .attribute(
            AttributeSchema::new(
                "direct_internet_access",
                types::enumeration(&["Enabled", "Disabled"]),
            )
            .force_new(),
        )
        .attribute(AttributeSchema::new(
            "root_access",
            types::enumeration(&["Enabled", "Disabled"]),
        ))
        .attribute(
            AttributeSchema::new("volume_size_in_gb", types::positive_int())
                .with_description("Size of the ML storage volume in GB"),
        )
        .attribute(AttributeSchema::new("default_code_repository", AttributeType::String))
        .attribute(AttributeSchema::new("platform_identifier", AttributeType::String).force_new())
        .attribute(AttributeSchema::new("url", AttributeType::String).computed())
        .attribute(AttributeSchema::new("network_interface_id", AttributeType::String).computed());

    tags()
        .into_iter()
        .chain(arn_and_status())
        .fold(schema, ResourceSchema::attribute)
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![notebook_instance_schema()]
}

#[cfg(test)]
mod tests {
    use super::super::tests::attributes;
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_notebook_instance() {
        let attrs = attributes(json!({
            "notebook_instance_name": "analysis",
            "instance_type": "ml.t3.medium",
            "role_arn": "arn:aws:iam::123456789012:role/notebooks",
            "root_access": "Disabled",
            "volume_size_in_gb": 20
        }));
        assert!(notebook_instance_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn invalid_volume_size() {
        let attrs = attributes(json!({
            "notebook_instance_name": "analysis",
            "instance_type": "ml.t3.medium",
            "role_arn": "arn:aws:iam::123456789012:role/notebooks",
            "volume_size_in_gb": -5
        }));
        assert!(notebook_instance_schema().validate(&attrs).is_err());
    }

    #[test]
    fn updatable_attributes_do_not_force_new() {
        let schema = notebook_instance_schema();
        assert!(!schema.forces_new("instance_type"));
        assert!(!schema.forces_new("root_access"));
        assert!(schema.forces_new("subnet_id"));
    }
}
