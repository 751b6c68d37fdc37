//! SageMaker custom image schema definitions

use settle_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::studio::{arn_and_status, tags};
use crate::resources::{image, image_version};

pub fn image_schema() -> ResourceSchema {
    let schema = ResourceSchema::new(image::RESOURCE_TYPE)
        .with_description("A custom SageMaker image usable from Studio")
        .attribute(
            AttributeSchema::new("image_name", types::resource_name())
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("role_arn", types::arn()).required())
        .attribute(AttributeSchema::new("display_name", AttributeType::String))
        .attribute(AttributeSchema::new("description", AttributeType::String));

    tags()
        .into_iter()
        .chain(arn_and_status())
        .fold(schema, ResourceSchema::attribute)
}

/// Every attribute of an image version forces a new version
pub fn image_version_schema() -> ResourceSchema {
    ResourceSchema::new(image_version::RESOURCE_TYPE)
        .with_description("A version of a custom SageMaker image")
        .attribute(
            AttributeSchema::new("image_name", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("base_image", AttributeType::String)
                .required()
                .force_new()
                .with_description("Registry path of the container image"),
        )
        .attribute(AttributeSchema::new("image_arn", types::arn()).computed())
        .attribute(AttributeSchema::new("container_image", AttributeType::String).computed())
        .attribute(AttributeSchema::new("version", AttributeType::Int).computed())
        .attribute(AttributeSchema::new("arn", types::arn()).computed())
        .attribute(AttributeSchema::new("status", AttributeType::String).computed())
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![image_schema(), image_version_schema()]
}

#[cfg(test)]
mod tests {
    use super::super::tests::attributes;
    use super::*;
    use serde_json::json;

    #[test]
    fn image_name_must_be_a_resource_name() {
        let attrs = attributes(json!({
            "image_name": "my_image",
            "role_arn": "arn:aws:iam::123456789012:role/images"
        }));
        assert!(image_schema().validate(&attrs).is_err());

        let attrs = attributes(json!({
            "image_name": "my-image",
            "role_arn": "arn:aws:iam::123456789012:role/images",
            "display_name": "My image"
        }));
        assert!(image_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn image_version_is_immutable() {
        let schema = image_version_schema();
        assert!(schema.forces_new("base_image"));
        assert!(schema.is_computed("version"));

        let attrs = attributes(json!({
            "image_name": "my-image",
            "base_image": "123456789012.dkr.ecr.us-west-2.amazonaws.com/img:1",
            "version": 3
        }));
        let errors = schema.validate(&attrs).unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
