//! Schemas of the SageMaker resource types

pub mod images;
pub mod labeling;
pub mod notebook;
pub mod studio;

use settle_core::schema::ResourceSchema;

/// Get all schemas
pub fn all_schemas() -> Vec<ResourceSchema> {
    let mut schemas = Vec::new();
    schemas.extend(studio::schemas());
    schemas.extend(images::schemas());
    schemas.extend(labeling::schemas());
    schemas.extend(notebook::schemas());
    schemas
}
