//! Built-in models registered in every schema registry

use super::{AttributeSpec, ModelKind, ModelSchema, ADMIN_USER_UID, UPLOAD_FILE_UID};

/// Upload (media) records
///
/// `related` is a polymorphic back-reference without a static target, so it
/// is declared as a scalar; population skips it regardless.
pub fn upload_file_schema() -> ModelSchema {
    let scalars = [
        "name",
        "alternativeText",
        "caption",
        "width",
        "height",
        "formats",
        "hash",
        "ext",
        "mime",
        "size",
        "url",
        "previewUrl",
        "provider",
        "provider_metadata",
        "related",
        "createdAt",
        "updatedAt",
    ];

    scalars
        .iter()
        .fold(
            ModelSchema::new(UPLOAD_FILE_UID, "files", ModelKind::BuiltIn),
            |schema, name| schema.with_attribute(*name, AttributeSpec::Scalar),
        )
}

/// Administrator accounts referenced by `createdBy` / `updatedBy`
pub fn admin_user_schema() -> ModelSchema {
    let scalars = [
        "firstname",
        "lastname",
        "username",
        "email",
        "isActive",
        "blocked",
        "preferedLanguage",
        "createdAt",
        "updatedAt",
    ];

    scalars
        .iter()
        .fold(
            ModelSchema::new(ADMIN_USER_UID, "admin_users", ModelKind::BuiltIn),
            |schema, name| schema.with_attribute(*name, AttributeSpec::Scalar),
        )
}
