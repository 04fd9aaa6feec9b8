//! Transport codec for [`OperationDescriptor`].
//!
//! The wire format is pretty-printed JSON with a `kind` tag. Decoding is strict and
//! two-phase: the raw document is checked for a known `kind` and the fields that kind
//! requires, then typed and validated. Unknown extra fields are ignored so the two sides of
//! the boundary can evolve independently.

use serde_json::Value;

use crate::error::{DecodeError, EncodeError};
use crate::model::{OperationDescriptor, OperationKind};

const MAX_MODE: u32 = 0o7777;

/// Encode a descriptor into its transport representation.
///
/// # Errors
///
/// Returns an error if JSON serialisation fails.
pub fn encode(descriptor: &OperationDescriptor) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec_pretty(descriptor)?)
}

/// Decode a transport payload into a fully validated descriptor.
///
/// # Errors
///
/// Returns [`DecodeError::Malformed`] when the payload is not JSON, the `kind` tag is absent
/// or unknown, a field has the wrong shape, or a path is relative; returns
/// [`DecodeError::MissingField`] when a field required by the declared kind is absent.
pub fn decode(bytes: &[u8]) -> Result<OperationDescriptor, DecodeError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|err| DecodeError::malformed(None, "invalid_json", Some(err.to_string())))?;

    let kind = check_required_fields(&value)?;

    let descriptor: OperationDescriptor = serde_json::from_value(value)
        .map_err(|err| DecodeError::malformed(None, "invalid_field", Some(err.to_string())))?;
    debug_assert_eq!(descriptor.kind(), kind);

    validate(&descriptor)?;
    Ok(descriptor)
}

fn check_required_fields(value: &Value) -> Result<OperationKind, DecodeError> {
    let object = value
        .as_object()
        .ok_or_else(|| DecodeError::malformed(None, "not_an_object", None))?;

    let tag = object
        .get("kind")
        .ok_or_else(|| DecodeError::malformed(Some("kind"), "missing", None))?
        .as_str()
        .ok_or_else(|| DecodeError::malformed(Some("kind"), "not_a_string", None))?;

    let kind = OperationKind::from_tag(tag).ok_or_else(|| {
        DecodeError::malformed(Some("kind"), "unknown_kind", Some(tag.to_string()))
    })?;

    if let Some(field) = kind
        .required_fields()
        .iter()
        .find(|field| object.get(**field).is_none_or(Value::is_null))
    {
        return Err(DecodeError::MissingField {
            kind,
            field: *field,
        });
    }

    if kind == OperationKind::WriteBytes {
        check_payload_fields(object.get("payload"))?;
    }

    Ok(kind)
}

/// Nested fields of a `write_bytes` payload; shape errors are left to typed decoding.
fn check_payload_fields(payload: Option<&Value>) -> Result<(), DecodeError> {
    let Some(payload) = payload.and_then(Value::as_object) else {
        return Ok(());
    };
    let missing = |field| DecodeError::MissingField {
        kind: OperationKind::WriteBytes,
        field,
    };
    match payload.get("source") {
        None | Some(Value::Null) => Err(missing("payload.source")),
        Some(Value::String(source))
            if source == "inline" && payload.get("data").is_none_or(Value::is_null) =>
        {
            Err(missing("payload.data"))
        }
        Some(_) => Ok(()),
    }
}

fn validate(descriptor: &OperationDescriptor) -> Result<(), DecodeError> {
    for (field, path) in descriptor.path_fields() {
        if !path.is_absolute() {
            return Err(DecodeError::malformed(
                Some(field),
                "relative_path",
                Some(path.to_string_lossy().into_owned()),
            ));
        }
    }

    match descriptor {
        OperationDescriptor::Delete { source_paths }
        | OperationDescriptor::Move { source_paths, .. }
        | OperationDescriptor::Copy { source_paths, .. }
        | OperationDescriptor::Link { source_paths, .. }
        | OperationDescriptor::Compress { source_paths, .. }
            if source_paths.is_empty() =>
        {
            Err(DecodeError::malformed(Some("source_paths"), "empty", None))
        }
        OperationDescriptor::SetOwnerGroup {
            owner_name,
            group_name,
            ..
        } => {
            if owner_name.is_none() && group_name.is_none() {
                return Err(DecodeError::MissingField {
                    kind: OperationKind::SetOwnerGroup,
                    field: "owner_name",
                });
            }
            if owner_name.as_deref().is_some_and(|name| name.trim().is_empty()) {
                return Err(DecodeError::malformed(Some("owner_name"), "empty", None));
            }
            if group_name.as_deref().is_some_and(|name| name.trim().is_empty()) {
                return Err(DecodeError::malformed(Some("group_name"), "empty", None));
            }
            Ok(())
        }
        OperationDescriptor::SetPermissions { mode, .. } if *mode > MAX_MODE => {
            Err(DecodeError::malformed(
                Some("mode"),
                "out_of_range",
                Some(format!("0o{mode:o}")),
            ))
        }
        _ => Ok(()),
    }
}
