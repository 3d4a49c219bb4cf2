use std::fmt;

use serde::{Deserialize, Serialize};

/// Structured summary of a MongoDB driver error.
///
/// Serialized to JSON for display and attached to log events.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub(crate) error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub(crate) labels: Vec<String>,
}

impl ErrorInfo {
    /// Server error code, when the server reported one.
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    /// Convert error info to compact JSON string (single line).
    pub fn to_json_compact(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Format a driver error as pretty JSON wrapped in an `error` field.
pub fn format_mongodb_error(
    f: &mut fmt::Formatter<'_>,
    error: &mongodb::error::Error,
) -> fmt::Result {
    let info = extract_error_info(error);
    let wrapper = serde_json::json!({ "error": info });
    let json_output = serde_json::to_string_pretty(&wrapper).map_err(|_| fmt::Error)?;
    write!(f, "\n{json_output}")
}

/// Extract structured information from a driver error using its typed kinds.
pub fn extract_error_info(error: &mongodb::error::Error) -> ErrorInfo {
    use mongodb::error::{ErrorKind, WriteFailure};

    let mut info = ErrorInfo {
        labels: error.labels().iter().cloned().collect(),
        ..ErrorInfo::default()
    };
    info.labels.sort();

    match error.kind.as_ref() {
        ErrorKind::Command(command_error) => {
            info.error_type = Some("mongo.command_error".to_string());
            info.code = Some(command_error.code);
            info.message = Some(command_error.message.clone());
            info.name = error_name(command_error.code)
                .map(str::to_string)
                .or_else(|| Some(command_error.code_name.clone()).filter(|n| !n.is_empty()));
        }
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            info.error_type = Some("mongo.write_error".to_string());
            info.code = Some(write_error.code);
            info.message = Some(write_error.message.clone());
            info.name = error_name(write_error.code).map(str::to_string);
        }
        ErrorKind::Write(WriteFailure::WriteConcernError(wc_error)) => {
            info.error_type = Some("mongo.write_concern_error".to_string());
            info.code = Some(wc_error.code);
            info.message = Some(wc_error.message.clone());
            info.name = error_name(wc_error.code).map(str::to_string);
        }
        ErrorKind::Authentication { message, .. } => {
            info.error_type = Some("mongo.authentication_error".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::InvalidArgument { message, .. } => {
            info.error_type = Some("mongo.invalid_argument".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::ServerSelection { message, .. } => {
            info.error_type = Some("mongo.server_selection_error".to_string());
            info.message = Some(message.clone());
        }
        _ => {
            info.message = Some(error.to_string());
        }
    }

    if matches!(info.code, Some(11000 | 11001)) {
        info.message = Some("Duplicate key error".to_string());
    }

    info
}

/// Human-readable name for the server error codes a cursor commonly hits.
fn error_name(code: i32) -> Option<&'static str> {
    let name = match code {
        11000 | 11001 => "DuplicateKey",
        2 => "BadValue",
        13 => "Unauthorized",
        26 => "NamespaceNotFound",
        43 => "CursorNotFound",
        50 => "MaxTimeMSExpired",
        96 => "OperationFailed",
        175 => "QueryPlanKilled",
        237 => "CursorKilled",
        _ => return None,
    };

    Some(name)
}
