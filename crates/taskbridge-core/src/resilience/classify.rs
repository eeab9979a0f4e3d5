//! Central classification of raw remote failures into the `ToolError` taxonomy.

use crate::domain::ToolError;
use crate::ports::RemoteError;

/// Classify a raw remote failure. `step` names what was being attempted
/// (e.g. `get task 42`) and ends up in the message.
pub fn classify(error: RemoteError, step: &str) -> ToolError {
    match error {
        RemoteError::Status { status: 401, message } => ToolError::Authentication {
            message: format!(
                "authentication rejected while trying to {step}: {message}. \
                 Check that the API token is valid and not expired"
            ),
        },
        RemoteError::Status {
            status: 403 | 404,
            message,
        } => ToolError::NotFound {
            message: format!(
                "could not {step}: the entity does not exist or is not accessible ({message})"
            ),
        },
        RemoteError::Status { status, message } => ToolError::Unknown {
            message: format!("failed to {step} (HTTP {status}): {message}"),
        },
        RemoteError::Transport(message) | RemoteError::Timeout(message) => {
            ToolError::Connectivity {
                message: format!(
                    "could not reach the task service while trying to {step}: {message}. \
                     Verify the service URL and that the server is running"
                ),
            }
        }
        RemoteError::Other(message) => ToolError::Unknown {
            message: format!("failed to {step}: {message}"),
        },
    }
}
