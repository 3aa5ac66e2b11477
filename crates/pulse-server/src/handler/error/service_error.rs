//! Service error to HTTP error conversion.

use super::http_error::{Error as HttpError, ErrorKind};
use crate::ErrorKind as ServiceErrorKind;

/// Tracing target for service error conversions.
const TRACING_TARGET: &str = "pulse_server::handler::service";

impl From<crate::Error> for HttpError<'static> {
    fn from(error: crate::Error) -> Self {
        match error.kind() {
            ServiceErrorKind::Config => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    error = %error,
                    "Request rejected by configuration"
                );
                ErrorKind::BadRequest.with_message(error.message().to_owned())
            }
            ServiceErrorKind::External => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %error,
                    "Dependency call failed"
                );
                ErrorKind::ServiceUnavailable.with_context(error.message().to_owned())
            }
            ServiceErrorKind::Internal => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %error,
                    "Internal service error"
                );
                ErrorKind::InternalServerError.with_context(error.message().to_owned())
            }
        }
    }
}
