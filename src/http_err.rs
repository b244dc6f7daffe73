use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::analytics::{domain::filters::QueryValidationError, services::AnalyticsError};

#[derive(Debug, PartialEq)]
pub enum ApiError {
    BadRequestReason(String),
    ServiceUnavailable(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequestReason(_) => StatusCode::BAD_REQUEST,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn prefixed(self, prefix: impl std::fmt::Display) -> Self {
        match self {
            Self::BadRequestReason(message) => {
                Self::BadRequestReason(format!("{}: {}", prefix, message))
            }
            Self::ServiceUnavailable(message) => {
                Self::ServiceUnavailable(format!("{}: {}", prefix, message))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::BadRequestReason(message) | Self::ServiceUnavailable(message) => message,
        };

        (status, Json(ErrorRep { message })).into_response()
    }
}

impl From<QueryValidationError> for ApiError {
    fn from(error: QueryValidationError) -> Self {
        Self::BadRequestReason(error.to_string())
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(error: AnalyticsError) -> Self {
        match error {
            AnalyticsError::InvalidQuery(reason) => reason.into(),
            AnalyticsError::StoreUnavailable(_) => {
                Self::ServiceUnavailable("The transaction store is unavailable.".to_owned())
            }
            AnalyticsError::PartialAggregationFailure { query, source } => {
                Self::from(*source).prefixed(format!("Failed to compute {}", query))
            }
        }
    }
}

pub type ApiResponse<T> = Result<T, ApiError>;

#[derive(Serialize)]
pub struct ErrorRep {
    pub message: String,
}

#[cfg(test)]
mod test {
    use anyhow::anyhow;

    use crate::analytics::services::AnalyticsQuery;

    use super::*;

    #[test]
    fn invalid_query_is_bad_request() {
        let error = ApiError::from(AnalyticsError::InvalidQuery(
            QueryValidationError::MonthOutOfRange(13),
        ));

        assert_eq!(
            ApiError::BadRequestReason("month must be between 1 and 12, got 13".to_owned()),
            error
        );
        assert_eq!(StatusCode::BAD_REQUEST, error.status());
    }

    #[test]
    fn store_failure_hides_cause() {
        let error = ApiError::from(AnalyticsError::StoreUnavailable(anyhow!(
            "password authentication failed for user \"sales\""
        )));

        assert_eq!(
            ApiError::ServiceUnavailable("The transaction store is unavailable.".to_owned()),
            error
        );
    }

    #[test]
    fn partial_failure_follows_cause_and_names_query() {
        let error = ApiError::from(AnalyticsError::PartialAggregationFailure {
            query: AnalyticsQuery::Histogram,
            source: Box::new(AnalyticsError::StoreUnavailable(anyhow!("timed out"))),
        });

        assert_eq!(StatusCode::SERVICE_UNAVAILABLE, error.status());
        assert_eq!(
            ApiError::ServiceUnavailable(
                "Failed to compute histogram: The transaction store is unavailable.".to_owned()
            ),
            error
        );
    }
}
