use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use safe_ledger::{AssetError, LedgerError};
use thiserror::Error;
use tracing::error;

use crate::api::dto::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    InternalError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unprocessable(_) => "unprocessable",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::InternalError(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::InternalError(message) = &self {
            error!("Internal error: {}", message);
        }

        let body = ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::UnknownPosition(_) => ApiError::NotFound(message),
            LedgerError::InvalidDeposit { .. }
            | LedgerError::InvalidAmount
            | LedgerError::InvalidCollateral(_) => ApiError::BadRequest(message),
            LedgerError::InsufficientCollateral { .. }
            | LedgerError::RepayExceedsDebt { .. }
            | LedgerError::DebtOutstanding(_)
            | LedgerError::TransferFailed(_) => ApiError::Unprocessable(message),
            LedgerError::PriceUnavailable(_) => ApiError::ServiceUnavailable(message),
            LedgerError::ArithmeticOverflow | LedgerError::InvalidConfig(_) => {
                ApiError::InternalError(message)
            }
        }
    }
}

impl From<AssetError> for ApiError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::UnknownToken(_) => ApiError::NotFound(err.to_string()),
            _ => ApiError::Unprocessable(err.to_string()),
        }
    }
}

/// Service errors keep their status when they wrap a ledger or asset rejection.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(ledger_err) = err.downcast_ref::<LedgerError>() {
            return ledger_err.clone().into();
        }
        if let Some(asset_err) = err.downcast_ref::<AssetError>() {
            return asset_err.clone().into();
        }
        ApiError::InternalError(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safe_ledger::{Address, CollateralType, SafeId};

    #[test]
    fn test_ledger_errors_map_to_statuses() {
        let id = SafeId::derive(&Address::from_label(b"addr1"), &CollateralType::Native);

        assert_eq!(
            ApiError::from(LedgerError::UnknownPosition(id)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(LedgerError::InvalidAmount).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(LedgerError::InvalidCollateral(CollateralType::Token(Address::ZERO))).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(LedgerError::RepayExceedsDebt { requested: 2, outstanding: 1 }).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(LedgerError::PriceUnavailable(CollateralType::Native)).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(LedgerError::ArithmeticOverflow).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_anyhow_keeps_ledger_status() {
        let err = anyhow::Error::from(LedgerError::DebtOutstanding(5)).context("closing safe");
        assert_eq!(ApiError::from(err).status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = anyhow::anyhow!("boom");
        assert!(matches!(ApiError::from(err), ApiError::InternalError(_)));
    }
}
