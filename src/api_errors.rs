use actix_multipart::MultipartError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use derive_more::Display;

use crate::{
    entities::response::ApiResponse,
    errors::AppError,
    imaging::processor::ImagingError,
};

/// Failures raised while accepting multipart uploads.
#[derive(Debug, Display)]
pub enum UploadError {
    #[display("File too large. Maximum size is {max_mb}MB")]
    FileTooLarge { max_mb: u64 },

    #[display("Too many files. Maximum is {_0} files")]
    TooManyFiles(usize),

    #[display("Unexpected field: {_0}")]
    UnexpectedField(String),

    #[display("Only image files are allowed")]
    InvalidFileType,

    #[display("No file uploaded")]
    NoFile,

    #[display("Malformed multipart body: {_0}")]
    Multipart(String),

    #[display("Too many uploads. Retry in {_0} seconds")]
    RateLimited(u64),

    #[display("Storage error: {_0}")]
    Storage(String),

    #[display("{_0}")]
    App(AppError),
}

impl UploadError {
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::FileTooLarge { .. } => "LIMIT_FILE_SIZE",
            UploadError::TooManyFiles(_) => "LIMIT_FILE_COUNT",
            UploadError::UnexpectedField(_) => "LIMIT_UNEXPECTED_FILE",
            UploadError::InvalidFileType => "INVALID_FILE_TYPE",
            UploadError::NoFile => "NO_FILE",
            UploadError::Multipart(_) => "MALFORMED_MULTIPART",
            UploadError::RateLimited(_) => "RATE_LIMITED",
            UploadError::Storage(_) => "INTERNAL_ERROR",
            UploadError::App(err) => err.code(),
        }
    }
}

impl ResponseError for UploadError {
    fn status_code(&self) -> StatusCode {
        match self {
            UploadError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            UploadError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::App(err) => err.status_code(),
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            UploadError::App(err) => err.error_response(),
            UploadError::Storage(msg) => {
                tracing::error!(error = %msg, "upload storage failure");
                HttpResponse::build(self.status_code())
                    .json(ApiResponse::failure(self.code(), "Internal server error"))
            }
            UploadError::RateLimited(retry_after) => HttpResponse::build(self.status_code())
                .insert_header(("Retry-After", retry_after.to_string()))
                .json(ApiResponse::failure(self.code(), self.to_string())),
            _ => HttpResponse::build(self.status_code())
                .json(ApiResponse::failure(self.code(), self.to_string())),
        }
    }
}

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        match err {
            MultipartError::ContentTypeIncompatible => {
                UploadError::Multipart("Content type must be multipart/form-data".to_string())
            }
            MultipartError::Payload(e) => UploadError::Multipart(e.to_string()),
            _ => UploadError::Multipart(err.to_string()),
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        UploadError::Storage(err.to_string())
    }
}

impl From<AppError> for UploadError {
    fn from(err: AppError) -> Self {
        UploadError::App(err)
    }
}

impl From<ImagingError> for UploadError {
    fn from(err: ImagingError) -> Self {
        match err {
            ImagingError::Decode(_) => UploadError::InvalidFileType,
            other => UploadError::Storage(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for UploadError {
    fn from(err: sqlx::Error) -> Self {
        UploadError::App(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_multer_names() {
        assert_eq!(UploadError::FileTooLarge { max_mb: 5 }.code(), "LIMIT_FILE_SIZE");
        assert_eq!(UploadError::TooManyFiles(10).code(), "LIMIT_FILE_COUNT");
        assert_eq!(UploadError::UnexpectedField("photo".into()).code(), "LIMIT_UNEXPECTED_FILE");
        assert_eq!(UploadError::InvalidFileType.to_string(), "Only image files are allowed");
        assert_eq!(UploadError::NoFile.to_string(), "No file uploaded");
    }

    #[test]
    fn limits_are_client_errors() {
        assert_eq!(UploadError::FileTooLarge { max_mb: 5 }.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(UploadError::RateLimited(3).status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            UploadError::App(AppError::UnauthorizedAccess).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }
}
