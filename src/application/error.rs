use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{blog::BlogError, mail::MailError, repos::RepoError},
    infra::error::InfraError,
};

/// Diagnostic chain attached to error responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<RepoError> for HttpError {
    fn from(error: RepoError) -> Self {
        const SOURCE: &str = "application::error::repo_error";
        match error {
            RepoError::NotFound => HttpError::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Resource not found",
                &error,
            ),
            RepoError::Timeout => HttpError::from_error(
                SOURCE,
                StatusCode::SERVICE_UNAVAILABLE,
                "Database timeout",
                &error,
            ),
            RepoError::Duplicate { .. } | RepoError::Integrity { .. } => HttpError::from_error(
                SOURCE,
                StatusCode::CONFLICT,
                "Integrity constraint violated",
                &error,
            ),
            RepoError::InvalidInput { .. } => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid input",
                &error,
            ),
            RepoError::Persistence(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Persistence error",
                &error,
            ),
        }
    }
}

impl From<MailError> for HttpError {
    fn from(error: MailError) -> Self {
        let status = match error {
            MailError::InvalidAddress { .. } => StatusCode::BAD_REQUEST,
            MailError::Build(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MailError::Transport(_) => StatusCode::BAD_GATEWAY,
        };
        HttpError::from_error(
            "application::error::mail_error",
            status,
            "Email could not be sent",
            &error,
        )
    }
}

impl From<BlogError> for HttpError {
    fn from(error: BlogError) -> Self {
        match error {
            BlogError::UnknownTag(_) | BlogError::PostNotFound => HttpError::from_error(
                "application::error::blog_error",
                StatusCode::NOT_FOUND,
                "Resource not found",
                &error,
            ),
            BlogError::Repo(err) => err.into(),
            BlogError::Mail(err) => err.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
