use crate::http::ExtractError;
use crate::image::ImageError;
use crate::select::SelectError;
use crate::store::StoreError;

use ::http::StatusCode;

pub type StdError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T = (), E = Error> = std::result::Result<T, E>;

/// Any failure a request can run into
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Select(#[from] SelectError),
}

impl Error {
    /// HTTP status code reported to the client
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Extract(ExtractError::BodyTooLarge(..)) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Extract(_) | Self::Image(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) | Self::Select(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message that is safe to show to the client
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Extract(e) => e.client_message().to_owned(),
            Self::Image(e) => e.to_string(),
            Self::Store(_) | Self::Select(_) => format!("Error: {self}"),
        }
    }

    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        let err = Error::from(ExtractError::NoFilePart);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.is_client_error());

        let err = Error::from(ExtractError::BodyTooLarge(11, 10));
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);

        let err = Error::from(StoreError::NotFound {
            bucket: "b".into(),
            key: "k".into(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.is_client_error());

        let err = Error::from(SelectError::NoImages);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = Error::from(ImageError::InvalidImage);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn client_messages_are_distinct() {
        let errors = [
            ExtractError::MalformedHeader("missing boundary".into()),
            ExtractError::NoFilePart,
            ExtractError::EmptyPayload,
            ExtractError::InvalidBase64,
        ];
        let mut messages: Vec<_> = errors.into_iter().map(|e| Error::from(e).client_message()).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn server_errors_have_error_prefix() {
        let err = Error::from(SelectError::EmptyRange);
        assert!(err.client_message().starts_with("Error: "));
    }
}
