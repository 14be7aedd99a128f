use crate::Error;
use http::StatusCode;

#[cfg_attr(docsrs, doc(cfg(feature = "http")))]
impl Error {
    /// Returns the http status code of this error as a [`StatusCode`].
    ///
    /// Codes outside of the valid `100..=999` range map to
    /// [`StatusCode::INTERNAL_SERVER_ERROR`].
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.http_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Returns a new [`Error`] with its http status code set to `status`.
    ///
    /// See [`Error::with_http_code`].
    #[must_use]
    pub fn with_status_code(&self, status: StatusCode) -> Self {
        self.with_http_code(status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HTTP_CODE_KEY, wrap, wrap_with};
    use std::io;

    #[test]
    fn default_status_code() {
        let err = wrap(io::Error::other("x"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn with_status_code_round_trips() {
        let err = wrap(io::Error::other("x")).with_status_code(StatusCode::NOT_FOUND);
        assert_eq!(err.http_code(), 404);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_code_maps_to_internal_server_error() {
        let err = wrap_with(io::Error::other("x"), ctx![HTTP_CODE_KEY, 42]);
        assert_eq!(err.http_code(), 42);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
