use crate::{BoxError, Error, Value, wrap, wrap_with};

/// Extends [`Result`] with methods to annotate its error.
///
/// All methods capture the call stack at their caller, exactly like
/// [`wrap`] does. Errors that already are an [`Error`] are passed through
/// as-is by [`ResultExt::wrap_err`] and [`ResultExt::wrap_err_with`].
///
/// # Examples
///
/// ```
/// use erroneous::{ctx, ResultExt};
///
/// fn parse_port(s: &str) -> Result<u16, erroneous::Error> {
///     s.parse::<u16>()
///         .wrap_err_with(ctx!["input", s])
///         .map_err(|err| err.with_http_code(400))
/// }
///
/// let err = parse_port("http").unwrap_err();
/// assert_eq!(err.http_code(), 400);
/// assert_eq!(err.value("input").unwrap(), "http");
/// ```
pub trait ResultExt<T>: private::SealedResultExt {
    /// Wrap the contained error, if any.
    fn wrap_err(self) -> Result<T, Error>;

    /// Wrap the contained error, if any, attaching the given raw context.
    fn wrap_err_with<C, V>(self, context: C) -> Result<T, Error>
    where
        C: IntoIterator<Item = V>,
        V: Into<Value>;

    /// Wrap the contained error, if any, and set its http status code.
    fn with_http_code(self, code: u16) -> Result<T, Error>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<BoxError>,
{
    #[track_caller]
    fn wrap_err(self) -> Result<T, Error> {
        match self {
            Ok(value) => Ok(value),
            Err(error) => Err(wrap(error)),
        }
    }

    #[track_caller]
    fn wrap_err_with<C, V>(self, context: C) -> Result<T, Error>
    where
        C: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        match self {
            Ok(value) => Ok(value),
            Err(error) => Err(wrap_with(error, context)),
        }
    }

    #[track_caller]
    fn with_http_code(self, code: u16) -> Result<T, Error> {
        match self {
            Ok(value) => Ok(value),
            Err(error) => Err(wrap(error).with_http_code(code)),
        }
    }
}

mod private {
    pub trait SealedResultExt {}

    impl<T, E> SealedResultExt for Result<T, E> where E: Into<crate::BoxError> {}
}
