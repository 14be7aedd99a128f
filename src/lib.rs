//! Annotated errors: wrap any error together with the call stack at the wrap
//! site, an ordered key/value context and an http status code.
//!
//! The [`Error`] type is an immutable, cheaply cloneable handle.
//! All `with_*` methods return a new [`Error`] and leave the receiver untouched,
//! sharing the parts that did not change. This makes an [`Error`] safe to pass
//! around and annotate further from any thread.
//!
//! # Examples
//!
//! ```
//! use erroneous::{ctx, HTTP_CODE_KEY};
//! use std::io;
//!
//! let err = erroneous::wrap_with(io::Error::other("disk on fire"), ctx!["path", "/var/db", "attempt", 3]);
//! assert_eq!(err.value("path").unwrap(), "/var/db");
//! assert_eq!(err.http_code(), 500);
//!
//! let err = err.with_http_code(503);
//! assert_eq!(err.http_code(), 503);
//! assert_eq!(err.context()[4], HTTP_CODE_KEY);
//!
//! // wrapping an already annotated error is a no-op
//! let again = erroneous::wrap(err.clone());
//! assert!(erroneous::Error::ptr_eq(&err, &again));
//! ```
//!
//! Context handed over as a raw alternating list is validated: an odd
//! number of entries, or a key that is not a string, replaces the whole
//! list with a single `ERRONEOUS_ERROR` diagnostic pair.
//!
//! ```
//! use erroneous::{ctx, ERRONEOUS_ERROR_KEY};
//! use std::io;
//!
//! let err = erroneous::wrap_with(io::Error::other("oops"), ctx!["keyonly"]);
//! assert_eq!(err.context()[0], ERRONEOUS_ERROR_KEY);
//! assert_eq!(err.context()[1], "invalid context, odd length");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

use std::error::Error as StdError;

/// Alias for a type-erased error type.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Polymorphic value stored in a [`Context`].
pub use serde_json::Value;

#[macro_use]
mod macros;

mod chain;
pub use chain::Chain;

mod context;
pub use context::{Context, Pairs};

mod error;
pub use error::Error;

mod ext;
pub use ext::ResultExt;

#[cfg(feature = "http")]
mod status;

mod stack;
pub use stack::{CallStack, Frame, MAX_FRAMES};

/// Reserved context key holding the http status code of an [`Error`].
pub const HTTP_CODE_KEY: &str = "httpcode";

/// Reserved context key used for the diagnostic pair that replaces invalid context.
pub const ERRONEOUS_ERROR_KEY: &str = "ERRONEOUS_ERROR";

/// Status code reported by [`Error::http_code`] when none (or no valid one) is set.
pub const DEFAULT_HTTP_CODE: u16 = 500;

/// Diagnostic message used when raw context has an odd number of entries.
pub const INVALID_CONTEXT_ODD_LENGTH: &str = "invalid context, odd length";

/// Diagnostic message used when a raw context key is not a string.
pub const INVALID_CONTEXT_KEY_NOT_STRING: &str = "invalid context, even-position not a string";

/// Wrap an error into an annotated [`Error`] without any context.
///
/// See [`wrap_with`] for the details.
#[track_caller]
pub fn wrap(error: impl Into<BoxError>) -> Error {
    wrap_with(error, std::iter::empty::<Value>())
}

/// Wrap an error into an annotated [`Error`], attaching the given raw context.
///
/// The context is read as alternating keys and values and validated
/// as described in [`Context::validate`].
///
/// If `error` already is an [`Error`] it is returned as-is and
/// the given context is ignored. Otherwise the call stack is captured
/// with the caller of this function as its topmost frame.
#[track_caller]
pub fn wrap_with<C, V>(error: impl Into<BoxError>, context: C) -> Error
where
    C: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let error: BoxError = error.into();
    match error.downcast::<Error>() {
        Ok(annotated) => *annotated,
        Err(cause) => Error::new(cause, Context::validate(context), CallStack::capture()),
    }
}

/// Wrap an optional error, mapping `None` to `None`.
#[track_caller]
pub fn wrap_opt<E>(error: Option<E>) -> Option<Error>
where
    E: Into<BoxError>,
{
    let error = error?;
    Some(wrap(error))
}
