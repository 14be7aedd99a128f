use crate::{BoxError, CallStack, Chain, Context, DEFAULT_HTTP_CODE, HTTP_CODE_KEY, Value};
use serde::{Serialize, Serializer, ser::SerializeStruct};
use std::{error::Error as StdError, fmt, sync::Arc};

/// An error annotated with a call stack, key/value [`Context`]
/// and an http status code.
///
/// Created using [`wrap`](crate::wrap) and friends. An [`Error`] is an
/// immutable handle: cloning it is cheap and all `with_*` methods return a
/// new [`Error`], sharing the cause and any part they do not change.
///
/// The wrapped cause is exposed through [`Error::cause`] and as the
/// [`source`](StdError::source) of this error.
#[derive(Clone)]
pub struct Error {
    inner: Arc<Inner>,
}

struct Inner {
    cause: Arc<dyn StdError + Send + Sync + 'static>,
    context: Context,
    stack: CallStack,
}

impl Error {
    pub(crate) fn new(cause: BoxError, context: Context, stack: CallStack) -> Self {
        Self::from_parts(Arc::from(cause), context, stack)
    }

    fn from_parts(
        cause: Arc<dyn StdError + Send + Sync + 'static>,
        context: Context,
        stack: CallStack,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cause,
                context,
                stack,
            }),
        }
    }

    /// Returns the originally wrapped error.
    #[must_use]
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.inner.cause
    }

    /// Returns true if the wrapped error is of type `T`.
    #[must_use]
    pub fn is<T>(&self) -> bool
    where
        T: StdError + 'static,
    {
        self.inner.cause.is::<T>()
    }

    /// Attempts to downcast the wrapped error to a shared reference
    /// of the concrete type `T`.
    #[must_use]
    pub fn downcast_ref<T>(&self) -> Option<&T>
    where
        T: StdError + 'static,
    {
        self.inner.cause.downcast_ref()
    }

    /// Returns the alternating keys and values describing
    /// the circumstances of this error.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.inner.context
    }

    /// Returns the context value paired with the first occurrence of `key`.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.inner.context.get(key)
    }

    /// Returns the http status code set on this error.
    ///
    /// Falls back to [`DEFAULT_HTTP_CODE`] (500) if no code is set,
    /// or if the value stored under [`HTTP_CODE_KEY`] is not an integer
    /// that fits in a `u16`.
    #[must_use]
    pub fn http_code(&self) -> u16 {
        self.value(HTTP_CODE_KEY)
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
            .unwrap_or(DEFAULT_HTTP_CODE)
    }

    /// Returns the call stack captured when this error was wrapped
    /// (or last re-stacked using [`Error::with_stack`]).
    #[must_use]
    pub fn stack(&self) -> &CallStack {
        &self.inner.stack
    }

    /// Iterate over this error and its chain of source errors,
    /// starting with this error itself.
    pub fn chain(&self) -> Chain<'_> {
        Chain::new(self)
    }

    /// Returns the innermost error of the [`chain`](Error::chain).
    #[must_use]
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        self.chain().last().unwrap_or(self)
    }

    /// Returns a new [`Error`] with the given raw context appended.
    ///
    /// The context is validated as described in [`Context::validate`].
    /// Existing entries keep their position, so a key that was already
    /// present keeps resolving to its old value in [`Error::value`].
    #[must_use]
    pub fn with_context<C, V>(&self, context: C) -> Self
    where
        C: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with_validated(&Context::validate(context))
    }

    /// Returns a new [`Error`] with the given typed key/value pairs appended.
    #[must_use]
    pub fn with_pairs<I, K, V>(&self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.with_validated(&Context::from_pairs(pairs))
    }

    fn with_validated(&self, context: &Context) -> Self {
        Self::from_parts(
            self.inner.cause.clone(),
            self.inner.context.concat(context),
            self.inner.stack.clone(),
        )
    }

    /// Returns a new [`Error`] with its http status code set to `code`.
    ///
    /// If a status code is already present its first occurrence is replaced
    /// in place, otherwise a new pair is appended.
    #[must_use]
    pub fn with_http_code(&self, code: u16) -> Self {
        match self.inner.context.position(HTTP_CODE_KEY) {
            Some(index) => Self::from_parts(
                self.inner.cause.clone(),
                self.inner.context.replaced(index, Value::from(code)),
                self.inner.stack.clone(),
            ),
            None => self.with_context([Value::from(HTTP_CODE_KEY), Value::from(code)]),
        }
    }

    /// Returns a new [`Error`] with the same cause and context,
    /// but with the call stack captured at the caller of this method.
    #[track_caller]
    #[must_use]
    pub fn with_stack(&self) -> Self {
        Self::from_parts(
            self.inner.cause.clone(),
            self.inner.context.clone(),
            CallStack::capture(),
        )
    }

    /// Returns true if both handles point to the very same annotated error.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Emit a [`tracing`] event describing this error.
    ///
    /// The level follows the http status code: `ERROR` for server errors,
    /// `WARN` for client errors and `INFO` for anything else.
    pub fn record(&self) {
        let code = self.http_code();
        let context = &self.inner.context;
        let stack = &self.inner.stack;
        match code {
            500.. => tracing::error!(http_code = code, %context, %stack, "{self}"),
            400..500 => tracing::warn!(http_code = code, %context, %stack, "{self}"),
            _ => tracing::info!(http_code = code, %context, %stack, "{self}"),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("cause", &self.inner.cause)
            .field("context", &self.inner.context)
            .field("stack", &self.inner.stack)
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !f.alternate() {
            return fmt::Display::fmt(&self.inner.cause, f);
        }

        writeln!(f, "{}", self.inner.cause)?;
        if !self.inner.context.is_empty() {
            writeln!(f, "Context: {}", self.inner.context)?;
        }
        writeln!(f, "Stack:")?;
        write!(f, "{:#}", self.inner.stack)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.inner.cause)
    }
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Error", 4)?;
        state.serialize_field("message", &self.inner.cause.to_string())?;
        state.serialize_field("http_code", &self.http_code())?;
        state.serialize_field("context", &self.inner.context)?;
        state.serialize_field("stack", &self.inner.stack)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ERRONEOUS_ERROR_KEY, wrap, wrap_with};
    use std::io;

    #[derive(Debug)]
    struct CustomError(usize);

    impl fmt::Display for CustomError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Custom error ({})", self.0)
        }
    }

    impl StdError for CustomError {}

    #[test]
    fn cause_is_the_wrapped_error() {
        let err = wrap(CustomError(7));
        assert!(err.is::<CustomError>());
        assert_eq!(err.downcast_ref::<CustomError>().unwrap().0, 7);
        assert_eq!(err.cause().to_string(), "Custom error (7)");
        assert!(err.source().unwrap().is::<CustomError>());
    }

    #[test]
    fn display_non_alternate_prints_only_cause() {
        let err = wrap_with(io::Error::other("boom"), ["key", "value"]);
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn display_alternate_includes_context_and_stack() {
        let err = wrap_with(io::Error::other("boom"), ["key", "value"]);
        let s = format!("{err:#}");
        assert!(s.starts_with("boom\n"), "got: {s:?}");
        assert!(s.contains("\nContext: key=\"value\"\n"), "got: {s:?}");
        assert!(s.contains("\nStack:\n"), "got: {s:?}");
        assert!(s.contains("error.rs"), "got: {s:?}");
    }

    #[test]
    fn debug_includes_type_name() {
        let err = wrap(io::Error::other("boom"));
        let s = format!("{err:?}");
        assert!(s.starts_with("Error {"), "got: {s:?}");
        assert!(s.contains("context: []"), "got: {s:?}");
    }

    #[test]
    fn http_code_ignores_non_integers() {
        let values = [
            Value::from("404"),
            Value::from(404.5),
            Value::from(-1),
            Value::from(70_000),
            Value::Null,
        ];
        for value in values {
            let err = wrap_with(io::Error::other("x"), [Value::from(HTTP_CODE_KEY), value]);
            assert_eq!(err.http_code(), DEFAULT_HTTP_CODE);
        }
    }

    #[test]
    fn http_code_reads_first_occurrence() {
        let err = wrap_with(
            io::Error::other("x"),
            ctx![HTTP_CODE_KEY, 404, HTTP_CODE_KEY, 409],
        );
        assert_eq!(err.http_code(), 404);
    }

    #[test]
    fn with_http_code_replaces_first_occurrence_only() {
        let err = wrap_with(
            io::Error::other("x"),
            ctx!["a", 1, HTTP_CODE_KEY, 404, HTTP_CODE_KEY, 418],
        );
        let err = err.with_http_code(409);
        let expected = ctx!["a", 1, HTTP_CODE_KEY, 409, HTTP_CODE_KEY, 418];
        assert_eq!(err.context().as_slice(), expected.as_slice());
    }

    #[test]
    fn with_http_code_appends_when_missing() {
        let err = wrap_with(io::Error::other("x"), ["a", "b"]);
        let err = err.with_http_code(404);
        let expected = ctx!["a", "b", HTTP_CODE_KEY, 404];
        assert_eq!(err.context().as_slice(), expected.as_slice());
    }

    #[test]
    fn with_operations_leave_receiver_untouched() {
        let original = wrap_with(io::Error::other("x"), ["a", "b"]);
        let _ = original.with_context(["c", "d"]);
        let _ = original.with_http_code(404);
        let _ = original.with_stack();
        assert_eq!(original.context().as_slice(), ctx!["a", "b"].as_slice());
        assert_eq!(original.http_code(), 500);
    }

    #[test]
    fn with_context_shares_cause_and_stack() {
        let err = wrap(io::Error::other("x"));
        let other = err.with_context(["a", "b"]);
        assert!(!Error::ptr_eq(&err, &other));
        assert!(Arc::ptr_eq(&err.inner.cause, &other.inner.cause));
        assert!(CallStack::ptr_eq(err.stack(), other.stack()));
    }

    #[test]
    fn with_stack_shares_cause_and_context() {
        let err = wrap_with(io::Error::other("x"), ["a", "b"]);
        let other = err.with_stack();
        assert!(Arc::ptr_eq(&err.inner.cause, &other.inner.cause));
        assert!(Context::ptr_eq(err.context(), other.context()));
        assert!(!CallStack::ptr_eq(err.stack(), other.stack()));
    }

    #[test]
    fn with_context_validates_new_pairs_only() {
        let err = wrap_with(io::Error::other("x"), ["old", "context"]);
        let err = err.with_context(["oops"]);
        assert_eq!(err.value("old").unwrap(), "context");
        assert_eq!(err.context()[2], ERRONEOUS_ERROR_KEY);
    }

    #[test]
    fn with_pairs_appends_typed_pairs() {
        let err = wrap(io::Error::other("x"));
        let err = err.with_pairs([("user", "glen"), ("role", "admin")]);
        assert_eq!(err.value("role").unwrap(), "admin");
        assert_eq!(err.context().len(), 4);
    }

    #[test]
    fn root_cause_follows_sources() {
        let inner = wrap(CustomError(1));
        let outer = wrap(io::Error::other(NotAnnotated(inner)));
        assert!(outer.root_cause().is::<CustomError>());
        assert_eq!(outer.chain().count(), 4);
    }

    #[derive(Debug)]
    struct NotAnnotated(Error);

    impl fmt::Display for NotAnnotated {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "not annotated")
        }
    }

    impl StdError for NotAnnotated {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn serialize_as_report() {
        let err = wrap_with(io::Error::other("boom"), ["key", "value"]);
        let json = serde_json::to_value(err.with_http_code(404)).unwrap();
        assert_eq!(json["message"], "boom");
        assert_eq!(json["http_code"], 404);
        let context = serde_json::json!(["key", "value", "httpcode", 404]);
        assert_eq!(json["context"], context);
        let frames = json["stack"].as_array().unwrap();
        assert!(!frames.is_empty());
    }

    #[test]
    #[tracing_test::traced_test]
    fn record_server_error() {
        let err = wrap_with(io::Error::other("db down"), ["table", "users"]);
        err.record();
        assert!(logs_contain("ERROR"));
        assert!(logs_contain("db down"));
        assert!(logs_contain("http_code=500"));
    }

    #[test]
    #[tracing_test::traced_test]
    fn record_client_error() {
        let err = wrap(io::Error::other("no such user"));
        err.with_http_code(404).record();
        assert!(logs_contain("WARN"));
        assert!(logs_contain("http_code=404"));
    }

    #[test]
    #[tracing_test::traced_test]
    fn record_redirect_as_info() {
        let err = wrap_with(io::Error::other("moved"), ["location", "/v2/users"]);
        err.with_http_code(302).record();
        assert!(logs_contain("INFO"));
        assert!(logs_contain("moved"));
        assert!(logs_contain("http_code=302"));
        assert!(!logs_contain("WARN"));
        assert!(!logs_contain("ERROR"));
    }
}
