/// Build a raw context list of alternating keys and values.
///
/// Every argument is converted into a [`Value`](crate::Value), so keys and
/// values of different types can be mixed freely. The result is meant to be
/// passed to [`wrap_with`](crate::wrap_with) or
/// [`Error::with_context`](crate::Error::with_context), which validate it.
///
/// ```
/// use erroneous::ctx;
///
/// let raw = ctx!["user", "glen", "attempt", 3, "retry", true];
/// assert_eq!(raw.len(), 6);
/// assert_eq!(raw[3], 3);
///
/// let empty = ctx![];
/// assert!(empty.is_empty());
/// ```
#[macro_export]
macro_rules! ctx {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($entry:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($entry)),+]
    };
}
