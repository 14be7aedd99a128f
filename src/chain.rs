use std::error::Error as StdError;

/// Iterator over an annotated error and its chain of source errors.
///
/// This type is the iterator returned by [`Error::chain`].
///
/// [`Error::chain`]: crate::Error::chain
///
/// # Example
///
/// ```
/// use std::io;
///
/// fn underlying_io_error_kind(error: &erroneous::Error) -> Option<io::ErrorKind> {
///     error
///         .chain()
///         .find_map(|cause| cause.downcast_ref::<io::Error>())
///         .map(io::Error::kind)
/// }
///
/// let err = erroneous::wrap(io::Error::from(io::ErrorKind::NotFound));
/// assert_eq!(underlying_io_error_kind(&err), Some(io::ErrorKind::NotFound));
/// ```
#[derive(Debug, Clone)]
pub struct Chain<'a> {
    next: Option<&'a (dyn StdError + 'static)>,
}

impl<'a> Chain<'a> {
    pub(crate) fn new(head: &'a (dyn StdError + 'static)) -> Self {
        Self { next: Some(head) }
    }
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a (dyn StdError + 'static);

    fn next(&mut self) -> Option<Self::Item> {
        let error = self.next?;
        self.next = error.source();
        Some(error)
    }
}

impl std::iter::FusedIterator for Chain<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fmt, io};

    #[derive(Debug)]
    struct Outer(io::Error);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "outer")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn chain_walks_sources() {
        let err = Outer(io::Error::other("inner"));
        let messages: Vec<String> = Chain::new(&err).map(ToString::to_string).collect();
        assert_eq!(messages, ["outer", "inner"]);
    }

    #[test]
    fn chain_of_leaf_has_one_item() {
        let err = io::Error::other("leaf");
        assert_eq!(Chain::new(&err).count(), 1);
    }
}
