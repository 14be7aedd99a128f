use crate::{
    ERRONEOUS_ERROR_KEY, INVALID_CONTEXT_KEY_NOT_STRING, INVALID_CONTEXT_ODD_LENGTH, Value,
};
use serde::{Serialize, Serializer};
use std::{fmt, ops::Deref, slice, sync::Arc};

/// Ordered, immutable sequence of alternating keys and values
/// attached to an [`Error`](crate::Error).
///
/// Keys are always [`Value::String`]s and the sequence always has an even length.
/// Duplicate keys are allowed: lookups return the first match,
/// later duplicates are shadowed.
///
/// Cloning a [`Context`] is cheap, the entries are shared.
#[derive(Clone, PartialEq)]
pub struct Context {
    entries: Arc<[Value]>,
}

impl Context {
    /// Create an empty [`Context`].
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: Arc::from(Vec::new()),
        }
    }

    /// Validate raw alternating keys and values into a [`Context`].
    ///
    /// The raw sequence must have an even length and every entry at an
    /// even position (0-indexed) must be a string. If not, the whole
    /// sequence is discarded and replaced by a single pair with
    /// [`ERRONEOUS_ERROR_KEY`] as key and a description of the violation
    /// as value. This never fails.
    ///
    /// ```
    /// use erroneous::{ctx, Context};
    ///
    /// let ctx = Context::validate(ctx!["user", "glen", "attempt", 2]);
    /// assert_eq!(ctx.len(), 4);
    ///
    /// let ctx = Context::validate(ctx![14, "key wasn't a string"]);
    /// assert_eq!(ctx[0], "ERRONEOUS_ERROR");
    /// ```
    pub fn validate<C, V>(raw: C) -> Self
    where
        C: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let raw: Vec<Value> = raw.into_iter().map(Into::into).collect();
        if !raw.len().is_multiple_of(2) {
            return Self::invalid(INVALID_CONTEXT_ODD_LENGTH);
        }
        if raw.iter().step_by(2).any(|key| !key.is_string()) {
            return Self::invalid(INVALID_CONTEXT_KEY_NOT_STRING);
        }
        Self {
            entries: Arc::from(raw),
        }
    }

    /// Create a [`Context`] from typed key/value pairs.
    ///
    /// Unlike [`Context::validate`] this can never produce the diagnostic pair.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let entries: Vec<Value> = pairs
            .into_iter()
            .flat_map(|(key, value)| [Value::String(key.into()), value.into()])
            .collect();
        Self {
            entries: Arc::from(entries),
        }
    }

    fn invalid(msg: &'static str) -> Self {
        Self {
            entries: Arc::from(vec![Value::from(ERRONEOUS_ERROR_KEY), Value::from(msg)]),
        }
    }

    /// Returns the value paired with the first occurrence of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.pairs()
            .find_map(|(k, value)| (k == key).then_some(value))
    }

    /// Returns the index of the value paired with the first occurrence of `key`.
    pub(crate) fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .chunks_exact(2)
            .position(|pair| pair[0].as_str() == Some(key))
            .map(|index| index * 2 + 1)
    }

    /// Returns a new [`Context`] with the value at `index` replaced.
    #[must_use]
    pub(crate) fn replaced(&self, index: usize, value: Value) -> Self {
        let mut entries = self.entries.to_vec();
        if let Some(slot) = entries.get_mut(index) {
            *slot = value;
        }
        Self {
            entries: Arc::from(entries),
        }
    }

    /// Returns a new [`Context`] with the entries of `other` appended to these ones.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let entries: Vec<Value> = self
            .entries
            .iter()
            .chain(other.entries.iter())
            .cloned()
            .collect();
        Self {
            entries: Arc::from(entries),
        }
    }

    /// Iterate over the key/value pairs, in insertion order.
    pub fn pairs(&self) -> Pairs<'_> {
        Pairs {
            inner: self.entries.chunks_exact(2),
        }
    }

    /// Returns the raw alternating keys and values.
    #[must_use]
    pub fn as_slice(&self) -> &[Value] {
        &self.entries
    }

    /// Returns true if both contexts share the same entries in memory.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.entries, &b.entries)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::empty()
    }
}

impl Deref for Context {
    type Target = [Value];

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

impl AsRef<[Value]> for Context {
    fn as_ref(&self) -> &[Value] {
        &self.entries
    }
}

impl<'a> IntoIterator for &'a Context {
    type Item = &'a Value;
    type IntoIter = slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.pairs().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match value {
                Value::String(s) => write!(f, "{key}={s:?}")?,
                value => write!(f, "{key}={value}")?,
            }
        }
        Ok(())
    }
}

impl Serialize for Context {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.iter())
    }
}

/// Iterator over the key/value pairs of a [`Context`].
///
/// This type is the iterator returned by [`Context::pairs`].
#[derive(Debug, Clone)]
pub struct Pairs<'a> {
    inner: slice::ChunksExact<'a, Value>,
}

impl<'a> Iterator for Pairs<'a> {
    type Item = (&'a str, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        let pair = self.inner.next()?;
        // keys are strings by construction
        Some((pair[0].as_str().unwrap_or_default(), &pair[1]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Pairs<'_> {}
