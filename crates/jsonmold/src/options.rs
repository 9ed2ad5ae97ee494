/// Configuration for the chunk buffer and tokenizer used by a
/// [`Materializer`](crate::Materializer).
///
/// # Examples
///
/// ```rust
/// use jsonmold::{Materializer, ReaderOptions, Registry};
///
/// let options = ReaderOptions {
///     buffer_capacity: 256,
///     ..Default::default()
/// };
/// let materializer = Materializer::with_options(Registry::new(), options);
/// assert_eq!(materializer.options().max_depth, 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReaderOptions {
    /// Initial size in bytes of the buffer that reader sources fill.
    ///
    /// The buffer doubles whenever a single token does not fit, so this only
    /// bounds the first allocation. Values below one are treated as one.
    ///
    /// # Default
    ///
    /// `4096`
    pub buffer_capacity: usize,

    /// Maximum nesting of objects and arrays.
    ///
    /// Opening a container deeper than this is a syntax error.
    ///
    /// # Default
    ///
    /// `64`
    pub max_depth: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            buffer_capacity: 4096,
            max_depth: 64,
        }
    }
}
