//! # Utility Functions Module
//!
//! Helpers for building external command argument lists.

/// Converts an iterable of string-like items to `Vec<String>`.
///
/// # Example
/// ```rust
/// use video_batch_converter::utils::to_string_vec;
///
/// let args = to_string_vec(["-map", "0", "-c", "copy"]);
/// assert_eq!(args.len(), 4);
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Build a `Vec<String>` from items of any `Display` type.
///
/// Unlike [`to_string_vec`], items may have different types.
///
/// # Example
/// ```rust
/// use video_batch_converter::args;
///
/// let stream = 0;
/// let args = args!["-map", stream, "-c:v", "libx265"];
/// assert_eq!(args, vec!["-map", "0", "-c:v", "libx265"]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        vec![$(::std::string::ToString::to_string(&$item)),*]
    };
}
