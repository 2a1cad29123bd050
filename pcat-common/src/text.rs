//! Text folding shared by classification and search
//!
//! Keyword matching and free-text search compare lowercase, accent-free text,
//! so "PISTÃO", "pistão" and "pistao" all fold to the same key.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};

/// Separator of tag lists in CSV files
pub const TAG_DELIMITER: char = ';';

/// Fold a string to lowercase with diacritics removed
///
/// # Examples
/// ```
/// use pcat_common::text::fold;
///
/// assert_eq!(fold("Cabeçote"), "cabecote");
/// assert_eq!(fold("PÁ-CARREGADEIRA"), "pa-carregadeira");
/// ```
pub fn fold(input: &str) -> String {
    input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether `haystack` contains `needle` after folding both
pub fn folded_contains(haystack: &str, needle: &str) -> bool {
    fold(haystack).contains(&fold(needle))
}

/// Split a `;`-delimited tag list, trimming and dropping empties
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(TAG_DELIMITER)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reject tag names that could not survive a CSV export
pub fn check_tag_names<I, T>(tags: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    match tags
        .into_iter()
        .find(|t| t.as_ref().contains(TAG_DELIMITER))
    {
        Some(tag) => Err(Error::InvalidInput(format!(
            "tag '{}' must not contain '{}'",
            tag.as_ref(),
            TAG_DELIMITER
        ))),
        None => Ok(()),
    }
}
