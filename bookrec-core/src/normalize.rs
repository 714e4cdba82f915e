//! Builds the single text blob the vectorizer sees for each item.

use crate::item::ItemRecord;

/// Characters that separate genre tags inside the catalog's genre field.
const GENRE_SEPARATORS: &[char] = &[','];

/// Returns `description + ' ' + genres`, with genre separators turned into spaces.
///
/// Missing fields count as empty text. Pure: the same record always yields the same string.
pub fn normalize(item: &ItemRecord) -> String {
    let description = item.description.as_deref().unwrap_or("");
    let genres = item.genres.as_deref().unwrap_or("").replace(GENRE_SEPARATORS, " ");

    let mut content = String::with_capacity(description.len() + 1 + genres.len());
    content.push_str(description);
    content.push(' ');
    content.push_str(&genres);
    content
}
