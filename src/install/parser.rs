//! Remote payload parsers
//!
//! Catalog parsing is deliberately lenient: malformed entries and unknown
//! fields are dropped with a warning so one bad catalog row cannot block
//! the whole list. Book-name and chapter parsing is strict; anything that
//! would produce an inconsistent install aborts before a single write.

use serde_json::Value;

use crate::canon;
use crate::content::TranslationInfo;
use crate::error::{Error, Result};

/// Parse the remote catalog. An object without a `translations` array
/// yields an empty catalog; entries missing a required field are skipped.
pub(crate) fn parse_catalog(bytes: &[u8]) -> Result<Vec<TranslationInfo>> {
    let root: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::Format(format!("catalog: {e}")))?;
    let object = root
        .as_object()
        .ok_or_else(|| Error::Format("catalog: not an object".to_string()))?;

    for key in object.keys().filter(|k| *k != "translations") {
        tracing::warn!(field = %key, "unsupported field in catalog");
    }

    let Some(entries) = object.get("translations").and_then(Value::as_array) else {
        tracing::warn!("catalog has no translations array, treating as empty");
        return Ok(Vec::new());
    };

    Ok(entries.iter().filter_map(parse_catalog_entry).collect())
}

fn parse_catalog_entry(entry: &Value) -> Option<TranslationInfo> {
    let fields = entry.as_object()?;
    for key in fields.keys() {
        if !matches!(key.as_str(), "shortName" | "name" | "language" | "size") {
            tracing::warn!(field = %key, "unsupported field in catalog entry");
        }
    }

    let short_name = fields.get("shortName").and_then(Value::as_str);
    let name = fields.get("name").and_then(Value::as_str);
    let language = fields.get("language").and_then(Value::as_str);
    let size = fields.get("size").and_then(Value::as_i64);
    match (short_name, name, language, size) {
        (Some(short_name), Some(name), Some(language), Some(size)) => Some(TranslationInfo {
            short_name: short_name.to_string(),
            name: name.to_string(),
            language: language.to_string(),
            size,
        }),
        _ => {
            tracing::warn!(entry = %entry, "dropping malformed catalog entry");
            None
        }
    }
}

/// Parse the book-names resource: both arrays must hold exactly one name
/// per canonical book.
pub(crate) fn parse_book_names(bytes: &[u8]) -> Result<(Vec<String>, Vec<String>)> {
    let root: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::Format(format!("book names: {e}")))?;
    let object = root
        .as_object()
        .ok_or_else(|| Error::Format("book names: not an object".to_string()))?;

    for key in object.keys() {
        if !matches!(
            key.as_str(),
            "name" | "shortName" | "language" | "bookNames" | "bookShortNames"
        ) {
            tracing::warn!(field = %key, "unsupported field in book names");
        }
    }

    let book_names = string_array(object.get("bookNames"))
        .ok_or_else(|| Error::Format("book names: missing bookNames".to_string()))?;
    let book_short_names = string_array(object.get("bookShortNames"))
        .ok_or_else(|| Error::Format("book names: missing bookShortNames".to_string()))?;
    if book_names.len() != canon::BOOK_COUNT || book_short_names.len() != canon::BOOK_COUNT {
        return Err(Error::Format(format!(
            "book names: {} names / {} short names, expected {}",
            book_names.len(),
            book_short_names.len(),
            canon::BOOK_COUNT
        )));
    }
    Ok((book_names, book_short_names))
}

/// Parse one chapter resource; a missing or empty `verses` array is fatal
/// for the install.
pub(crate) fn parse_chapter(bytes: &[u8]) -> Result<Vec<String>> {
    let root: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::Format(format!("chapter: {e}")))?;
    let object = root
        .as_object()
        .ok_or_else(|| Error::Format("chapter: not an object".to_string()))?;

    for key in object.keys().filter(|k| *k != "verses") {
        tracing::warn!(field = %key, "unsupported field in chapter");
    }

    let verses = string_array(object.get("verses"))
        .ok_or_else(|| Error::Format("chapter: missing verses".to_string()))?;
    if verses.is_empty() {
        return Err(Error::Format("chapter: empty verses array".to_string()));
    }
    Ok(verses)
}

fn string_array(value: Option<&Value>) -> Option<Vec<String>> {
    value?
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}
