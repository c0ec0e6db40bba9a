//! Per-verse user annotations
//!
//! Bookmarks, highlights, and notes share one generic repository; the kinds
//! differ only in payload shape and the events they publish.

mod store;
mod types;

pub use store::{AnnotationRepository, BookmarkRepository, HighlightRepository, NoteRepository};
pub use types::{
    AnnotationKind, Bookmark, BookmarkKind, Highlight, HighlightColor, HighlightKind, Note,
    NoteKind, SortOrder, VerseAnnotation,
};
