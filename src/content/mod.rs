//! Scripture content: installed translations and verse text

pub(crate) mod store;
mod types;

pub use store::ContentRepository;
pub use types::{TranslationInfo, Verse, VerseIndex, VerseText};
