use serde::{Deserialize, Serialize};

/// One translation rendered beneath the primary verse text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub language: String,
    pub text: String,
}

impl Translation {
    pub fn new(language: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            text: text.into(),
        }
    }
}

/// Verse payload owned by a script item: the text block the external
/// renderer turns into an overlay bitmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseBlock {
    pub chapter: u32,
    pub verse: u32,
    pub text: String,
    /// Ordered: rendered top-to-bottom under the primary text.
    pub translations: Vec<Translation>,
}

impl VerseBlock {
    pub fn new(chapter: u32, verse: u32, text: impl Into<String>) -> Self {
        Self {
            chapter,
            verse,
            text: text.into(),
            translations: Vec::new(),
        }
    }

    pub fn with_translation(mut self, translation: Translation) -> Self {
        self.translations.push(translation);
        self
    }

    /// Sort key for script-track ordering.
    pub fn order_key(&self) -> (u32, u32) {
        (self.chapter, self.verse)
    }
}
