use crate::core::book::ArtStyle;
use crate::core::error::GenError;

pub const DEFAULT_PAGE_COUNT: usize = 3;
pub const MIN_PAGE_COUNT: usize = 1;
pub const MAX_PAGE_COUNT: usize = 10;

pub const VALIDATION_MESSAGE: &str =
    "Please select an Art Style, describe your Character, and write the story for all pages.";

/// Everything the user supplies before a generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryInputs {
    pub art_style: Option<ArtStyle>,
    pub character: String,
    pub page_texts: Vec<String>,
}

impl Default for StoryInputs {
    fn default() -> Self {
        Self {
            art_style: None,
            character: String::new(),
            page_texts: vec![String::new(); DEFAULT_PAGE_COUNT],
        }
    }
}

impl StoryInputs {
    pub fn page_count(&self) -> usize {
        self.page_texts.len()
    }

    /// Resizes the page-text sequence to exactly `count` entries, preserving
    /// existing texts by position and padding with empty strings. The count is
    /// clamped to the supported range.
    pub fn set_page_count(&mut self, count: usize) {
        let count = count.clamp(MIN_PAGE_COUNT, MAX_PAGE_COUNT);
        self.page_texts.resize(count, String::new());
    }

    /// A run may start only with a style selected, a non-blank character
    /// description and a non-blank text for every page.
    pub fn validate(&self) -> Result<(), GenError> {
        let blank_page = self.page_texts.iter().any(|t| t.trim().is_empty());
        if self.art_style.is_none() || self.character.trim().is_empty() || blank_page {
            return Err(GenError::generic(VALIDATION_MESSAGE));
        }
        Ok(())
    }
}
