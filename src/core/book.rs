use anyhow::Result;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::Rng;
use serde::Deserialize;
use std::fmt;

/// The fixed set of illustration styles offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtStyle {
    WatercolorAndInk,
    ChildrensCrayonDrawing,
    VibrantDigitalArt,
    SoftPastel,
    ClassicPenAndInk,
    WhimsicalGouache,
    BoldLineArt,
    NostalgicTones,
    MixedMediaCollage,
}

impl ArtStyle {
    pub const ALL: [ArtStyle; 9] = [
        ArtStyle::WatercolorAndInk,
        ArtStyle::ChildrensCrayonDrawing,
        ArtStyle::VibrantDigitalArt,
        ArtStyle::SoftPastel,
        ArtStyle::ClassicPenAndInk,
        ArtStyle::WhimsicalGouache,
        ArtStyle::BoldLineArt,
        ArtStyle::NostalgicTones,
        ArtStyle::MixedMediaCollage,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ArtStyle::WatercolorAndInk => "Watercolor and Ink",
            ArtStyle::ChildrensCrayonDrawing => "Children's Crayon Drawing",
            ArtStyle::VibrantDigitalArt => "Vibrant Digital Art",
            ArtStyle::SoftPastel => "Soft Pastel",
            ArtStyle::ClassicPenAndInk => "Classic Pen and Ink",
            ArtStyle::WhimsicalGouache => "Whimsical Gouache",
            ArtStyle::BoldLineArt => "Bold Line Art",
            ArtStyle::NostalgicTones => "Nostalgic Tones",
            ArtStyle::MixedMediaCollage => "Mixed Media Collage",
        }
    }

    pub fn from_name(name: &str) -> Option<ArtStyle> {
        ArtStyle::ALL.iter().copied().find(|s| s.name() == name)
    }

    /// Uniform pick over the full set, used by "Surprise Me".
    pub fn random() -> ArtStyle {
        ArtStyle::ALL[rand::rng().random_range(0..ArtStyle::ALL.len())]
    }
}

impl fmt::Display for ArtStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A generated illustration, kept as the provider's base64 JPEG payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    base64: String,
}

impl ImageRef {
    pub fn from_base64(base64: impl Into<String>) -> Self {
        Self { base64: base64.into() }
    }

    /// `data:` URL for direct display in an `<img>` element.
    pub fn as_data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", self.base64)
    }

    /// Raw JPEG bytes, for export.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(BASE64.decode(self.base64.as_bytes())?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookCover {
    pub title: String,
    pub image: ImageRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryPage {
    /// 1-based, matches the position of the source text at generation time.
    pub page_number: usize,
    pub text: String,
    pub image: ImageRef,
}

/// The storybook under construction. Every part stays absent until its
/// generation step completes, so a partially built book is always a valid
/// prefix of the finished one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedBook {
    pub cover: Option<BookCover>,
    pub pages: Vec<StoryPage>,
    pub back_cover: Option<ImageRef>,
}

/// One displayable sheet of the book, in reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sheet<'a> {
    Cover(&'a BookCover),
    Page(&'a StoryPage),
    BackCover(&'a ImageRef),
}

impl GeneratedBook {
    pub fn clear(&mut self) {
        self.cover = None;
        self.pages.clear();
        self.back_cover = None;
    }

    pub fn is_empty(&self) -> bool {
        self.cover.is_none() && self.pages.is_empty() && self.back_cover.is_none()
    }

    /// A book is complete once the cover, every page and the back cover are in.
    pub fn is_complete(&self) -> bool {
        self.cover.is_some() && !self.pages.is_empty() && self.back_cover.is_some()
    }

    /// Ordered sheet sequence {cover?, page 1..N, back cover?} consumed by the
    /// viewer and the exporter.
    pub fn sheets(&self) -> Vec<Sheet<'_>> {
        let mut sheets = Vec::with_capacity(self.pages.len() + 2);
        if let Some(cover) = &self.cover {
            sheets.push(Sheet::Cover(cover));
        }
        for page in &self.pages {
            sheets.push(Sheet::Page(page));
        }
        if let Some(back) = &self.back_cover {
            sheets.push(Sheet::BackCover(back));
        }
        sheets
    }
}

/// Structured "Surprise Me" result returned by the text model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SurpriseContent {
    pub character: String,
    pub story: Vec<String>,
}
