use crate::core::book::{GeneratedBook, Sheet};
use anyhow::{anyhow, bail, Result};
use epub_builder::{EpubBuilder, EpubContent, ZipLibrary};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_EXPORT_NAME: &str = "My_Storybook";

// Landscape 4:3 sheet, matching the generated illustrations.
const SHEET_WIDTH: u32 = 800;
const SHEET_HEIGHT: u32 = 600;

/// Filename stem derived from the book title: word characters kept,
/// everything else dropped, whitespace runs collapsed to underscores.
pub fn sanitize_title(title: &str) -> String {
    let stripped: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    let joined = stripped.split_whitespace().collect::<Vec<_>>().join("_");
    if joined.is_empty() {
        DEFAULT_EXPORT_NAME.to_string()
    } else {
        joined
    }
}

pub fn export_filename(book: &GeneratedBook) -> String {
    let title = book.cover.as_ref().map(|c| c.title.as_str()).unwrap_or("");
    format!("{}.epub", sanitize_title(title))
}

fn assembly_err<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow!("EPUB assembly failed: {}", e)
}

fn sheet_xhtml(page_title: &str, body: &str) -> String {
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<!DOCTYPE html>\n",
            "<html xmlns=\"http://www.w3.org/1999/xhtml\">\n",
            "<head>\n",
            "<title>{title}</title>\n",
            "<style type=\"text/css\">\n",
            "body {{ width: {w}px; height: {h}px; margin: 0; text-align: center; font-family: serif; }}\n",
            "img {{ max-width: {w}px; max-height: {h}px; }}\n",
            "p {{ margin: 12px 24px; }}\n",
            "</style>\n",
            "</head>\n",
            "<body>\n{body}</body>\n",
            "</html>\n",
        ),
        title = page_title,
        w = SHEET_WIDTH,
        h = SHEET_HEIGHT,
        body = body,
    )
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Assembles the finished book into an EPUB: cover sheet, one sheet per story
/// page, back-cover sheet and a fixed closing page, in reading order.
pub fn write_epub(book: &GeneratedBook, out: &mut impl Write) -> Result<()> {
    if !book.is_complete() {
        bail!("Cannot export without a fully generated storybook");
    }

    let title = book
        .cover
        .as_ref()
        .map(|c| c.title.clone())
        .unwrap_or_default();

    let mut builder = EpubBuilder::new(ZipLibrary::new().map_err(assembly_err)?)
        .map_err(assembly_err)?;
    builder.metadata("title", title.as_str()).map_err(assembly_err)?;
    builder.metadata("generator", "story2book").map_err(assembly_err)?;

    for sheet in book.sheets() {
        match sheet {
            Sheet::Cover(cover) => {
                let bytes = cover.image.to_bytes()?;
                builder
                    .add_resource("images/cover.jpg", bytes.as_slice(), "image/jpeg")
                    .map_err(assembly_err)?;
                let markup = sheet_xhtml(
                    &escape_text(&cover.title),
                    &format!(
                        "<h1>{}</h1>\n<img src=\"images/cover.jpg\" alt=\"Storybook cover\"/>\n",
                        escape_text(&cover.title)
                    ),
                );
                builder
                    .add_content(EpubContent::new("cover.xhtml", markup.as_bytes()).title("Cover"))
                    .map_err(assembly_err)?;
            }
            Sheet::Page(page) => {
                let image_href = format!("images/page_{:02}.jpg", page.page_number);
                let bytes = page.image.to_bytes()?;
                builder
                    .add_resource(&image_href, bytes.as_slice(), "image/jpeg")
                    .map_err(assembly_err)?;
                let page_title = format!("Page {}", page.page_number);
                let markup = sheet_xhtml(
                    &page_title,
                    &format!(
                        "<img src=\"{}\" alt=\"Illustration for page {}\"/>\n<p>{}</p>\n",
                        image_href,
                        page.page_number,
                        escape_text(&page.text)
                    ),
                );
                builder
                    .add_content(
                        EpubContent::new(format!("page_{:02}.xhtml", page.page_number), markup.as_bytes())
                            .title(page_title),
                    )
                    .map_err(assembly_err)?;
            }
            Sheet::BackCover(image) => {
                let bytes = image.to_bytes()?;
                builder
                    .add_resource("images/back_cover.jpg", bytes.as_slice(), "image/jpeg")
                    .map_err(assembly_err)?;
                let markup = sheet_xhtml(
                    "The End",
                    "<img src=\"images/back_cover.jpg\" alt=\"Back cover\"/>\n",
                );
                builder
                    .add_content(
                        EpubContent::new("back_cover.xhtml", markup.as_bytes()).title("The End"),
                    )
                    .map_err(assembly_err)?;
            }
        }
    }

    let closing = sheet_xhtml(
        "About this book",
        &format!(
            "<p>{}</p>\n<p>Illustrated with Google's Gemini 2.5 Flash and Imagen 3 models.</p>\n",
            escape_text(&title)
        ),
    );
    builder
        .add_content(EpubContent::new("about.xhtml", closing.as_bytes()).title("About this book"))
        .map_err(assembly_err)?;

    builder.generate(out).map_err(assembly_err)?;
    Ok(())
}

/// Writes `<sanitized-title>.epub` into `dir` and returns the full path.
pub fn export_to_dir(book: &GeneratedBook, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(export_filename(book));
    let mut file = std::fs::File::create(&path)?;
    write_epub(book, &mut file)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::book::{BookCover, ImageRef, StoryPage};

    fn complete_book() -> GeneratedBook {
        let image = || ImageRef::from_base64("SkZJRg==");
        GeneratedBook {
            cover: Some(BookCover { title: "Owl's Lantern Night!".to_string(), image: image() }),
            pages: vec![
                StoryPage { page_number: 1, text: "Owl finds a lantern.".to_string(), image: image() },
                StoryPage { page_number: 2, text: "Owl lights the path home.".to_string(), image: image() },
            ],
            back_cover: Some(image()),
        }
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Owl's Lantern Night!"), "Owls_Lantern_Night");
        assert_eq!(sanitize_title("  The   Brave  Snail "), "The_Brave_Snail");
        assert_eq!(sanitize_title("under_score kept"), "under_score_kept");
        assert_eq!(sanitize_title("?!*"), DEFAULT_EXPORT_NAME);
        assert_eq!(sanitize_title(""), DEFAULT_EXPORT_NAME);
    }

    #[test]
    fn test_export_filename() {
        assert_eq!(export_filename(&complete_book()), "Owls_Lantern_Night.epub");
        assert_eq!(export_filename(&GeneratedBook::default()), "My_Storybook.epub");
    }

    #[test]
    fn test_write_epub_produces_archive() {
        let mut out: Vec<u8> = Vec::new();
        write_epub(&complete_book(), &mut out).unwrap();
        // An EPUB is a zip container.
        assert!(out.starts_with(b"PK"));
    }

    #[test]
    fn test_write_epub_refuses_incomplete_book() {
        let mut book = complete_book();
        book.back_cover = None;

        let mut out: Vec<u8> = Vec::new();
        assert!(write_epub(&book, &mut out).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_export_to_dir_names_file_from_title() {
        let dir = tempfile::tempdir().unwrap();
        let path = export_to_dir(&complete_book(), dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "Owls_Lantern_Night.epub");
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}
