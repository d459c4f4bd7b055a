use crate::core::book::{BookCover, GeneratedBook, StoryPage};
use crate::core::error::GenError;
use crate::core::inputs::StoryInputs;
use crate::services::gateway::{PromptKind, StoryGateway};

/// Drives the gateway through the ordered call sequence that produces one
/// storybook: title, cover, each page in ascending order, back cover. Steps
/// are strictly sequential; a snapshot of the partially built book is
/// published after the cover, after every page, and after the back cover.
/// The first failure aborts the remaining steps.
pub struct StorybookPipeline<'a> {
    gateway: &'a StoryGateway,
}

impl<'a> StorybookPipeline<'a> {
    pub fn new(gateway: &'a StoryGateway) -> Self {
        Self { gateway }
    }

    /// Gateway calls a full run performs: one prompt + one image per sheet,
    /// plus the title. Used to size progress reporting.
    pub fn step_count(inputs: &StoryInputs) -> usize {
        inputs.page_count() + 2
    }

    pub async fn run(
        &self,
        inputs: &StoryInputs,
        mut on_snapshot: impl FnMut(&GeneratedBook),
    ) -> Result<GeneratedBook, GenError> {
        inputs.validate()?;
        let art_style = inputs
            .art_style
            .ok_or_else(|| GenError::generic(crate::core::inputs::VALIDATION_MESSAGE))?;
        let character = inputs.character.as_str();

        log::info!("Generating title...");
        let title = self
            .gateway
            .generate_title(character, &inputs.page_texts)
            .await?;

        log::info!("Generating cover illustration...");
        let cover_prompt = self
            .gateway
            .generate_image_prompt(art_style, Some(character), PromptKind::Cover { title: &title })
            .await?;
        let cover_image = self.gateway.generate_image(&cover_prompt).await?;

        let mut book = GeneratedBook {
            cover: Some(BookCover { title, image: cover_image }),
            ..Default::default()
        };
        on_snapshot(&book);

        // Pages run one at a time: publication must follow page order, and a
        // single in-flight request bounds the load on the provider.
        let page_count = inputs.page_count();
        for (index, text) in inputs.page_texts.iter().enumerate() {
            log::info!("Generating page {}/{}...", index + 1, page_count);
            let page_prompt = self
                .gateway
                .generate_image_prompt(art_style, Some(character), PromptKind::Page { text })
                .await?;
            let image = self.gateway.generate_image(&page_prompt).await?;

            book.pages.push(StoryPage {
                page_number: index + 1,
                text: text.clone(),
                image,
            });
            on_snapshot(&book);
        }

        log::info!("Generating back cover...");
        let back_prompt = self
            .gateway
            .generate_image_prompt(art_style, None, PromptKind::BackCover)
            .await?;
        book.back_cover = Some(self.gateway.generate_image(&back_prompt).await?);
        on_snapshot(&book);

        log::info!("Storybook complete: {} pages", book.pages.len());
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::book::ArtStyle;
    use crate::services::genai::GenAiBackend;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    const STUB_IMAGE: &str = "aW1n"; // "img"

    /// Replays fixed responses and records the call order.
    #[derive(Debug, Default)]
    struct ScriptedBackend {
        calls: Arc<Mutex<Vec<String>>>,
        fail_on_image_call: Option<usize>,
        image_calls: Mutex<usize>,
    }

    #[async_trait]
    impl GenAiBackend for ScriptedBackend {
        async fn generate_text(&self, system: Option<&str>, prompt: &str) -> anyhow::Result<String> {
            if system.is_none() {
                self.calls.lock().unwrap().push("title".to_string());
                return Ok("\"The Owl Lantern\"".to_string());
            }
            let kind = if prompt.contains("storybook cover") {
                "prompt:cover"
            } else if prompt.contains("final page") {
                "prompt:back"
            } else {
                "prompt:page"
            };
            self.calls.lock().unwrap().push(kind.to_string());
            Ok(format!("illustration prompt for {}", kind))
        }

        async fn generate_json(&self, _prompt: &str, _schema: serde_json::Value) -> anyhow::Result<String> {
            self.calls.lock().unwrap().push("json".to_string());
            Err(anyhow!("not used by the pipeline"))
        }

        async fn generate_image(&self, _prompt: &str) -> anyhow::Result<String> {
            self.calls.lock().unwrap().push("image".to_string());
            let mut count = self.image_calls.lock().unwrap();
            *count += 1;
            if self.fail_on_image_call == Some(*count) {
                return Err(anyhow!("RESOURCE_EXHAUSTED"));
            }
            Ok(STUB_IMAGE.to_string())
        }
    }

    fn owl_inputs() -> StoryInputs {
        StoryInputs {
            art_style: Some(ArtStyle::BoldLineArt),
            character: "A small owl".to_string(),
            page_texts: vec![
                "Owl finds a lantern.".to_string(),
                "Owl lights the path home.".to_string(),
            ],
        }
    }

    #[tokio::test]
    async fn test_full_run_publishes_snapshots_in_order() {
        let backend = ScriptedBackend::default();
        let calls = backend.calls.clone();
        let gateway = StoryGateway::new(Box::new(backend));

        let mut snapshots: Vec<GeneratedBook> = Vec::new();
        let book = StorybookPipeline::new(&gateway)
            .run(&owl_inputs(), |snapshot| snapshots.push(snapshot.clone()))
            .await
            .unwrap();

        // cover-only, cover+1 page, cover+2 pages, cover+2 pages+back.
        assert_eq!(snapshots.len(), 4);
        assert_eq!(snapshots[0].pages.len(), 0);
        assert!(snapshots[0].cover.is_some());
        assert!(snapshots[0].back_cover.is_none());
        assert_eq!(snapshots[1].pages.len(), 1);
        assert_eq!(snapshots[2].pages.len(), 2);
        assert!(snapshots[2].back_cover.is_none());
        assert_eq!(snapshots[3], book);

        assert!(book.is_complete());
        assert_eq!(book.cover.as_ref().unwrap().title, "The Owl Lantern");
        assert_eq!(book.pages[0].page_number, 1);
        assert_eq!(book.pages[0].text, "Owl finds a lantern.");
        assert_eq!(book.pages[1].page_number, 2);
        assert_eq!(book.pages[1].text, "Owl lights the path home.");

        // Strict call order: no skipped, reordered or interleaved steps.
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "title",
                "prompt:cover",
                "image",
                "prompt:page",
                "image",
                "prompt:page",
                "image",
                "prompt:back",
                "image",
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_inputs_make_zero_gateway_calls() {
        let backend = ScriptedBackend::default();
        let calls = backend.calls.clone();
        let gateway = StoryGateway::new(Box::new(backend));

        let mut inputs = owl_inputs();
        inputs.page_texts[1] = "   ".to_string();

        let mut snapshots = 0usize;
        let result = StorybookPipeline::new(&gateway)
            .run(&inputs, |_| snapshots += 1)
            .await;

        assert!(matches!(result, Err(GenError::Generic(_))));
        assert_eq!(snapshots, 0);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_mid_run_aborts_remaining_steps() {
        // Third image call is page 2 of the owl story.
        let backend = ScriptedBackend {
            fail_on_image_call: Some(3),
            ..Default::default()
        };
        let calls = backend.calls.clone();
        let gateway = StoryGateway::new(Box::new(backend));

        let mut snapshots: Vec<GeneratedBook> = Vec::new();
        let result = StorybookPipeline::new(&gateway)
            .run(&owl_inputs(), |snapshot| snapshots.push(snapshot.clone()))
            .await;

        assert_eq!(result.unwrap_err(), GenError::QuotaExceeded);
        // Cover and page 1 were published before the failure; nothing after.
        assert_eq!(snapshots.len(), 2);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.last().map(String::as_str), Some("image"));
        assert!(!calls.contains(&"prompt:back".to_string()));
    }

    #[test]
    fn test_step_count() {
        assert_eq!(StorybookPipeline::step_count(&owl_inputs()), 4);
    }
}
