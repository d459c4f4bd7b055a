use crate::core::book::{ArtStyle, ImageRef, SurpriseContent};
use crate::core::error::GenError;
use crate::services::genai::{GenAiBackend, GeminiBackend};
use anyhow::{anyhow, Result};
use serde_json::json;

const PROMPT_ENGINEER_INSTRUCTION: &str = "You are an expert prompt engineer for a generative AI that creates illustrations. Your output is ONLY the final, ready-to-use prompt for the image AI. Do not add any conversational text or explanations around it.";

/// Which of the three fixed illustration-prompt templates to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind<'a> {
    /// Front cover; the title is passed for compositional context only and is
    /// instructed out of the final image.
    Cover { title: &'a str },
    /// A numbered story page illustrating one page text.
    Page { text: &'a str },
    /// The closing "The End" page.
    BackCover,
}

/// Boundary to the remote text and image models. Stateless apart from the
/// held credential; every failure leaves through [`StoryGateway::classify`],
/// so callers never see provider-specific error shapes.
#[derive(Debug)]
pub struct StoryGateway {
    backend: Box<dyn GenAiBackend>,
}

impl StoryGateway {
    pub fn new(backend: Box<dyn GenAiBackend>) -> Self {
        Self { backend }
    }

    /// Builds a Gemini-backed gateway for `api_key`. A blank key is rejected
    /// before any network use is possible.
    pub fn with_key(api_key: &str) -> Result<Self, GenError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(GenError::MissingOrInvalidCredential);
        }
        Ok(Self::new(Box::new(GeminiBackend::new(api_key))))
    }

    /// Normalizes a provider failure into the classified taxonomy.
    fn classify(err: anyhow::Error) -> GenError {
        let message = format!("{:#}", err);
        let lower = message.to_lowercase();
        if lower.contains("api key not valid") {
            GenError::MissingOrInvalidCredential
        } else if lower.contains("429")
            || lower.contains("resource_exhausted")
            || lower.contains("quota")
        {
            GenError::QuotaExceeded
        } else {
            GenError::Generic(message)
        }
    }

    /// Asks the text model for a ready-to-use illustration prompt built from
    /// one of three fixed templates.
    pub async fn generate_image_prompt(
        &self,
        art_style: ArtStyle,
        character: Option<&str>,
        kind: PromptKind<'_>,
    ) -> Result<String, GenError> {
        let character = character.unwrap_or_default();
        let content = match kind {
            PromptKind::Cover { title } => format!(
                "Generate a rich, detailed, and effective prompt for a text-to-image AI. The goal is a beautiful, purely visual children's storybook cover.\n\
                - Art Style: {art_style}.\n\
                - Main Character: {character}.\n\
                - Story Title (for context only, DO NOT include in image): {title}.\n\
                - Scene: The main character should be the central focus, looking friendly and welcoming. The background should be whimsical and hint at the story's world without being too busy.\n\
                - CRITICAL RULE: The prompt you generate must instruct the AI to create a purely visual image with absolutely NO text, words, or letters. Any text is a failure."
            ),
            PromptKind::Page { text } => format!(
                "Generate a rich, detailed, and effective prompt for a text-to-image AI. The goal is a full-page illustration for a children's storybook.\n\
                - Art Style: {art_style}.\n\
                - Main Character: {character}.\n\
                - Scene to Illustrate: {text}.\n\
                - Instructions: Create a prompt that vividly describes the scene, focusing on the character's actions, emotions, and the environment.\n\
                - CRITICAL RULE: The prompt you generate must instruct the AI to create a purely visual image with absolutely NO text, words, or letters. Any text is a failure."
            ),
            PromptKind::BackCover => format!(
                "Generate a rich, detailed, and effective prompt for a text-to-image AI. The goal is the final page of a children's storybook.\n\
                - Art Style: {art_style}.\n\
                - Scene: The image should feature the words \"The End\" in a beautiful, artistic, and easy-to-read font that perfectly matches the '{art_style}' style. The background should be a simple, complementary decorative pattern, also in the same art style.\n\
                - CRITICAL RULE: The prompt you generate must instruct the AI to ONLY include the text \"The End\". No other characters, objects, or words should be present."
            ),
        };

        let text = self
            .backend
            .generate_text(Some(PROMPT_ENGINEER_INSTRUCTION), &content)
            .await
            .map_err(Self::classify)?;
        Ok(text.trim().to_string())
    }

    /// A ≤6-word storybook title. Literal quote characters are stripped even
    /// when the model ignores the instruction.
    pub async fn generate_title(
        &self,
        character: &str,
        story: &[String],
    ) -> Result<String, GenError> {
        let prompt = format!(
            "Generate a short, catchy, and appropriate title for a children's storybook. The main character is: \"{}\". The story is about: \"{}\". The title should be 6 words or less. Do not use quotes in the output.",
            character,
            story.join(" ")
        );

        let text = self
            .backend
            .generate_text(None, &prompt)
            .await
            .map_err(Self::classify)?;
        Ok(text.trim().replace('"', ""))
    }

    /// A random character plus a story split into exactly `page_count` parts,
    /// requested as schema-constrained JSON.
    pub async fn generate_surprise_content(
        &self,
        page_count: usize,
    ) -> Result<SurpriseContent, GenError> {
        let prompt = format!(
            "Generate a creative and whimsical main character description for a children's storybook, and a story for it split into exactly {page_count} parts (one sentence per part). The character should be an animal or a cute creature."
        );
        let schema = json!({
            "type": "OBJECT",
            "properties": {
                "character": {
                    "type": "STRING",
                    "description": "A whimsical description of a main character for a children's storybook. e.g., A tiny, shy gnome with a beard made of moss and a hat shaped like a mushroom."
                },
                "story": {
                    "type": "ARRAY",
                    "description": format!("A story for the character, split into an array of exactly {page_count} sentences."),
                    "items": { "type": "STRING" },
                    "minItems": page_count,
                    "maxItems": page_count
                }
            },
            "required": ["character", "story"]
        });

        let text = self
            .backend
            .generate_json(&prompt, schema)
            .await
            .map_err(Self::classify)?;

        parse_surprise_content(&text, page_count).map_err(Self::classify)
    }

    /// Exactly one 4:3 JPEG illustration for `prompt`.
    pub async fn generate_image(&self, prompt: &str) -> Result<ImageRef, GenError> {
        let bytes = self
            .backend
            .generate_image(prompt)
            .await
            .map_err(Self::classify)?;
        Ok(ImageRef::from_base64(bytes))
    }
}

fn parse_surprise_content(text: &str, page_count: usize) -> Result<SurpriseContent> {
    let clean = strip_code_blocks(text);
    let content: SurpriseContent = serde_json::from_str(&clean)
        .map_err(|e| anyhow!("Failed to parse surprise content: {}. Body: {}", e, clean))?;

    if content.story.len() != page_count {
        return Err(anyhow!(
            "Surprise content returned {} story parts, expected {}",
            content.story.len(),
            page_count
        ));
    }
    Ok(content)
}

/// Removes a surrounding markdown code fence, if the model added one.
pub fn strip_code_blocks(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        let rest = rest.trim_start();
        let rest = rest.strip_suffix("```").unwrap_or(rest);
        return rest.trim().to_string();
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::genai::GenAiBackend;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct MockBackend {
        text_reply: Option<String>,
        json_reply: Option<String>,
        image_reply: Option<String>,
        error: Option<String>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl MockBackend {
        fn text(reply: &str) -> Self {
            Self { text_reply: Some(reply.to_string()), ..Default::default() }
        }

        fn json(reply: &str) -> Self {
            Self { json_reply: Some(reply.to_string()), ..Default::default() }
        }

        fn failing(message: &str) -> Self {
            Self { error: Some(message.to_string()), ..Default::default() }
        }

        fn reply<T>(&self, value: &Option<T>) -> anyhow::Result<T>
        where
            T: Clone,
        {
            if let Some(message) = &self.error {
                return Err(anyhow!("{}", message));
            }
            value.clone().ok_or_else(|| anyhow!("mock: no reply configured"))
        }
    }

    #[async_trait]
    impl GenAiBackend for MockBackend {
        async fn generate_text(&self, _system: Option<&str>, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply(&self.text_reply)
        }

        async fn generate_json(&self, prompt: &str, _schema: serde_json::Value) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply(&self.json_reply)
        }

        async fn generate_image(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply(&self.image_reply)
        }
    }

    fn gateway(backend: MockBackend) -> StoryGateway {
        StoryGateway::new(Box::new(backend))
    }

    #[test]
    fn test_blank_key_is_rejected_before_any_network_use() {
        assert!(matches!(
            StoryGateway::with_key("   "),
            Err(GenError::MissingOrInvalidCredential)
        ));
    }

    #[test]
    fn test_classifier_taxonomy() {
        let cases = [
            ("API key not valid. Please pass a valid API key.", GenError::MissingOrInvalidCredential),
            ("Gemini API error (status 429): rate limited", GenError::QuotaExceeded),
            ("RESOURCE_EXHAUSTED: out of tokens", GenError::QuotaExceeded),
            ("You exceeded your current quota", GenError::QuotaExceeded),
        ];
        for (message, expected) in cases {
            assert_eq!(StoryGateway::classify(anyhow!("{}", message)), expected, "{message}");
        }

        let generic = StoryGateway::classify(anyhow!("connection reset by peer"));
        assert_eq!(generic, GenError::Generic("connection reset by peer".to_string()));
    }

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("json"), "json");
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("  ```json  \n  {}  \n  ```  "), "{}");
    }

    #[tokio::test]
    async fn test_title_strips_quotes_and_whitespace() {
        let gw = gateway(MockBackend::text("  \"Owl's Lantern Night\" \n"));
        let title = gw
            .generate_title("A small owl", &["Owl finds a lantern.".to_string()])
            .await
            .unwrap();
        assert_eq!(title, "Owl's Lantern Night");
        assert!(!title.contains('"'));
    }

    #[tokio::test]
    async fn test_image_prompt_templates_embed_the_right_fields() {
        let style = ArtStyle::BoldLineArt;

        let backend = MockBackend::text("cover prompt");
        let prompts = backend.prompts.clone();
        let gw = gateway(backend);
        gw.generate_image_prompt(style, Some("A small owl"), PromptKind::Cover { title: "Owl Nights" })
            .await
            .unwrap();
        {
            let sent = prompts.lock().unwrap();
            assert!(sent[0].contains("storybook cover"));
            assert!(sent[0].contains("Bold Line Art"));
            assert!(sent[0].contains("A small owl"));
            assert!(sent[0].contains("Owl Nights"));
        }

        let backend = MockBackend::text("page prompt");
        let prompts = backend.prompts.clone();
        let gw = gateway(backend);
        gw.generate_image_prompt(style, Some("A small owl"), PromptKind::Page { text: "Owl lights the path." })
            .await
            .unwrap();
        {
            let sent = prompts.lock().unwrap();
            assert!(sent[0].contains("full-page illustration"));
            assert!(sent[0].contains("Owl lights the path."));
        }

        let backend = MockBackend::text("back prompt");
        let prompts = backend.prompts.clone();
        let gw = gateway(backend);
        gw.generate_image_prompt(style, None, PromptKind::BackCover)
            .await
            .unwrap();
        {
            let sent = prompts.lock().unwrap();
            assert!(sent[0].contains("The End"));
            assert!(sent[0].contains("final page"));
            assert!(sent[0].contains("Bold Line Art"));
        }
    }

    #[tokio::test]
    async fn test_surprise_content_parses_fenced_json() {
        let gw = gateway(MockBackend::json(
            "```json\n{\"character\": \"A shy gnome\", \"story\": [\"One.\", \"Two.\"]}\n```",
        ));
        let content = gw.generate_surprise_content(2).await.unwrap();
        assert_eq!(content.character, "A shy gnome");
        assert_eq!(content.story, vec!["One.", "Two."]);
    }

    #[tokio::test]
    async fn test_surprise_content_rejects_wrong_story_length() {
        let gw = gateway(MockBackend::json(
            "{\"character\": \"A shy gnome\", \"story\": [\"One.\"]}",
        ));
        match gw.generate_surprise_content(3).await {
            Err(GenError::Generic(message)) => assert!(message.contains("expected 3")),
            other => panic!("expected Generic, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_surprise_content_rejects_invalid_json() {
        let gw = gateway(MockBackend::json("not json at all"));
        assert!(matches!(
            gw.generate_surprise_content(2).await,
            Err(GenError::Generic(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_quota_error_classified() {
        let gw = gateway(MockBackend::failing("RESOURCE_EXHAUSTED"));
        assert_eq!(
            gw.generate_image("a prompt").await.unwrap_err(),
            GenError::QuotaExceeded
        );
    }

    #[tokio::test]
    async fn test_provider_invalid_key_error_classified() {
        let gw = gateway(MockBackend::failing(
            "Gemini API error (status 400): API key not valid. Please pass a valid API key.",
        ));
        assert_eq!(
            gw.generate_title("c", &[]).await.unwrap_err(),
            GenError::MissingOrInvalidCredential
        );
    }
}
