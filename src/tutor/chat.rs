use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::video::{is_video_url, SummaryStyle, VideoSummarizer};

const TUTOR_SYSTEM_PROMPT: &str =
    "You are a friendly and helpful AI tutor that adapts to different learning needs.";
pub const FAILURE_REPLY: &str = "Sorry, something went wrong while generating the response.";

/// How a chat request is framed for the completion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatMode {
    #[default]
    Default,
    ExplainSimply,
    Story,
    Quiz,
    Resources,
    VideoSummary,
}

impl ChatMode {
    pub const INTERVENTIONS: [ChatMode; 5] = [
        ChatMode::ExplainSimply,
        ChatMode::Story,
        ChatMode::Quiz,
        ChatMode::Resources,
        ChatMode::VideoSummary,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "default" | "simple" => Some(ChatMode::Default),
            "im5" | "eli5" | "explain" => Some(ChatMode::ExplainSimply),
            "story" => Some(ChatMode::Story),
            "quiz" => Some(ChatMode::Quiz),
            "resources" => Some(ChatMode::Resources),
            "youtube" | "video" => Some(ChatMode::VideoSummary),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ChatMode::Default => "simple",
            ChatMode::ExplainSimply => "im5",
            ChatMode::Story => "story",
            ChatMode::Quiz => "quiz",
            ChatMode::Resources => "resources",
            ChatMode::VideoSummary => "youtube",
        }
    }

    pub fn prompt(&self, topic: &str) -> String {
        match self {
            ChatMode::Default => format!(
                "Explain the topic \"{topic}\" in under 140 words for a beginner. Use simple language and examples."
            ),
            ChatMode::ExplainSimply => format!(
                "Explain the topic \"{topic}\" in very simple terms, like you're explaining it to a 5-year-old. Include practical real-world examples."
            ),
            ChatMode::Story => format!(
                "Tell a short, engaging story that explains the topic \"{topic}\" in a relatable way. Make it fun and easy to understand."
            ),
            ChatMode::Quiz => format!(
                "Generate a short quiz (3-5 questions) for the topic \"{topic}\". Include multiple choice options and the correct answers."
            ),
            ChatMode::Resources => format!(
                "Provide curated study resources for \"{topic}\", such as PDF guides, roadmaps, YouTube video links, and helpful articles. Group them by Beginner, Intermediate, and Advanced."
            ),
            ChatMode::VideoSummary => "I notice you mentioned YouTube. Please provide a YouTube video URL that you'd like me to summarize. I can create summaries, study notes, or quizzes from educational videos.".to_string(),
        }
    }
}

/// Free text containing a video link is summarised instead of explained.
pub fn detect_mode(text: &str) -> ChatMode {
    if is_video_url(text) {
        ChatMode::VideoSummary
    } else {
        ChatMode::Default
    }
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [RequestMessage<'a>; 2],
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompatibleClient {
    api_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn new(api_url: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_url: api_url.to_string(),
            model: model.to_string(),
            api_key: api_key.map(|key| key.trim().to_string()).filter(|key| !key.is_empty()),
            client,
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiCompatibleClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let Some(api_key) = &self.api_key else {
            bail!("no API key configured for the completion service");
        };

        let body = CompletionRequest {
            model: &self.model,
            messages: [
                RequestMessage {
                    role: "system",
                    content: system,
                },
                RequestMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response: CompletionResponse = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("completion request failed")?
            .error_for_status()
            .context("completion service returned an error status")?
            .json()
            .await
            .context("malformed completion body")?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("completion response had no choices"))?;
        Ok(content.trim().to_string())
    }
}

/// Answers chat input in a given mode. Every call yields narration-ready
/// text; service failures become [`FAILURE_REPLY`].
#[derive(Clone)]
pub struct ChatAssistant {
    completion: std::sync::Arc<dyn CompletionService>,
    videos: VideoSummarizer,
}

impl ChatAssistant {
    pub fn new(completion: std::sync::Arc<dyn CompletionService>, videos: VideoSummarizer) -> Self {
        Self { completion, videos }
    }

    pub async fn reply(&self, mode: ChatMode, input: &str) -> String {
        if mode == ChatMode::VideoSummary && is_video_url(input) {
            return self.videos.summarize(input, SummaryStyle::Summary).await;
        }

        match self
            .completion
            .complete(TUTOR_SYSTEM_PROMPT, &mode.prompt(input))
            .await
        {
            Ok(text) => text,
            Err(err) => {
                log::error!("{} completion failed: {err:#}", mode.tag());
                FAILURE_REPLY.to_string()
            }
        }
    }
}
