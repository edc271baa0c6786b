use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::chat::CompletionService;
use super::InputError;

const SUMMARIZER_SYSTEM_PROMPT: &str = "You are an expert educational content analyzer and summarizer. You create clear, structured, and educational summaries of video content.";
pub const INVALID_URL_REPLY: &str = "Please provide a valid YouTube URL.";
pub const SUMMARY_FAILURE_REPLY: &str =
    "Sorry, something went wrong while summarizing the video. Please check the URL and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStyle {
    #[default]
    Summary,
    Notes,
    Quiz,
}

impl SummaryStyle {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "summary" => Some(SummaryStyle::Summary),
            "notes" => Some(SummaryStyle::Notes),
            "quiz" => Some(SummaryStyle::Quiz),
            _ => None,
        }
    }

    fn instructions(&self) -> &'static str {
        match self {
            SummaryStyle::Summary => {
                "Please create a structured summary with:\n1. Main topics covered\n2. Key points and concepts\n3. Important takeaways\n4. Difficulty level assessment\n5. Prerequisites (if any)\n\nMake it easy to understand and well-organized."
            }
            SummaryStyle::Notes => {
                "Please organize the notes with:\n- Main headings and subheadings\n- Key definitions and concepts\n- Important formulas or examples\n- Practice questions or exercises\n- Related topics for further study\n\nFormat it like a proper study guide."
            }
            SummaryStyle::Quiz => {
                "Create 5-7 multiple choice questions that test understanding of the main concepts. Include:\n- Question with 4 options (A, B, C, D)\n- Correct answer\n- Brief explanation of why it's correct\n- Difficulty level for each question\n\nFormat it clearly for easy reading."
            }
        }
    }

    fn heading(&self) -> &'static str {
        match self {
            SummaryStyle::Summary => "Please provide a comprehensive summary of this YouTube video:",
            SummaryStyle::Notes => "Create detailed study notes from this YouTube video:",
            SummaryStyle::Quiz => "Generate a quiz based on this YouTube video:",
        }
    }

    pub fn prompt(&self, info: &VideoInfo) -> String {
        format!(
            "{}\n\nTitle: {}\nDescription: {}\nDuration: {}\nAuthor: {}\n\n{}",
            self.heading(),
            info.title,
            info.description,
            info.duration,
            info.author,
            self.instructions()
        )
    }
}

pub fn is_video_url(text: &str) -> bool {
    text.contains("youtube.com") || text.contains("youtu.be")
}

pub fn validate_video_url(raw: &str) -> Result<&str, InputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(InputError::EmptyVideoUrl)
    } else if !is_video_url(trimmed) {
        Err(InputError::NotAVideoUrl)
    } else {
        Ok(trimmed)
    }
}

fn video_id_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([^&\n?#]+)",
            r"youtube\.com/watch\?.*v=([^&\n?#]+)",
            r"youtube\.com/v/([^&\n?#]+)",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}

pub fn extract_video_id(url: &str) -> Option<&str> {
    video_id_patterns()
        .iter()
        .find_map(|pattern| pattern.captures(url))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoInfo {
    pub title: String,
    pub description: String,
    pub duration: String,
    pub author: String,
}

impl VideoInfo {
    /// Stand-in used when the metadata lookup fails.
    pub fn placeholder() -> Self {
        Self {
            title: "Video Analysis".into(),
            description: "Analyzing video content...".into(),
            duration: "Unknown".into(),
            author: "Unknown".into(),
        }
    }
}

#[async_trait]
pub trait VideoMetadataService: Send + Sync {
    async fn lookup(&self, video_id: &str) -> Result<VideoInfo>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OEmbedPayload {
    title: Option<String>,
    description: Option<String>,
    author_name: Option<String>,
}

/// Video metadata from an oEmbed endpoint. oEmbed reports no duration.
pub struct OEmbedClient {
    endpoint: String,
    client: reqwest::Client,
}

impl OEmbedClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            endpoint: endpoint.to_string(),
            client,
        }
    }
}

#[async_trait]
impl VideoMetadataService for OEmbedClient {
    async fn lookup(&self, video_id: &str) -> Result<VideoInfo> {
        let watch_url = format!("https://www.youtube.com/watch?v={video_id}");
        let payload: OEmbedPayload = self
            .client
            .get(&self.endpoint)
            .query(&[("url", watch_url.as_str()), ("format", "json")])
            .send()
            .await
            .context("oEmbed request failed")?
            .error_for_status()
            .context("oEmbed returned an error status")?
            .json()
            .await
            .context("malformed oEmbed body")?;

        Ok(VideoInfo {
            title: payload.title.unwrap_or_else(|| "Unknown Title".into()),
            description: payload
                .description
                .unwrap_or_else(|| "No description available".into()),
            duration: "Duration not available".into(),
            author: payload.author_name.unwrap_or_else(|| "Unknown Author".into()),
        })
    }
}

#[derive(Clone)]
pub struct VideoSummarizer {
    completion: Arc<dyn CompletionService>,
    metadata: Arc<dyn VideoMetadataService>,
}

impl VideoSummarizer {
    pub fn new(completion: Arc<dyn CompletionService>, metadata: Arc<dyn VideoMetadataService>) -> Self {
        Self {
            completion,
            metadata,
        }
    }

    /// Always yields narration-ready text; failures become fixed replies.
    pub async fn summarize(&self, url: &str, style: SummaryStyle) -> String {
        let Some(video_id) = extract_video_id(url) else {
            return INVALID_URL_REPLY.to_string();
        };

        let info = match self.metadata.lookup(video_id).await {
            Ok(info) => info,
            Err(err) => {
                log::warn!("video metadata for {video_id} unavailable: {err:#}");
                VideoInfo::placeholder()
            }
        };

        match self
            .completion
            .complete(SUMMARIZER_SYSTEM_PROMPT, &style.prompt(&info))
            .await
        {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                log::error!("video summary failed: {err:#}");
                SUMMARY_FAILURE_REPLY.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCompletion, FakeVideoMetadata, StubHttpServer};

    #[test]
    fn extracts_ids_from_common_url_shapes() {
        let cases = [
            ("https://www.youtube.com/watch?v=dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("https://youtu.be/dQw4w9WgXcQ?t=42", "dQw4w9WgXcQ"),
            ("https://www.youtube.com/embed/abc123#start", "abc123"),
            ("https://www.youtube.com/watch?feature=share&v=xyz789", "xyz789"),
            ("https://www.youtube.com/v/legacy01", "legacy01"),
        ];
        for (url, id) in cases {
            assert_eq!(extract_video_id(url), Some(id), "{url}");
        }
        assert_eq!(extract_video_id("https://youtube.com/channel/abc"), None);
    }

    #[test]
    fn url_validation_happens_locally() {
        assert_eq!(validate_video_url("  "), Err(InputError::EmptyVideoUrl));
        assert_eq!(
            validate_video_url("https://vimeo.com/1"),
            Err(InputError::NotAVideoUrl)
        );
        assert!(validate_video_url("https://youtu.be/abc").is_ok());
    }

    #[test]
    fn prompt_carries_the_metadata() {
        let prompt = SummaryStyle::Notes.prompt(&VideoInfo::placeholder());
        assert!(prompt.starts_with("Create detailed study notes"));
        assert!(prompt.contains("Title: Video Analysis"));
    }

    #[tokio::test]
    async fn unrecognised_url_short_circuits() {
        let completion = Arc::new(FakeCompletion::replying("unused"));
        let summarizer = VideoSummarizer::new(completion.clone(), Arc::new(FakeVideoMetadata::failing()));

        let reply = summarizer
            .summarize("https://youtube.com/channel/abc", SummaryStyle::Summary)
            .await;
        assert_eq!(reply, INVALID_URL_REPLY);
        assert!(completion.prompts().is_empty());
    }

    #[tokio::test]
    async fn metadata_failure_uses_the_placeholder() {
        let completion = Arc::new(FakeCompletion::replying("  A summary.  "));
        let summarizer = VideoSummarizer::new(completion.clone(), Arc::new(FakeVideoMetadata::failing()));

        let reply = summarizer
            .summarize("https://youtu.be/abc", SummaryStyle::Quiz)
            .await;
        assert_eq!(reply, "A summary.");
        assert!(completion.prompts()[0].contains("Video Analysis"));
    }

    #[tokio::test]
    async fn completion_failure_becomes_an_apology() {
        let completion = Arc::new(FakeCompletion::failing());
        let metadata = Arc::new(FakeVideoMetadata::returning(VideoInfo::placeholder()));
        let summarizer = VideoSummarizer::new(completion, metadata);

        let reply = summarizer
            .summarize("https://youtu.be/abc", SummaryStyle::Summary)
            .await;
        assert_eq!(reply, SUMMARY_FAILURE_REPLY);
    }

    #[tokio::test]
    async fn oembed_fields_are_mapped() {
        let server = StubHttpServer::start().await.route(
            "/oembed",
            200,
            r#"{"title": "Ownership in Rust", "author_name": "Ferris"}"#,
        );
        let client = OEmbedClient::new(&format!("{}/oembed", server.base_url()), Duration::from_secs(2));

        let info = client.lookup("abc").await.unwrap();
        assert_eq!(info.title, "Ownership in Rust");
        assert_eq!(info.author, "Ferris");
        assert_eq!(info.description, "No description available");
    }
}
