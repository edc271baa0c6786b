pub mod chat;
pub mod explanation;
pub mod video;

use std::fmt;

pub use chat::{detect_mode, ChatAssistant, ChatMode, CompletionService, OpenAiCompatibleClient};
pub use explanation::{
    explain_or_fallback, fallback_explanation, validate_topic, CodeExample, Explanation,
    ExplanationSection, ExplanationService, HttpExplanationService,
};
pub use video::{
    extract_video_id, is_video_url, validate_video_url, OEmbedClient, SummaryStyle, VideoInfo,
    VideoMetadataService, VideoSummarizer,
};

/// Input rejected locally, before any request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    EmptyTopic,
    EmptyMessage,
    EmptyVideoUrl,
    NotAVideoUrl,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            InputError::EmptyTopic => "Please enter a topic to learn about",
            InputError::EmptyMessage => "Please type a message first",
            InputError::EmptyVideoUrl => "Please enter a YouTube URL",
            InputError::NotAVideoUrl => "Please enter a valid YouTube URL",
        };
        f.write_str(message)
    }
}

impl std::error::Error for InputError {}

pub fn validate_message(raw: &str) -> Result<&str, InputError> {
    match raw.trim() {
        "" => Err(InputError::EmptyMessage),
        trimmed => Ok(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_messages_are_rejected() {
        assert_eq!(validate_message("   "), Err(InputError::EmptyMessage));
        assert_eq!(validate_message(" hi "), Ok("hi"));
    }

    #[test]
    fn errors_render_as_inline_messages() {
        assert_eq!(
            InputError::NotAVideoUrl.to_string(),
            "Please enter a valid YouTube URL"
        );
    }
}
