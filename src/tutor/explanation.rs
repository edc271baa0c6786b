use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::InputError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeExample {
    pub title: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    pub title: String,
    pub overview: String,
    pub key_concepts: Vec<String>,
    pub examples: Vec<CodeExample>,
    pub learning_path: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplanationSection {
    Overview,
    KeyConcepts,
    Examples,
    LearningPath,
}

impl ExplanationSection {
    pub const ALL: [ExplanationSection; 4] = [
        ExplanationSection::Overview,
        ExplanationSection::KeyConcepts,
        ExplanationSection::Examples,
        ExplanationSection::LearningPath,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            ExplanationSection::Overview => "overview",
            ExplanationSection::KeyConcepts => "keyConcepts",
            ExplanationSection::Examples => "examples",
            ExplanationSection::LearningPath => "learningPath",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let wanted = raw.trim().to_ascii_lowercase().replace(['-', '_'], "");
        Self::ALL
            .into_iter()
            .find(|section| section.id().to_ascii_lowercase() == wanted)
    }
}

impl Explanation {
    /// Text narrated when `section` is selected.
    pub fn section_text(&self, section: ExplanationSection) -> String {
        match section {
            ExplanationSection::Overview => self.overview.clone(),
            ExplanationSection::KeyConcepts => self.key_concepts.join(". "),
            ExplanationSection::Examples => self
                .examples
                .iter()
                .map(|example| format!("{} {}", example.title, example.code))
                .collect::<Vec<_>>()
                .join(" "),
            ExplanationSection::LearningPath => self.learning_path.join(". "),
        }
    }
}

/// Response body of the explanation service; every field may be missing.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ExplanationPayload {
    title: Option<String>,
    overview: Option<String>,
    key_concepts: Option<Vec<String>>,
    examples: Option<Vec<CodeExample>>,
    learning_path: Option<Vec<String>>,
}

impl ExplanationPayload {
    fn into_explanation(self, topic: &str) -> Explanation {
        let non_empty = |value: Option<String>| value.filter(|s| !s.trim().is_empty());
        Explanation {
            title: non_empty(self.title).unwrap_or_else(|| topic.to_string()),
            overview: non_empty(self.overview)
                .unwrap_or_else(|| "No overview available".to_string()),
            key_concepts: self.key_concepts.unwrap_or_default(),
            examples: self.examples.unwrap_or_default(),
            learning_path: self.learning_path.unwrap_or_default(),
        }
    }
}

pub fn validate_topic(raw: &str) -> Result<&str, InputError> {
    match raw.trim() {
        "" => Err(InputError::EmptyTopic),
        trimmed => Ok(trimmed),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn example(title: &str, code: &str) -> Vec<CodeExample> {
    vec![CodeExample {
        title: title.to_string(),
        code: code.to_string(),
    }]
}

/// Locally synthesised explanation used when the service is unreachable.
pub fn fallback_explanation(topic: &str) -> Explanation {
    match topic.to_lowercase().as_str() {
        "javascript" => Explanation {
            title: "JavaScript Fundamentals".into(),
            overview: "JavaScript is a versatile programming language that powers the modern web. It's used for creating interactive websites and web applications.".into(),
            key_concepts: strings(&[
                "Variables and Data Types",
                "Functions and Scope",
                "Objects and Arrays",
                "DOM Manipulation",
                "Asynchronous Programming",
            ]),
            examples: example(
                "Basic Function",
                "function greet(name) {\n  return `Hello, ${name}!`;\n}\n\nconsole.log(greet('World'));",
            ),
            learning_path: strings(&[
                "Learn basic syntax",
                "Understand functions",
                "Master DOM manipulation",
                "Study async programming",
                "Practice with projects",
            ]),
        },
        "react" => Explanation {
            title: "React Framework".into(),
            overview: "React is a popular JavaScript library for building user interfaces using a component-based architecture.".into(),
            key_concepts: strings(&[
                "Components and Props",
                "State and Lifecycle",
                "Hooks",
                "Virtual DOM",
                "JSX Syntax",
            ]),
            examples: example(
                "Functional Component",
                "function Welcome(props) {\n  return <h1>Hello, {props.name}</h1>;\n}",
            ),
            learning_path: strings(&[
                "Learn JSX syntax",
                "Understand components",
                "Master state management",
                "Learn React hooks",
                "Build applications",
            ]),
        },
        "python" => Explanation {
            title: "Python Programming".into(),
            overview: "Python is a high-level programming language known for its simplicity and readability.".into(),
            key_concepts: strings(&[
                "Variables and Data Types",
                "Control Structures",
                "Functions and Modules",
                "Object-Oriented Programming",
                "File Handling",
            ]),
            examples: example(
                "Basic Function",
                "def greet(name):\n    return f\"Hello, {name}!\"\n\nprint(greet(\"World\"))",
            ),
            learning_path: strings(&[
                "Learn basic syntax",
                "Understand control structures",
                "Master functions",
                "Learn OOP",
                "Practice with projects",
            ]),
        },
        _ => Explanation {
            title: format!("{topic} - Learning Guide"),
            overview: format!(
                "{topic} is an interesting topic to learn about. This guide will help you understand the fundamentals and core concepts."
            ),
            key_concepts: strings(&[
                "Basic principles and fundamentals",
                "Core concepts and terminology",
                "Practical applications",
                "Best practices",
                "Common challenges and solutions",
            ]),
            examples: example(
                "Basic Example",
                &format!("// Basic {topic} example\n// Add your code here\nconsole.log('Hello, {topic}!');"),
            ),
            learning_path: strings(&[
                "Start with fundamentals",
                "Learn core concepts",
                "Practice with examples",
                "Build small projects",
                "Explore advanced topics",
            ]),
        },
    }
}

#[async_trait]
pub trait ExplanationService: Send + Sync {
    async fn explain(&self, topic: &str) -> Result<Explanation>;
}

pub struct HttpExplanationService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpExplanationService {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl ExplanationService for HttpExplanationService {
    async fn explain(&self, topic: &str) -> Result<Explanation> {
        let payload: ExplanationPayload = self
            .client
            .post(format!("{}/explain", self.base_url))
            .json(&serde_json::json!({ "topic": topic }))
            .send()
            .await
            .context("POST /explain failed")?
            .error_for_status()
            .context("POST /explain returned an error status")?
            .json()
            .await
            .context("malformed explanation body")?;
        Ok(payload.into_explanation(topic))
    }
}

/// Never fails: service errors become the local fallback.
pub async fn explain_or_fallback(service: &dyn ExplanationService, topic: &str) -> Explanation {
    match service.explain(topic).await {
        Ok(explanation) => explanation,
        Err(err) => {
            log::warn!("explanation for {topic:?} unavailable, using fallback: {err:#}");
            fallback_explanation(topic)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubHttpServer;

    #[test]
    fn missing_fields_get_defaults() {
        let payload: ExplanationPayload =
            serde_json::from_str(r#"{"keyConcepts": ["Ownership"]}"#).unwrap();
        let explanation = payload.into_explanation("Rust");
        assert_eq!(explanation.title, "Rust");
        assert_eq!(explanation.overview, "No overview available");
        assert_eq!(explanation.key_concepts, vec!["Ownership".to_string()]);
        assert!(explanation.examples.is_empty());
        assert!(explanation.learning_path.is_empty());
    }

    #[test]
    fn built_in_fallbacks_match_case_insensitively() {
        assert_eq!(fallback_explanation("Python").title, "Python Programming");
        assert_eq!(fallback_explanation("REACT").title, "React Framework");
    }

    #[test]
    fn generic_fallback_names_the_topic() {
        let explanation = fallback_explanation("Machine Learning");
        assert_eq!(explanation.title, "Machine Learning - Learning Guide");
        assert!(explanation.overview.starts_with("Machine Learning"));
        assert_eq!(explanation.key_concepts.len(), 5);
    }

    #[test]
    fn section_text_joins_list_sections() {
        let explanation = fallback_explanation("javascript");
        assert!(explanation
            .section_text(ExplanationSection::KeyConcepts)
            .starts_with("Variables and Data Types. Functions and Scope"));
        assert!(explanation
            .section_text(ExplanationSection::Examples)
            .starts_with("Basic Function function greet"));
    }

    #[test]
    fn sections_parse_from_their_ids() {
        assert_eq!(
            ExplanationSection::parse("learning-path"),
            Some(ExplanationSection::LearningPath)
        );
        assert_eq!(
            ExplanationSection::parse("keyConcepts"),
            Some(ExplanationSection::KeyConcepts)
        );
        assert_eq!(ExplanationSection::parse("summary"), None);
    }

    #[test]
    fn blank_topics_are_rejected() {
        assert_eq!(validate_topic(" \t"), Err(InputError::EmptyTopic));
        assert_eq!(validate_topic(" Rust "), Ok("Rust"));
    }

    #[tokio::test]
    async fn http_error_yields_a_fallback_naming_the_topic() {
        let server = StubHttpServer::start()
            .await
            .route("/explain", 500, r#"{"detail": "GROQ_API_KEY not configured"}"#);
        let service = HttpExplanationService::new(&server.base_url(), Duration::from_secs(2));

        let explanation = explain_or_fallback(&service, "quantum computing").await;
        assert!(explanation.title.contains("quantum computing"));
        assert!(!explanation.overview.is_empty());
    }

    #[tokio::test]
    async fn partial_response_is_filled_in() {
        let server = StubHttpServer::start()
            .await
            .route("/explain", 200, r#"{"overview": "Tiny particles."}"#);
        let service = HttpExplanationService::new(&server.base_url(), Duration::from_secs(2));

        let explanation = explain_or_fallback(&service, "physics").await;
        assert_eq!(explanation.title, "physics");
        assert_eq!(explanation.overview, "Tiny particles.");
    }
}
