use crate::models::EmotionLabel;

pub const DEFAULT_GREETING: &str =
    "Hi! I'm here to help optimize your learning experience. How can I assist you today?";

/// Suggested follow-up for a fresh emotion-triggered session.
pub const DEFAULT_INTERVENTION_PROMPT: &str = "Explain this concept in a different way.";

/// First assistant message of a session.
pub fn opening_message(label: Option<EmotionLabel>) -> &'static str {
    match label {
        Some(EmotionLabel::Confused) => {
            "I noticed you seem confused. Would you like me to explain this concept differently or provide additional examples?"
        }
        Some(EmotionLabel::Frustrated) => {
            "You seem frustrated. Let's take a step back. Would you like a quick breathing exercise or shall I break this down into smaller parts?"
        }
        Some(EmotionLabel::Sleepy) => {
            "Feeling a bit drowsy? Let's energize your learning! How about a quick interactive quiz or a short break?"
        }
        Some(EmotionLabel::Bored) => {
            "I can see you might be losing interest. Let's make this more engaging! Want to try a hands-on simulation?"
        }
        Some(EmotionLabel::Unknown) => {
            "I'm here to help optimize your learning experience. How can I assist you today?"
        }
        _ => DEFAULT_GREETING,
    }
}

pub fn confirm_prompt(label: EmotionLabel) -> &'static str {
    match label {
        EmotionLabel::Confused => "You seem confused. Want to open AI Assistant?",
        EmotionLabel::Frustrated => "You seem frustrated. Want to open AI Assistant?",
        EmotionLabel::Sleepy => "Feeling sleepy? Need a quick quiz or break?",
        EmotionLabel::Bored => "Losing interest? Want something more engaging?",
        EmotionLabel::Unknown => "Need help? Want to chat with AI Assistant?",
        _ => "Want to chat with the AI Assistant?",
    }
}
