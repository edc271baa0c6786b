pub mod chat;
pub mod emotion;

pub use chat::{ChatMessage, ChatRole, Transcript};
pub use emotion::{EmotionLabel, EmotionReading, EndpointKind, SensorConfiguration};
