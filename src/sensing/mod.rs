pub mod backend;
pub mod controller;
pub mod history;
pub mod loop_worker;
pub mod source;

pub use backend::{EmotionBackend, HttpEmotionBackend, SensorKind};
pub use controller::SensingController;
pub use history::{summarize, EmotionRecord, MoodSummary};
pub use loop_worker::{PollTiming, PolledReading};
pub use source::EmotionSource;
