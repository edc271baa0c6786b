pub mod engine;
pub mod pacing;
pub mod speech;
pub mod voice;

pub use engine::{NarrationEngine, NarrationJob, NarrationSnapshot};
pub use pacing::reveal_delay;
pub use speech::{CommandSpeech, SilentSpeech, SpeechSynthesizer, Utterance};
pub use voice::{select_voice, Voice, VoiceCache, VoicePreference};
