pub mod debouncer;
pub mod messages;
pub mod state;

pub use debouncer::{Trigger, TriggerDebouncer, TriggerState};
pub use messages::{confirm_prompt, opening_message, DEFAULT_GREETING};
pub use state::{ActiveSession, InterventionMachine, InterventionStage, SessionOrigin};
