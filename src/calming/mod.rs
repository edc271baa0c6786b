pub mod quotes;
pub mod state;

pub use quotes::{QuoteBook, QuoteError, CALMING_QUOTES};
pub use state::{BreathingState, BreathingStatus};
