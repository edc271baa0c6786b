pub mod logging;
pub mod timer;

pub use timer::TimerSlot;
