pub mod controller;
pub mod events;

pub use controller::{
    CoordinatorDeps, CoordinatorHandle, CoordinatorSnapshot, SPEECH_UNSUPPORTED_NOTICE,
};
pub use events::{CoordinatorUpdate, ShellAction};
