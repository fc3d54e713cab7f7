mod controller;
mod settings;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use controller::{PracticeRun, SessionController};
pub use settings::SessionSettings;
