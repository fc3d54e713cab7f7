#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod progression;
pub mod sessions;

pub use academy_core::Clock;

pub use app_services::{AcademyServices, ServiceOptions};
pub use error::{AppServicesError, SessionError};
pub use progression::ProgressionStore;
pub use sessions::{PracticeRun, SessionController, SessionSettings};
