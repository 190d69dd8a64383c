pub mod intent;
pub mod link;
pub mod models;
pub mod resolve;
pub mod retry;
pub mod sequencer;
pub mod service;
pub mod validate;

pub use service::{OnboardingService, Resolution, ServiceOptions, StepOutcome};
