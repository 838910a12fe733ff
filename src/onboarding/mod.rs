//! Onboarding wizard — account creation followed by configurable
//! profile-section steps.
//!
//! Each profile section (about me, address, birthdate) is assigned to step 2
//! or 3 by a single persisted configuration. The controller resolves which
//! sections a step shows, validates submissions, and moves users forward
//! through the `OnboardingState` machine until they are complete.

pub mod config;
pub mod controller;
pub mod model;
pub mod resolver;
pub mod routes;
pub mod state;
pub mod validation;

pub use config::{ConfigUpdate, OnboardingConfig, StoredConfig};
pub use controller::{ControllerSettings, OnboardingController};
pub use model::{Address, StepView, UserAccount, UserSummary};
pub use resolver::{Section, SectionSet, sections_for_step};
pub use routes::{OnboardingRouteState, app, onboarding_routes};
pub use state::{OnboardingState, StepGuard};
