//! Client core for the conference hub: configuration, sign-in, live store
//! adapters and the view controller that ties them together.

pub mod admin;
pub mod auth;
pub mod config;
pub mod content;
pub mod controller;
pub mod error;
pub mod feedback;
pub mod profile;
pub mod schedule;
pub mod schedule_admin;
pub mod subscription;

pub use admin::AdminFlag;
pub use auth::{mint_token, sign_in, AuthError, AuthProvider, LocalAuth};
pub use config::{load_settings_from, HubConfig, StoreConfig};
pub use controller::{bootstrap, FeedbackDraft, Header, HubEvent, HubState, Readiness, ViewController};
pub use error::{ErrorClass, HubError, ValidationError};
pub use feedback::FeedbackSink;
pub use profile::{ProfileStore, RsvpChange};
pub use schedule::SessionStore;
pub use schedule_admin::{Prompter, ScheduleAdmin, SessionForm};
pub use subscription::Subscription;

#[cfg(test)]
#[path = "tests/support.rs"]
mod tests_support;
