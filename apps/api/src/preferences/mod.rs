//! UserJobPreference: saved target jobs, at most one default per user.

pub mod handlers;
pub mod store;

pub use store::{PgPreferenceStore, PreferenceInput, PreferenceStore};
