pub mod activities;
pub mod auth;

pub use activities::{get as get_activity, list as list_activities, update as update_activity};
pub use auth::{authenticate, status};
