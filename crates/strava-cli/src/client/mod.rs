pub mod api;
pub mod oauth;
pub mod tokens;

pub use api::{ActivityQuery, StravaClient};
pub use oauth::{StravaOAuthClient, TokenRefresher};
pub use tokens::{Credentials, REFRESH_MARGIN_SECS};
