pub mod auth;

pub use auth::{optional_auth, require_admin, require_auth, CurrentUser, Identity, MaybeUser};
