pub mod cookie_service;
pub mod jwt_service;
pub mod session_cache;
pub mod token_service;

pub use cookie_service::CookieService;
pub use jwt_service::TokenCodec;
pub use session_cache::SessionCache;
pub use token_service::{Credentials, TokenService};
