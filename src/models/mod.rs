pub mod jwt;
pub mod revocation;
pub mod user;
