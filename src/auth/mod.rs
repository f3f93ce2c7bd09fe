//! Authentication: token storage, identity decoding, and the lifecycle
//! manager that keeps an access/refresh token pair fresh.

pub mod authorizer;
pub mod store;
pub mod token;

pub use authorizer::{Authorizer, EXPIRY_MARGIN_SECS};
pub use store::{TokenState, TokenStore};
pub use token::{decode_identity, ParsedIdentity, TokenGrant};
