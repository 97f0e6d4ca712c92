//! Authentication: access tokens, password hashing and the request
//! extractor for authenticated routes.

mod extractor;
mod jwt;
mod password;

pub use extractor::{AuthUser, INVALID_FORMAT, INVALID_TOKEN, MISSING_HEADER};
pub use jwt::{Claims, JwtManager, DEFAULT_ISSUER};
pub use password::{hash_password, hash_password_blocking, verify_password, verify_password_blocking};
