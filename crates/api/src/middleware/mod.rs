pub mod origin;
pub mod rate_limit;
pub mod security_headers;
pub mod session;

pub use origin::{enforce_trusted_origin, OriginPolicy};
pub use rate_limit::rate_limit_login;
pub use security_headers::security_headers;
pub use session::{load_session, CurrentSession};
