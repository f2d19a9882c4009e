pub mod admin;
pub mod clock;
pub mod session;
pub mod trusted_device;

pub use admin::{AdminSessionStatus, LoginForm, LogoutForm};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use session::SessionData;
pub use trusted_device::TrustedDevice;
