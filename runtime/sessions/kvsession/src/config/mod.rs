//! Types related to [`SessionConfig`][crate::SessionConfig].
mod cookie;
mod loader;
mod state;

pub use cookie::SessionCookieConfig;
pub use loader::{ConfigLoader, errors};
pub use state::SessionStateConfig;
