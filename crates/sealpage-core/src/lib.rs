pub mod config;
pub mod error;
pub mod page;
pub mod session;

pub use error::{SealError, SealResult};
pub use page::{extract_payload, render_locked_page, LockOptions, LockedPayload};
pub use session::{PageUnlocker, Renderer, UnlockOutcome};
