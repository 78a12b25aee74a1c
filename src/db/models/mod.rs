pub mod session;

pub use session::{FocusSession, SessionPatch};
