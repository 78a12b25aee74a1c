pub mod controller;
pub mod state;

pub use controller::FocusController;
pub use state::{FocusState, FocusStatus};
