pub mod controller;
pub mod state;

pub use controller::MirrorController;
pub use state::{
    FocusStatus, FocusTimer, FocusTransition, PowerPhase, PowerTransition, SessionState, ViewMode,
};
