//! Wizard navigation: where the user is and where they may go.

pub mod machine;
pub mod state;

pub use machine::NavigationStateMachine;
pub use state::{progress_percentage, NavigationState, HISTORY_LIMIT};
