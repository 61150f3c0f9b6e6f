pub mod config;
pub mod prompt;
pub mod report;
pub mod session;

pub use config::{AppConfig, DEFAULT_SERVER_URL};
pub use prompt::{Prompter, RequestInput};
pub use session::{exit_code, run_session, SessionOutcome};
