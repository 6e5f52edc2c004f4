mod context;
mod controller;
mod state;

pub use context::{SessionContext, TestSession};
pub use controller::{FlushReport, Proceeded, SessionController, Warning, flush_buffered};
pub use state::{Event, Phase, ProgressRecord, SessionMachine, Transition};
