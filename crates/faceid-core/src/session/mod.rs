mod controller;
mod events;
mod state;

pub use controller::{SessionController, SessionSettings};
pub use events::{EventLog, LogEntry};
pub use state::{
    AttemptResult, ErrorKind, Operation, RegistrationOutcome, RegistrationReceipt, Rejected,
    SessionError, SessionSnapshot, SessionState, StateTransition,
};
