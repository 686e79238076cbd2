//! Session lifecycle: credential storage, the auth gateway seam, the
//! proactive refresh timer, and the session state machine that ties them
//! together.

pub mod gateway;
pub mod scheduler;
pub mod session;
pub mod token;

pub use gateway::{AuthGateway, Credentials};
pub use scheduler::RefreshScheduler;
pub use session::{
    SessionController, SessionError, SessionState, DEFAULT_REFRESH_INTERVAL,
};
pub use token::{Credential, TokenHolder, TokenReader};
