//! Renewal core
//!
//! - `round`: one pass over all enabled providers
//! - `state`: schedule state and the published snapshot
//! - `scheduler`: timer loop re-armed from each round's deadline
//! - `refresher`: periodic TGT renewal for keytab logins
//! - `manager`: wires the above together

pub mod manager;
pub mod refresher;
pub mod round;
pub mod scheduler;
pub mod state;

pub use manager::{ManagerConfig, RenewalSettings, ServiceCredentialsManager};
pub use refresher::TicketRefresher;
pub use round::{RoundOutcome, TokenAcquisitionRound};
pub use scheduler::RenewalScheduler;
pub use state::{Phase, PublishedCredentials, ScheduleState};
