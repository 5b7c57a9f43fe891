pub mod api;
pub mod model;
pub mod poller;
pub mod publisher;
pub mod scheduler;
pub mod session;

pub use api::{Client, Error};
pub use poller::{Credentials, Poller};
pub use publisher::{MemorySink, Sink};
pub use scheduler::Scheduler;
pub use session::{FileTokenStore, MemoryTokenStore, Session, TokenStore};

/// Timer driving `Poller::update_readings`.
pub const READINGS_TIMER: &str = "UpdateData";
/// Timer driving `Poller::update_tariff`.
pub const TARIFF_TIMER: &str = "UpdateTariffData";
/// Fixed cadence of the tariff update.
pub const TARIFF_INTERVAL_SECS: u64 = 60;
