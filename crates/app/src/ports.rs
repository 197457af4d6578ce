//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the kernel and the adapter
//! layer can depend on them without creating circular dependencies.

pub mod broadcaster;
pub mod event_bus;
pub mod storage;
pub mod transport;
pub mod unit_of_work;

pub use broadcaster::Broadcaster;
pub use event_bus::EventPublisher;
pub use storage::DeviceRepository;
pub use transport::{BusTransport, InboundMessage};
pub use unit_of_work::UnitOfWork;
