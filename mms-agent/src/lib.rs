pub mod api;
pub mod mediator;
pub mod modem;
pub mod storage;
pub mod transport;

pub use api::*;
pub use mediator::{Mediator, MediatorHandle, ModemEventSenders, ModemEvents};
pub use modem::Modem;
pub use storage::FsStorage;
pub use transport::HttpTransport;
