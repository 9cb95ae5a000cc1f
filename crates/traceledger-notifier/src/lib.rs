pub mod protocol;
pub mod registry;
pub mod rooms;
pub mod service;
pub mod sessions;
pub mod ws;

pub use protocol::{ClientMessage, ServerMessage};
pub use registry::{EventKind, JoinResult, NotifierRegistry};
pub use rooms::{Filters, Room};
pub use service::NotifierService;
pub use sessions::Session;
pub use ws::{ws_handler, NotifierState};
