//! Socket objects: lifecycle state, receive/accept queues and ephemeral
//! port allocation. Protocol state machines (UDP demux, TCP handshake and
//! retransmission) are external collaborators that drive these objects
//! through [`Socket`]'s queue and notifier API.

mod accept;
mod options;
mod ports;
mod queue;
mod socket;
mod table;

pub use accept::{AcceptQueue, AcceptedConnection, PendingConnection};
pub use options::{SocketFlags, SocketOptions};
pub use ports::EphemeralPortAllocator;
pub use queue::BoundedQueue;
pub use socket::{Socket, SocketKind, SocketState};
pub use table::{EPHEMERAL_PORTS, SOCKET_TABLE, SlabSocketTable};
