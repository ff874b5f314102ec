pub mod connection;
pub mod conversation;
pub mod message;
pub mod support_ticket;

pub use connection::*;
pub use conversation::*;
pub use message::*;
pub use support_ticket::*;
