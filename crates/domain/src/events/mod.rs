pub mod realtime_event;

pub use realtime_event::*;
