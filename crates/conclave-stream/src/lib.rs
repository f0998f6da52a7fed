//! # Conclave Stream
//!
//! Server-sent-event broadcasting for request lifecycles.
//!
//! The [`StreamHub`] owns every streaming connection: per request it
//! keeps an ordered set of sinks, delivers lifecycle events in
//! publication order, closes everything on terminal events, and
//! force-closes connections older than the 30-minute TTL through a
//! periodic sweeper.
//!
//! ## Event taxonomy
//!
//! | Event | Payload | Terminal |
//! |---|---|---|
//! | `init` | `{"requestId": ...}` | no |
//! | `status` | `"processing"` | no |
//! | `message` | content chunk | no |
//! | `error` | human-readable reason | yes |
//! | `done` | `"Request completed"` | yes |

mod event;
mod hub;

pub use event::StreamEvent;
pub use hub::{start_sweeper, StreamHub, StreamReceiver, CONNECTION_TTL, SWEEP_INTERVAL};
