//! respondd request/response client
//!
//! respondd is the UDP query protocol mesh routers use to announce
//! information about themselves. A client sends one datagram carrying a query
//! string (usually `nodeinfo`) to a multicast group or a single peer and then
//! collects every answer that arrives within a total time budget.
//!
//! ```text
//!   open socket ──▶ send query ──▶ ┌──────────── receive loop ────────────┐
//!                                  │ recv(timeout = remaining budget)     │
//!                                  │   datagram ─▶ handler ─▶ Continue ─┐ │
//!                                  │                       ├▶ Cancel  ──┼─┼─▶ Ok
//!                                  │                       └▶ Err     ──┼─┼─▶ Err
//!                                  │   timeout / closed ───────────────┼─┼─▶ Ok
//!                                  │ budget -= elapsed; exhausted? ─────┘ │
//!                                  └──────────────────────────────────────┘
//! ```
//!
//! The budget is shared by every receive of one request, so a steady trickle
//! of answers cannot stretch a request past the timeout the caller asked for.

pub mod budget;
pub mod client;
pub mod error;
pub mod transport;

pub use budget::TimeBudget;
pub use client::{
    DEFAULT_RECEIVE_BUFFER, Flow, HandlerResult, RequestEnd, RequestSummary, Response,
    RespondClient,
};
pub use error::{BoxError, RespondError, Result};
pub use transport::{Connector, DatagramSocket, UdpConnector, UdpDatagramSocket};
