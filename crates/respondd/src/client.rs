//! The respondd request loop.

use crate::budget::TimeBudget;
use crate::error::{BoxError, RespondError, Result};
use crate::transport::{Connector, DatagramSocket, UdpConnector};
use std::io;
use std::net::{SocketAddr, SocketAddrV6};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, trace};

/// Receive buffer size; one Ethernet MTU, larger answers are truncated.
pub const DEFAULT_RECEIVE_BUFFER: usize = 1500;

/// What the response handler wants the request loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep collecting responses until the budget runs out
    Continue,
    /// Stop early; the request still succeeds
    Cancel,
}

/// Return type of a response handler. `Err` aborts the whole request.
pub type HandlerResult = std::result::Result<Flow, BoxError>;

/// One datagram received in answer to a query.
#[derive(Debug, Clone, Copy)]
pub struct Response<'a> {
    pub payload: &'a [u8],
    pub source: SocketAddr,
}

/// Why a successful request stopped collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEnd {
    /// A receive waited out the remaining budget without data
    TimedOut,
    /// The budget was used up between receives
    BudgetExhausted,
    /// The handler returned [`Flow::Cancel`]
    Cancelled,
    /// The socket reported end of stream (zero-length read)
    Closed,
}

/// Outcome of a successful request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestSummary {
    /// Datagrams handed to the handler
    pub responses: usize,
    pub end: RequestEnd,
}

/// Sends respondd queries and collects answers within a total time budget.
///
/// Every call to [`RespondClient::request`] opens its own socket through the
/// connector and closes it again before returning, on success and on error.
#[derive(Debug, Clone)]
pub struct RespondClient<C = UdpConnector> {
    connector: C,
    receive_buffer: usize,
}

impl RespondClient<UdpConnector> {
    pub fn new() -> Self {
        Self::with_connector(UdpConnector)
    }
}

impl Default for RespondClient<UdpConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> RespondClient<C> {
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            receive_buffer: DEFAULT_RECEIVE_BUFFER,
        }
    }

    /// Overrides the per-datagram receive buffer size.
    pub fn with_receive_buffer(mut self, size: usize) -> Self {
        self.receive_buffer = size.max(1);
        self
    }

    /// Sends `query` to `dst` and feeds every answer to `handler` until the
    /// `timeout` budget is spent, the handler cancels, or an error occurs.
    ///
    /// Running out of time is the normal way for a request to end and is
    /// reported as success, whether or not anybody answered. Time spent in
    /// the handler counts against the budget.
    #[instrument(skip(self, handler), fields(dst = %dst))]
    pub fn request<F>(
        &self,
        dst: SocketAddrV6,
        query: &str,
        timeout: Duration,
        mut handler: F,
    ) -> Result<RequestSummary>
    where
        F: FnMut(Response<'_>) -> HandlerResult,
    {
        let started = Instant::now();
        let mut budget = TimeBudget::new(timeout);

        let mut socket = self.connector.open().map_err(RespondError::Socket)?;
        socket
            .send_to(query.as_bytes(), dst)
            .map_err(|source| RespondError::Send { dst, source })?;
        budget.spend_since(started);

        let mut buf = vec![0u8; self.receive_buffer];
        let mut responses = 0;

        let end = loop {
            let Some(wait) = budget.remaining() else {
                break RequestEnd::BudgetExhausted;
            };
            let iteration = Instant::now();

            match socket.recv_from(&mut buf, wait) {
                Ok((0, _)) => break RequestEnd::Closed,
                Ok((len, source)) => {
                    responses += 1;
                    trace!(%source, len, "Received respondd response");
                    match handler(Response {
                        payload: &buf[..len],
                        source,
                    }) {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Cancel) => break RequestEnd::Cancelled,
                        Err(e) => return Err(RespondError::Handler(e)),
                    }
                }
                Err(e) if is_timeout(&e) => break RequestEnd::TimedOut,
                // EINTR: wait again with whatever budget is left
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(RespondError::Receive(e)),
            }

            budget.spend_since(iteration);
        };

        debug!(
            responses,
            end = ?end,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "respondd request finished"
        );
        Ok(RequestSummary { responses, end })
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_kinds() {
        assert!(is_timeout(&io::ErrorKind::WouldBlock.into()));
        assert!(is_timeout(&io::ErrorKind::TimedOut.into()));
        assert!(!is_timeout(&io::ErrorKind::ConnectionRefused.into()));
        assert!(!is_timeout(&io::Error::from_raw_os_error(101)));
    }

    #[test]
    fn test_receive_buffer_has_a_floor() {
        let client = RespondClient::new().with_receive_buffer(0);
        assert_eq!(client.receive_buffer, 1);
        assert_eq!(RespondClient::new().receive_buffer, DEFAULT_RECEIVE_BUFFER);
    }
}
