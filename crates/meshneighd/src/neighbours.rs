//! Neighbour aggregation across mesh interfaces
//!
//! One respondd request per up interface, sent to `ff02::1` scoped to that
//! interface. Interfaces are queried one after another in directory order,
//! each with its own socket and its own time budget. A failing interface is
//! recorded and the remaining interfaces are still queried.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - SI-4: System Monitoring - Discover one-hop mesh peers
//! - SI-10: Information Input Validation - Caller veto on response payloads
//! - AU-3: Content of Audit Records - Per-interface failure records

use crate::types::{Interface, InterfaceId, InterfaceSet, Neighbour};
use mesh_types::{ALL_NODES, scoped};
use respondd::{Connector, Flow, RespondClient, RespondError, Response, UdpConnector};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info, instrument, trace, warn};

/// Per-interface request budget
pub const RESPONDD_TIMEOUT: Duration = Duration::from_secs(3);

/// Query asking peers for their node information
pub const NODEINFO_QUERY: &str = "nodeinfo";

/// UDP port respondd listens on
pub const DEFAULT_RESPONDD_PORT: u16 = 1001;

/// Hook deciding whether a response becomes a [`Neighbour`].
///
/// Rejecting a response is not an error; the request keeps collecting.
pub trait NeighbourFilter {
    fn accept(&mut self, interface: &Interface, response: &Response<'_>) -> bool;
}

impl<F> NeighbourFilter for F
where
    F: FnMut(&Interface, &Response<'_>) -> bool,
{
    fn accept(&mut self, interface: &Interface, response: &Response<'_>) -> bool {
        self(interface, response)
    }
}

/// Accepts every response
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl NeighbourFilter for AcceptAll {
    fn accept(&mut self, _interface: &Interface, _response: &Response<'_>) -> bool {
        true
    }
}

/// Accepts responses whose payload is a JSON document
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPayloadFilter;

impl NeighbourFilter for JsonPayloadFilter {
    fn accept(&mut self, interface: &Interface, response: &Response<'_>) -> bool {
        let ok = serde_json::from_slice::<serde::de::IgnoredAny>(response.payload).is_ok();
        if !ok {
            debug!(
                interface = %interface.name,
                source = %response.source,
                "Dropping response that is not JSON"
            );
        }
        ok
    }
}

/// A request on one interface that failed
#[derive(Debug)]
pub struct InterfaceFailure {
    pub interface: InterfaceId,
    /// Device name, kept for reporting
    pub name: String,
    pub error: RespondError,
}

/// Result of one aggregation pass
#[derive(Debug, Default)]
pub struct NeighbourCollection {
    /// Neighbours from every interface whose request succeeded, in order
    pub neighbours: Vec<Neighbour>,
    /// One entry per failed interface, in order
    pub failures: Vec<InterfaceFailure>,
    /// Requests issued
    pub requests: usize,
}

impl NeighbourCollection {
    /// The error of the last interface that failed
    pub fn last_error(&self) -> Option<&RespondError> {
        self.failures.last().map(|f| &f.error)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Queries every up interface of a set for respondd neighbours
#[derive(Debug, Clone)]
pub struct NeighbourAggregator<C = UdpConnector> {
    client: RespondClient<C>,
    port: u16,
    query: String,
    timeout: Duration,
}

impl NeighbourAggregator<UdpConnector> {
    pub fn new() -> Self {
        Self::with_client(RespondClient::new())
    }
}

impl Default for NeighbourAggregator<UdpConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> NeighbourAggregator<C> {
    pub fn with_client(client: RespondClient<C>) -> Self {
        Self {
            client,
            port: DEFAULT_RESPONDD_PORT,
            query: NODEINFO_QUERY.to_string(),
            timeout: RESPONDD_TIMEOUT,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Budget for each interface's request
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Queries each up interface of `set` in order.
    ///
    /// Neighbours collected on an interface whose request then fails are
    /// dropped together with that request; only the failure is kept.
    #[instrument(skip_all, fields(interfaces = set.len(), up = set.up_count()))]
    pub fn collect(
        &self,
        set: &InterfaceSet,
        filter: &mut dyn NeighbourFilter,
    ) -> NeighbourCollection {
        let mut collection = NeighbourCollection::default();

        for (id, iface) in set.iter() {
            if !iface.up {
                debug!(interface = %iface.name, "Interface down, not querying");
                continue;
            }

            let dst = scoped(ALL_NODES, self.port, iface.index);
            let mut found = Vec::new();
            collection.requests += 1;

            let result = self.client.request(dst, &self.query, self.timeout, |response| {
                let SocketAddr::V6(source) = response.source else {
                    trace!(source = %response.source, "Ignoring non-IPv6 responder");
                    return Ok(Flow::Continue);
                };
                if filter.accept(iface, &response) {
                    found.push(Neighbour {
                        interface: id,
                        address: *source.ip(),
                        payload: response.payload.to_vec(),
                    });
                }
                Ok(Flow::Continue)
            });

            match result {
                Ok(summary) => {
                    debug!(
                        interface = %iface.name,
                        responses = summary.responses,
                        accepted = found.len(),
                        end = ?summary.end,
                        "respondd request finished"
                    );
                    collection.neighbours.append(&mut found);
                }
                Err(error) => {
                    warn!(
                        interface = %iface.name,
                        errno = ?error.raw_os_error(),
                        "respondd request failed: {}",
                        error
                    );
                    collection.failures.push(InterfaceFailure {
                        interface: id,
                        name: iface.name.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            requests = collection.requests,
            neighbours = collection.neighbours.len(),
            failures = collection.failures.len(),
            "Neighbour collection complete"
        );
        collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_test::{NETWORK_UNREACHABLE, Script, ScriptedConnector};
    use pretty_assertions::assert_eq;

    fn set(up: [bool; 3]) -> InterfaceSet {
        InterfaceSet::new(vec![
            Interface::new(1, "mesh0", up[0], "gluon_mesh"),
            Interface::new(2, "mesh1", up[1], "gluon_mesh"),
            Interface::new(3, "mesh-vpn", up[2], "gluon_mesh"),
        ])
        .unwrap()
    }

    fn aggregator(connector: ScriptedConnector) -> NeighbourAggregator<ScriptedConnector> {
        NeighbourAggregator::with_client(RespondClient::with_connector(connector))
            .timeout(Duration::from_millis(200))
    }

    fn addresses(c: &NeighbourCollection) -> Vec<String> {
        c.neighbours.iter().map(|n| n.address.to_string()).collect()
    }

    #[test]
    fn test_down_interface_not_queried() {
        let connector = ScriptedConnector::new()
            .script(1, Script::new().datagram("fe80::1", "{}"))
            .script(2, Script::new().datagram("fe80::2", "{}"))
            .script(3, Script::new().datagram("fe80::3", "{}"));
        let agg = aggregator(connector.clone());

        let result = agg.collect(&set([true, false, true]), &mut AcceptAll);

        assert_eq!(result.requests, 2);
        assert_eq!(connector.log().scopes(), vec![1, 3]);
        assert_eq!(addresses(&result), vec!["fe80::1", "fe80::3"]);
        assert!(result.is_complete());
    }

    #[test]
    fn test_failed_interface_does_not_stop_others() {
        let connector = ScriptedConnector::new()
            .script(1, Script::new().datagram("fe80::1", "{}"))
            .failing_send(2)
            .script(3, Script::new().datagram("fe80::3", "{}"));
        let agg = aggregator(connector.clone());

        let s = set([true; 3]);
        let result = agg.collect(&s, &mut AcceptAll);

        assert_eq!(addresses(&result), vec!["fe80::1", "fe80::3"]);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(s[result.failures[0].interface].name, "mesh1");
        assert_eq!(
            result.last_error().and_then(|e| e.raw_os_error()),
            Some(NETWORK_UNREACHABLE)
        );

        let log = connector.log();
        assert_eq!(log.opened, 3);
        assert_eq!(log.closed, 3);
    }

    #[test]
    fn test_partial_neighbours_of_failed_interface_dropped() {
        let connector = ScriptedConnector::new().script(
            2,
            Script::new()
                .datagram("fe80::2", "{}")
                .fail(NETWORK_UNREACHABLE),
        );
        let agg = aggregator(connector);

        let result = agg.collect(&set([false, true, false]), &mut AcceptAll);

        assert!(result.neighbours.is_empty());
        assert!(matches!(result.last_error(), Some(RespondError::Receive(_))));
    }

    #[test]
    fn test_veto_is_not_an_error() {
        let connector = ScriptedConnector::new().script(
            1,
            Script::new()
                .datagram("fe80::a", "not json")
                .datagram("fe80::b", r#"{"hostname":"b"}"#),
        );
        let agg = aggregator(connector);

        let result = agg.collect(&set([true, false, false]), &mut JsonPayloadFilter);

        assert!(result.is_complete());
        assert_eq!(addresses(&result), vec!["fe80::b"]);
    }

    #[test]
    fn test_closure_filter_sees_interface() {
        let connector = ScriptedConnector::new()
            .script(1, Script::new().datagram("fe80::1", "{}"))
            .script(3, Script::new().datagram("fe80::3", "{}"));
        let agg = aggregator(connector);

        let mut seen = Vec::new();
        let mut only_vpn = |iface: &Interface, _: &Response<'_>| {
            seen.push(iface.name.clone());
            iface.name == "mesh-vpn"
        };
        let result = agg.collect(&set([true, false, true]), &mut only_vpn);

        assert_eq!(addresses(&result), vec!["fe80::3"]);
        assert_eq!(seen, vec!["mesh0", "mesh-vpn"]);
    }

    #[test]
    fn test_non_ipv6_source_ignored() {
        let connector = ScriptedConnector::new().script(
            1,
            Script::new()
                .datagram("192.0.2.1", "{}")
                .datagram("fe80::1", "{}"),
        );
        let agg = aggregator(connector);

        let result = agg.collect(&set([true, false, false]), &mut AcceptAll);
        assert_eq!(addresses(&result), vec!["fe80::1"]);
    }

    #[test]
    fn test_query_and_port_used() {
        let connector = ScriptedConnector::new();
        let agg = aggregator(connector.clone()).port(4242).query("statistics");

        agg.collect(&set([true, false, false]), &mut AcceptAll);

        let log = connector.log();
        assert_eq!(log.sends.len(), 1);
        let (dst, payload) = &log.sends[0];
        assert_eq!(dst.port(), 4242);
        assert_eq!(*dst.ip(), ALL_NODES);
        assert_eq!(payload.as_slice(), b"statistics");
    }
}
