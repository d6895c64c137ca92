//! One discovery run: directory, neighbours, link addresses
//!
//! The directory query is the only fatal step. Neighbour and link-dump
//! failures are kept in the [`DiscoveryRun`] next to whatever was collected.

use crate::directory::InterfaceDirectory;
use crate::error::{MeshError, Result};
use crate::link_layer::{LinkLayerTable, collect_link_macs};
use crate::netlink::LinkDumpProvider;
use crate::neighbours::{AcceptAll, NeighbourAggregator, NeighbourCollection, NeighbourFilter};
use crate::report::DiscoveryReport;
use crate::types::InterfaceSet;
use respondd::{Connector, UdpConnector};
use tracing::{info, instrument, warn};

/// Everything one run found
#[derive(Debug)]
pub struct DiscoveryRun {
    pub interfaces: InterfaceSet,
    pub neighbours: NeighbourCollection,
    pub links: LinkLayerTable,
    /// Why the link dump failed, if it did
    pub link_error: Option<MeshError>,
}

impl DiscoveryRun {
    /// Whether any interface request or the link dump failed
    pub fn has_errors(&self) -> bool {
        !self.neighbours.is_complete() || self.link_error.is_some()
    }

    pub fn report(&self) -> DiscoveryReport {
        DiscoveryReport::from_run(self)
    }
}

/// Wires a directory, a neighbour aggregator and a link dump together
pub struct Discovery<C = UdpConnector> {
    directory: Box<dyn InterfaceDirectory>,
    neighbours: Option<NeighbourAggregator<C>>,
    links: Option<Box<dyn LinkDumpProvider>>,
    filter: Box<dyn NeighbourFilter>,
}

impl Discovery<UdpConnector> {
    pub fn new(directory: impl InterfaceDirectory + 'static) -> Self {
        Self::with_aggregator(directory, NeighbourAggregator::new())
    }
}

impl<C: Connector> Discovery<C> {
    pub fn with_aggregator(
        directory: impl InterfaceDirectory + 'static,
        aggregator: NeighbourAggregator<C>,
    ) -> Self {
        Self {
            directory: Box::new(directory),
            neighbours: Some(aggregator),
            links: None,
            filter: Box::new(AcceptAll),
        }
    }

    /// Collects our own hardware addresses from `provider` as well
    pub fn link_dump(mut self, provider: impl LinkDumpProvider + 'static) -> Self {
        self.links = Some(Box::new(provider));
        self
    }

    /// Veto hook applied to every response
    pub fn filter(mut self, filter: impl NeighbourFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    /// Skips respondd requests entirely
    pub fn without_neighbours(mut self) -> Self {
        self.neighbours = None;
        self
    }

    #[instrument(skip(self))]
    pub fn run(&mut self) -> Result<DiscoveryRun> {
        let interfaces = self.directory.mesh_interfaces()?;
        info!(
            interfaces = interfaces.len(),
            up = interfaces.up_count(),
            "Mesh interfaces enumerated"
        );

        let neighbours = match &self.neighbours {
            Some(aggregator) => aggregator.collect(&interfaces, self.filter.as_mut()),
            None => NeighbourCollection::default(),
        };

        let (links, link_error) = match self.links.as_mut() {
            Some(provider) => match collect_link_macs(provider.as_mut(), &interfaces) {
                Ok(table) => (table, None),
                Err(e) => {
                    warn!("Link dump failed: {}", e);
                    (LinkLayerTable::default(), Some(e))
                }
            },
            None => (LinkLayerTable::default(), None),
        };

        Ok(DiscoveryRun {
            interfaces,
            neighbours,
            links,
            link_error,
        })
    }
}

impl<C> std::fmt::Debug for Discovery<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discovery")
            .field("neighbours", &self.neighbours.is_some())
            .field("links", &self.links.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemoryDirectory;
    use crate::netlink::RecordedLinkDump;
    use crate::types::Interface;
    use mesh_test::{LinkMessageBuilder, Script, ScriptedConnector, datagram, done, error};
    use respondd::RespondClient;
    use std::time::Duration;

    fn directory() -> MemoryDirectory {
        MemoryDirectory::new(vec![
            Interface::new(1, "mesh0", true, "gluon_mesh"),
            Interface::new(2, "mesh1", true, "gluon_mesh"),
        ])
    }

    fn aggregator(connector: ScriptedConnector) -> NeighbourAggregator<ScriptedConnector> {
        NeighbourAggregator::with_client(RespondClient::with_connector(connector))
            .timeout(Duration::from_millis(100))
    }

    #[test]
    fn test_directory_failure_is_fatal() {
        let connector = ScriptedConnector::new();
        let mut discovery = Discovery::with_aggregator(
            MemoryDirectory::unavailable("ubus: Not found"),
            aggregator(connector.clone()),
        );
        assert!(matches!(discovery.run(), Err(MeshError::Directory(_))));
        assert_eq!(connector.log().opened, 0);
    }

    #[test]
    fn test_link_failure_keeps_neighbours() {
        let connector =
            ScriptedConnector::new().script(1, Script::new().datagram("fe80::1", "{}"));
        let mut discovery = Discovery::with_aggregator(directory(), aggregator(connector))
            .link_dump(RecordedLinkDump::new(vec![error(1, 1)]));

        let run = discovery.run().unwrap();
        assert_eq!(run.neighbours.neighbours.len(), 1);
        assert!(run.links.is_empty());
        assert!(matches!(run.link_error, Some(MeshError::Netlink(_))));
        assert!(run.has_errors());
    }

    #[test]
    fn test_links_only() {
        let connector = ScriptedConnector::new();
        let mut discovery = Discovery::with_aggregator(directory(), aggregator(connector.clone()))
            .without_neighbours()
            .link_dump(RecordedLinkDump::new(vec![datagram([
                LinkMessageBuilder::new(2).mac([2, 0, 0, 0, 0, 2]).build(1),
                done(1),
            ])]));

        let run = discovery.run().unwrap();
        assert_eq!(connector.log().opened, 0);
        assert_eq!(run.neighbours.requests, 0);
        assert_eq!(run.links.len(), 1);
        assert!(!run.has_errors());
        assert_eq!(
            run.report().network.mesh.link_macs.get("mesh1").map(String::as_str),
            Some("02:00:00:00:00:02")
        );
    }

    #[test]
    fn test_filter_applied() {
        let connector = ScriptedConnector::new().script(
            2,
            Script::new()
                .datagram("fe80::2", "garbage")
                .datagram("fe80::3", r#"{"node_id":"3"}"#),
        );
        let mut discovery = Discovery::with_aggregator(directory(), aggregator(connector))
            .filter(crate::neighbours::JsonPayloadFilter);

        let run = discovery.run().unwrap();
        let addrs: Vec<_> = run
            .neighbours
            .neighbours
            .iter()
            .map(|n| n.address.to_string())
            .collect();
        assert_eq!(addrs, vec!["fe80::3"]);
        assert!(!run.has_errors());
    }
}
