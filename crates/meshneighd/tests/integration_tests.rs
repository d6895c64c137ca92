//! Integration tests for meshneighd
//!
//! Full discovery runs against an in-memory directory, scripted respondd
//! sockets and recorded link dumps.

#[cfg(test)]
mod tests {
    use mesh_test::{LinkMessageBuilder, NETWORK_UNREACHABLE, Script, ScriptedConnector};
    use mesh_test::{datagram, done};
    use meshneighd::{
        Discovery, Interface, JsonPayloadFilter, MemoryDirectory, NeighbourAggregator,
        RecordedLinkDump,
    };
    use pretty_assertions::assert_eq;
    use respondd::RespondClient;
    use serde_json::json;
    use std::time::Duration;

    fn aggregator(connector: &ScriptedConnector) -> NeighbourAggregator<ScriptedConnector> {
        NeighbourAggregator::with_client(RespondClient::with_connector(connector.clone()))
            .timeout(Duration::from_millis(300))
    }

    #[test]
    fn test_single_up_interface_end_to_end() {
        let directory = MemoryDirectory::new(vec![
            Interface::new(1, "mesh0", true, "gluon_mesh"),
            Interface::new(2, "mesh1", false, "gluon_mesh"),
        ]);
        let connector = ScriptedConnector::new()
            .script(1, Script::new().datagram("fe80::1", r#"{"hostname":"node-a"}"#));

        let run = Discovery::with_aggregator(directory, aggregator(&connector))
            .run()
            .expect("discovery run");

        let log = connector.log();
        assert_eq!(log.sends.len(), 1);
        assert_eq!(log.scopes(), vec![1]);
        assert_eq!(log.sends[0].0.to_string(), "[ff02::1%1]:1001");
        assert_eq!(log.sends[0].1, b"nodeinfo".to_vec());
        assert_eq!((log.opened, log.closed), (1, 1));

        assert_eq!(run.neighbours.neighbours.len(), 1);
        let neighbour = &run.neighbours.neighbours[0];
        assert_eq!(run.interfaces[neighbour.interface].name, "mesh0");
        assert_eq!(neighbour.address.to_string(), "fe80::1");
        assert_eq!(neighbour.payload_json(), Some(json!({"hostname": "node-a"})));
        assert!(!run.has_errors());

        let report = serde_json::to_value(run.report()).unwrap();
        assert_eq!(
            report["neighbours"],
            json!([{"interface": "mesh0", "address": "fe80::1", "nodeinfo": {"hostname": "node-a"}}])
        );
        assert_eq!(report["errors"], json!([]));
    }

    #[test]
    fn test_partial_failure_reported_with_results() {
        let directory = MemoryDirectory::new(vec![
            Interface::new(1, "mesh0", true, "gluon_mesh"),
            Interface::new(2, "mesh1", true, "gluon_mesh"),
            Interface::new(3, "mesh-vpn", true, "gluon_mesh"),
        ]);
        let connector = ScriptedConnector::new()
            .script(1, Script::new().datagram("fe80::1", r#"{"node_id":"1"}"#))
            .failing_send(2)
            .script(3, Script::new().datagram("fe80::3", r#"{"node_id":"3"}"#));

        let run = Discovery::with_aggregator(directory, aggregator(&connector))
            .filter(JsonPayloadFilter)
            .run()
            .expect("discovery run");

        let names: Vec<_> = run
            .neighbours
            .neighbours
            .iter()
            .map(|n| run.interfaces[n.interface].name.as_str())
            .collect();
        assert_eq!(names, vec!["mesh0", "mesh-vpn"]);
        assert!(run.has_errors());

        let report = run.report();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].interface.as_deref(), Some("mesh1"));
        assert_eq!(report.errors[0].errno, Some(NETWORK_UNREACHABLE));
    }

    #[test]
    fn test_links_and_neighbours_in_one_report() {
        let directory = MemoryDirectory::new(vec![
            Interface::new(5, "mesh0", true, "gluon_mesh"),
            Interface::new(6, "mesh-vpn", false, "gluon_mesh"),
        ]);
        let connector = ScriptedConnector::new().script(
            5,
            Script::new().datagram("fe80::ca:feff:fe00:7", r#"{"hostname":"node-b"}"#),
        );
        let dump = RecordedLinkDump::new(vec![datagram([
            LinkMessageBuilder::new(1).name("lo").mac([0; 6]).build(9),
            LinkMessageBuilder::new(5).name("mesh0").mac([0x02, 0xca, 0xfe, 0, 0, 5]).build(9),
            LinkMessageBuilder::new(6)
                .flags(0)
                .name("mesh-vpn")
                .mac([0x02, 0xca, 0xfe, 0, 0, 6])
                .build(9),
            done(9),
        ])]);

        let run = Discovery::with_aggregator(directory, aggregator(&connector))
            .link_dump(dump)
            .run()
            .expect("discovery run");

        let report = serde_json::to_value(run.report()).unwrap();
        assert_eq!(
            report["network"]["mesh"]["link_macs"],
            json!({"mesh0": "02:ca:fe:00:00:05", "mesh-vpn": "02:ca:fe:00:00:06"})
        );
        assert_eq!(report["neighbours"][0]["mac"], "02:ca:fe:00:00:07");
    }

    #[test]
    fn test_every_socket_released() {
        let directory = MemoryDirectory::new(vec![
            Interface::new(1, "mesh0", true, "gluon_mesh"),
            Interface::new(2, "mesh1", true, "gluon_mesh"),
        ]);
        let connector = ScriptedConnector::new()
            .script(1, Script::new().fail(NETWORK_UNREACHABLE))
            .script(2, Script::new().closed());

        let run = Discovery::with_aggregator(directory, aggregator(&connector))
            .run()
            .expect("discovery run");

        let log = connector.log();
        assert_eq!((log.opened, log.closed), (2, 2));
        assert_eq!(run.neighbours.failures.len(), 1);
        assert!(run.neighbours.neighbours.is_empty());
    }
}
