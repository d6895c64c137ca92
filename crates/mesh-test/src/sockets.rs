//! Scripted sockets for respondd request tests
//!
//! Each request opens a [`ScriptedSocket`]. When the query is sent, the socket
//! picks up the [`Script`] registered for the destination's scope id (the
//! interface index) and replays it on every receive.

use parking_lot::Mutex;
use respondd::{Connector, DatagramSocket};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::net::{SocketAddr, SocketAddrV6};
use std::sync::Arc;
use std::time::Duration;

/// `ENETUNREACH`, the errno scripted send failures report.
pub const NETWORK_UNREACHABLE: i32 = 101;

/// One scripted receive outcome
#[derive(Debug, Clone)]
pub enum Step {
    /// A datagram arriving `delay` after the receive started
    Datagram {
        source: SocketAddr,
        payload: Vec<u8>,
        delay: Duration,
    },
    /// The receive waits out its whole timeout
    Silence,
    /// Zero-length read
    Closed,
    /// The receive fails with this errno
    Fail(i32),
}

/// Ordered receive outcomes for one request
#[derive(Debug, Clone, Default)]
pub struct Script {
    steps: VecDeque<Step>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// An immediately available datagram from `source`
    pub fn datagram(self, source: &str, payload: impl Into<Vec<u8>>) -> Self {
        self.delayed_datagram(source, payload, Duration::ZERO)
    }

    pub fn delayed_datagram(
        mut self,
        source: &str,
        payload: impl Into<Vec<u8>>,
        delay: Duration,
    ) -> Self {
        self.steps.push_back(Step::Datagram {
            source: parse_source(source),
            payload: payload.into(),
            delay,
        });
        self
    }

    /// `count` datagrams from `source`, each arriving `delay` after the previous
    pub fn trickle(mut self, source: &str, count: usize, delay: Duration) -> Self {
        for n in 0..count {
            self = self.delayed_datagram(source, format!("{{\"seq\":{n}}}"), delay);
        }
        self
    }

    pub fn silence(mut self) -> Self {
        self.steps.push_back(Step::Silence);
        self
    }

    pub fn closed(mut self) -> Self {
        self.steps.push_back(Step::Closed);
        self
    }

    pub fn fail(mut self, errno: i32) -> Self {
        self.steps.push_back(Step::Fail(errno));
        self
    }
}

fn parse_source(source: &str) -> SocketAddr {
    if let Ok(addr) = source.parse::<SocketAddr>() {
        return addr;
    }
    let ip: std::net::IpAddr = source
        .parse()
        .unwrap_or_else(|_| panic!("invalid scripted source address: {source}"));
    SocketAddr::new(ip, 1001)
}

/// Everything the scripted sockets observed
#[derive(Debug, Clone, Default)]
pub struct SocketLog {
    pub opened: usize,
    pub closed: usize,
    /// Destination and payload of every query sent, in order
    pub sends: Vec<(SocketAddrV6, Vec<u8>)>,
    /// Timeout passed to every receive, in order
    pub receive_timeouts: Vec<Duration>,
}

impl SocketLog {
    /// Scope ids (interface indexes) of the queries sent, in order
    pub fn scopes(&self) -> Vec<u32> {
        self.sends.iter().map(|(dst, _)| dst.scope_id()).collect()
    }

    pub fn receives(&self) -> usize {
        self.receive_timeouts.len()
    }
}

/// [`Connector`] handing out [`ScriptedSocket`]s
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    scripts: Arc<Mutex<HashMap<u32, Script>>>,
    failing_sends: Arc<Mutex<HashSet<u32>>>,
    fail_open: Option<i32>,
    log: Arc<Mutex<SocketLog>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the script replayed for queries scoped to `scope_id`
    pub fn script(self, scope_id: u32, script: Script) -> Self {
        self.scripts.lock().insert(scope_id, script);
        self
    }

    /// Makes sends scoped to `scope_id` fail with `ENETUNREACH`
    pub fn failing_send(self, scope_id: u32) -> Self {
        self.failing_sends.lock().insert(scope_id);
        self
    }

    /// Makes every socket open fail with `errno`
    pub fn failing_open(mut self, errno: i32) -> Self {
        self.fail_open = Some(errno);
        self
    }

    pub fn log(&self) -> SocketLog {
        self.log.lock().clone()
    }
}

impl Connector for ScriptedConnector {
    type Socket = ScriptedSocket;

    fn open(&self) -> io::Result<ScriptedSocket> {
        if let Some(errno) = self.fail_open {
            return Err(io::Error::from_raw_os_error(errno));
        }
        self.log.lock().opened += 1;
        Ok(ScriptedSocket {
            connector: self.clone(),
            script: Script::default(),
        })
    }
}

/// A socket replaying a [`Script`]
#[derive(Debug)]
pub struct ScriptedSocket {
    connector: ScriptedConnector,
    script: Script,
}

impl DatagramSocket for ScriptedSocket {
    fn send_to(&mut self, payload: &[u8], dst: SocketAddrV6) -> io::Result<usize> {
        let scope = dst.scope_id();
        self.connector.log.lock().sends.push((dst, payload.to_vec()));
        if self.connector.failing_sends.lock().contains(&scope) {
            return Err(io::Error::from_raw_os_error(NETWORK_UNREACHABLE));
        }
        self.script = self
            .connector
            .scripts
            .lock()
            .remove(&scope)
            .unwrap_or_default();
        Ok(payload.len())
    }

    fn recv_from(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<(usize, SocketAddr)> {
        assert!(!timeout.is_zero(), "receive issued with an empty budget");
        self.connector.log.lock().receive_timeouts.push(timeout);

        match self.script.steps.pop_front() {
            None => Err(io::ErrorKind::WouldBlock.into()),
            Some(Step::Silence) => {
                std::thread::sleep(timeout);
                Err(io::ErrorKind::WouldBlock.into())
            }
            Some(Step::Closed) => Ok((0, SocketAddr::from(([0u16; 8], 0)))),
            Some(Step::Fail(errno)) => Err(io::Error::from_raw_os_error(errno)),
            Some(Step::Datagram {
                source,
                payload,
                delay,
            }) => {
                if delay >= timeout {
                    std::thread::sleep(timeout);
                    return Err(io::ErrorKind::WouldBlock.into());
                }
                std::thread::sleep(delay);
                let len = payload.len().min(buf.len());
                buf[..len].copy_from_slice(&payload[..len]);
                Ok((len, source))
            }
        }
    }
}

impl Drop for ScriptedSocket {
    fn drop(&mut self) {
        self.connector.log.lock().closed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_selected_by_scope() {
        let connector = ScriptedConnector::new()
            .script(2, Script::new().datagram("fe80::2", "two"));
        let mut socket = connector.open().unwrap();
        let dst = SocketAddrV6::new("ff02::1".parse().unwrap(), 1001, 0, 2);
        socket.send_to(b"nodeinfo", dst).unwrap();

        let mut buf = [0u8; 16];
        let (len, source) = socket.recv_from(&mut buf, Duration::from_secs(1)).unwrap();
        assert_eq!(&buf[..len], b"two");
        assert_eq!(source.ip().to_string(), "fe80::2");
        drop(socket);

        let log = connector.log();
        assert_eq!((log.opened, log.closed), (1, 1));
        assert_eq!(log.scopes(), vec![2]);
    }

    #[test]
    fn test_failing_send() {
        let connector = ScriptedConnector::new().failing_send(4);
        let mut socket = connector.open().unwrap();
        let dst = SocketAddrV6::new("ff02::1".parse().unwrap(), 1001, 0, 4);
        let err = socket.send_to(b"nodeinfo", dst).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(NETWORK_UNREACHABLE));
    }
}
