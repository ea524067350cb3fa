/// UPnP/SSDP device discovery for DLNA renderers
///
/// Sends M-SEARCH requests for MediaRenderer devices and for `ssdp:all`, then
/// listens for responses until the receive window closes. Every new LOCATION
/// gets its description fetched in a separate task while receiving continues.
use crate::description::DescriptionFetcher;
use crate::error::DiscoveryError;
use async_trait::async_trait;
use dlnalink_core::{Device, DiscoveryConfig};
use std::collections::HashSet;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Search target that asks every UPnP device to answer
pub const SSDP_ALL: &str = "ssdp:all";

/// Summary of one discovery run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Datagrams received
    pub responses: usize,
    /// Distinct LOCATION values seen
    pub locations: usize,
    /// Descriptions fetched and parsed successfully
    pub devices: usize,
    pub elapsed: Duration,
}

/// What a single SSDP response contributed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// First time this location was seen in the run
    New(String),
    Duplicate(String),
    NoLocation,
}

/// LOCATION values seen during one discovery run
#[derive(Debug, Default)]
pub struct SeenLocations {
    seen: HashSet<String>,
}

impl SeenLocations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a raw SSDP response, remembering new locations
    pub fn observe(&mut self, response: &str) -> Observation {
        match parse_location(response) {
            Some(location) => {
                if self.seen.insert(location.clone()) {
                    Observation::New(location)
                } else {
                    Observation::Duplicate(location)
                }
            }
            None => Observation::NoLocation,
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Value of the first `LOCATION:` header (case-insensitive), trimmed
pub fn parse_location(response: &str) -> Option<String> {
    const HEADER: &str = "location:";

    response
        .split("\r\n")
        .find(|line| {
            line.get(..HEADER.len())
                .is_some_and(|name| name.eq_ignore_ascii_case(HEADER))
        })
        .map(|line| line[HEADER.len()..].trim().to_string())
}

/// M-SEARCH request for `search_target`; CRLF line endings are mandatory
pub fn build_msearch(config: &DiscoveryConfig, search_target: &str) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\
         USER-AGENT: {}\r\n\
         \r\n",
        config.target(),
        config.mx,
        search_target,
        config.user_agent
    )
}

/// Datagram socket the discovery loop sends M-SEARCH on and reads answers from
#[async_trait]
pub trait SsdpSocket: Send + Sync {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

#[async_trait]
impl SsdpSocket for UdpSocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, target).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }
}

/// SSDP discovery engine
pub struct SsdpDiscovery {
    config: DiscoveryConfig,
    fetcher: Arc<DescriptionFetcher>,
}

impl SsdpDiscovery {
    pub fn new(config: DiscoveryConfig, fetcher: Arc<DescriptionFetcher>) -> Self {
        Self { config, fetcher }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Run one discovery pass
    ///
    /// Each parsed device is sent on `found` as soon as its description
    /// arrives. Returns once the receive window has closed and every
    /// description fetch has finished. Socket setup failures are errors;
    /// finding nothing is an `Ok` report with zero devices.
    pub async fn discover(
        &self,
        found: mpsc::UnboundedSender<Device>,
    ) -> Result<DiscoveryReport, DiscoveryError> {
        info!(
            "Starting SSDP discovery ({}ms window)",
            self.config.receive_timeout_ms
        );

        let target: SocketAddr = self
            .config
            .target()
            .parse()
            .map_err(|_| DiscoveryError::InvalidTarget(self.config.target()))?;

        log_network_interfaces();
        let socket = create_ssdp_socket()?;

        Ok(self.run(socket, target, found).await)
    }

    /// Search and receive over `socket`, which is dropped when the window closes
    async fn run<S: SsdpSocket>(
        &self,
        socket: S,
        target: SocketAddr,
        found: mpsc::UnboundedSender<Device>,
    ) -> DiscoveryReport {
        let started = std::time::Instant::now();

        for st in [self.config.search_target.as_str(), SSDP_ALL] {
            send_msearch(&socket, &self.config, target, st).await;
        }

        let mut buf = vec![0u8; self.config.buffer_size];
        let mut seen = SeenLocations::new();
        let mut fetches = JoinSet::new();
        let mut responses = 0;
        let deadline = Instant::now() + self.config.receive_timeout();

        info!("Listening for SSDP responses...");

        loop {
            match timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Ok(Ok((len, addr))) => {
                    responses += 1;
                    let response = String::from_utf8_lossy(&buf[..len]);
                    debug!(
                        "SSDP response #{} from {} ({} bytes):\n{}",
                        responses, addr, len, response
                    );

                    match seen.observe(&response) {
                        Observation::New(location) => {
                            info!("New device location: {}", location);
                            self.spawn_fetch(&mut fetches, location, found.clone());
                        }
                        Observation::Duplicate(location) => {
                            debug!("Already seen: {}", location);
                        }
                        Observation::NoLocation => {
                            debug!("Response from {} has no LOCATION header", addr);
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!("Socket error during discovery: {}", e);
                    break;
                }
                Err(_) => {
                    debug!("SSDP receive window elapsed");
                    break;
                }
            }
        }

        drop(socket);
        debug!("SSDP socket closed, waiting for {} description fetch(es)", fetches.len());

        let mut devices = 0;
        while let Some(result) = fetches.join_next().await {
            match result {
                Ok(true) => devices += 1,
                Ok(false) => {}
                Err(e) => warn!("Description fetch task failed: {}", e),
            }
        }

        let report = DiscoveryReport {
            responses,
            locations: seen.len(),
            devices,
            elapsed: started.elapsed(),
        };

        if responses == 0 {
            warn!(
                "No SSDP responses received. Possible causes: no renderers on this network, \
                 a firewall dropping UDP 1900, Wi-Fi power saving filtering multicast, \
                 or access point client isolation"
            );
        }
        info!(
            "SSDP discovery complete in {:?}: {} response(s), {} location(s), {} device(s)",
            report.elapsed, report.responses, report.locations, report.devices
        );

        report
    }

    fn spawn_fetch(
        &self,
        fetches: &mut JoinSet<bool>,
        location: String,
        found: mpsc::UnboundedSender<Device>,
    ) {
        let fetcher = self.fetcher.clone();

        fetches.spawn(async move {
            match fetcher.fetch(&location).await {
                Ok(device) => {
                    if found.send(device).is_err() {
                        debug!("Device receiver dropped, discarding {}", location);
                    }
                    true
                }
                Err(e) => {
                    warn!("Failed to fetch device description from {}: {}", location, e);
                    false
                }
            }
        });
    }
}

/// Create a UDP socket for sending M-SEARCH and receiving unicast answers
fn create_ssdp_socket() -> Result<UdpSocket, DiscoveryError> {
    let socket = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )?;

    // Coexist with other UPnP stacks on the host
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.set_multicast_ttl_v4(2)?;

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    let socket = UdpSocket::from_std(socket.into())?;
    info!("SSDP socket bound to: {}", socket.local_addr()?);

    Ok(socket)
}

/// List local interfaces at debug level; a run with no answers usually
/// comes down to which of these can carry multicast
fn log_network_interfaces() {
    match get_if_addrs::get_if_addrs() {
        Ok(interfaces) => {
            for iface in interfaces {
                let multicast = match iface.ip() {
                    IpAddr::V4(ipv4) => !ipv4.is_loopback(),
                    IpAddr::V6(_) => false,
                };
                debug!(
                    "Interface {}: {} (loopback: {}, IPv4 multicast: {})",
                    iface.name,
                    iface.ip(),
                    iface.is_loopback(),
                    multicast
                );
            }
        }
        Err(e) => debug!("Could not list network interfaces: {}", e),
    }
}

/// Send one M-SEARCH; a failure is logged so the other search can still run
async fn send_msearch<S: SsdpSocket>(
    socket: &S,
    config: &DiscoveryConfig,
    target: SocketAddr,
    st: &str,
) {
    let msearch = build_msearch(config, st);

    match socket.send_to(msearch.as_bytes(), target).await {
        Ok(bytes_sent) => {
            info!("Sent M-SEARCH for {} ({} bytes to {})", st, bytes_sent, target);
        }
        Err(e) => {
            warn!("Failed to send M-SEARCH for {}: {}", st, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    // Replays queued datagrams, then fails every further receive
    struct ScriptedSocket {
        datagrams: Mutex<VecDeque<String>>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl SsdpSocket for ScriptedSocket {
        async fn send_to(&self, buf: &[u8], _target: SocketAddr) -> io::Result<usize> {
            self.sent
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(buf).into_owned());
            Ok(buf.len())
        }

        async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            match self.datagrams.lock().unwrap().pop_front() {
                Some(datagram) => {
                    let len = datagram.len().min(buf.len());
                    buf[..len].copy_from_slice(&datagram.as_bytes()[..len]);
                    Ok((len, SocketAddr::from(([192, 168, 1, 5], 1900))))
                }
                None => Err(io::Error::new(io::ErrorKind::ConnectionReset, "socket reset")),
            }
        }
    }

    fn response(location_line: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\n\
             CACHE-CONTROL: max-age=1800\r\n\
             {}\
             ST: urn:schemas-upnp-org:device:MediaRenderer:1\r\n\
             USN: uuid:abc::urn:schemas-upnp-org:device:MediaRenderer:1\r\n\
             \r\n",
            location_line
        )
    }

    #[test]
    fn test_build_msearch() {
        let config = DiscoveryConfig::default();
        let msearch = build_msearch(&config, "urn:schemas-upnp-org:device:MediaRenderer:1");

        assert_eq!(
            msearch,
            "M-SEARCH * HTTP/1.1\r\n\
             HOST: 239.255.255.250:1900\r\n\
             MAN: \"ssdp:discover\"\r\n\
             MX: 3\r\n\
             ST: urn:schemas-upnp-org:device:MediaRenderer:1\r\n\
             USER-AGENT: dlnalink UPnP/1.0\r\n\
             \r\n"
        );
    }

    #[test]
    fn test_msearch_lines_end_with_crlf() {
        let msearch = build_msearch(&DiscoveryConfig::default(), SSDP_ALL);

        assert!(msearch.ends_with("\r\n\r\n"));
        assert_eq!(msearch.matches('\n').count(), msearch.matches("\r\n").count());
        assert!(msearch.contains("ST: ssdp:all\r\n"));
    }

    #[test]
    fn test_parse_location() {
        let r = response("LOCATION: http://192.168.1.5:8080/desc.xml\r\n");
        assert_eq!(parse_location(&r), Some("http://192.168.1.5:8080/desc.xml".to_string()));
    }

    #[test]
    fn test_parse_location_case_insensitive() {
        let r = response("Location:http://192.168.1.5:8080/desc.xml  \r\n");
        assert_eq!(parse_location(&r), Some("http://192.168.1.5:8080/desc.xml".to_string()));

        let r = response("location: http://10.0.0.2/d.xml\r\n");
        assert_eq!(parse_location(&r), Some("http://10.0.0.2/d.xml".to_string()));
    }

    #[test]
    fn test_parse_location_missing() {
        assert_eq!(parse_location(&response("")), None);
        assert_eq!(parse_location(""), None);
        assert_eq!(parse_location("LOC"), None);
    }

    #[test]
    fn test_seen_locations_dedup() {
        let mut seen = SeenLocations::new();
        let r = response("LOCATION: http://192.168.1.5:8080/desc.xml\r\n");

        assert_eq!(
            seen.observe(&r),
            Observation::New("http://192.168.1.5:8080/desc.xml".to_string())
        );
        assert_eq!(
            seen.observe(&r),
            Observation::Duplicate("http://192.168.1.5:8080/desc.xml".to_string())
        );
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_seen_locations_ignores_missing_header() {
        let mut seen = SeenLocations::new();

        assert_eq!(seen.observe(&response("")), Observation::NoLocation);
        assert_eq!(seen.observe("garbage"), Observation::NoLocation);
        assert!(seen.is_empty());
    }

    #[test]
    fn test_seen_locations_exact_match() {
        let mut seen = SeenLocations::new();

        seen.observe(&response("LOCATION: http://192.168.1.5:8080/desc.xml\r\n"));
        let other = seen.observe(&response("LOCATION: http://192.168.1.5:8080/desc.xml?x\r\n"));

        assert!(matches!(other, Observation::New(_)));
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_target() {
        let config = DiscoveryConfig {
            multicast_addr: "not an address".to_string(),
            ..Default::default()
        };
        let fetcher = Arc::new(DescriptionFetcher::new(&config).unwrap());
        let discovery = SsdpDiscovery::new(config, fetcher);
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = discovery.discover(tx).await;
        assert!(matches!(result, Err(DiscoveryError::InvalidTarget(_))));
    }

    #[tokio::test]
    async fn test_socket_error_ends_window_early() {
        let config = DiscoveryConfig {
            receive_timeout_ms: 60_000,
            ..Default::default()
        };
        let fetcher = Arc::new(DescriptionFetcher::new(&config).unwrap());
        let discovery = SsdpDiscovery::new(config, fetcher);

        let sent = Arc::new(Mutex::new(Vec::new()));
        let socket = ScriptedSocket {
            datagrams: Mutex::new(VecDeque::from(vec![
                response(""),
                // Nothing listens on the discard port, so the fetch fails fast
                response("LOCATION: http://127.0.0.1:9/desc.xml\r\n"),
                response("LOCATION: http://127.0.0.1:9/desc.xml\r\n"),
            ])),
            sent: sent.clone(),
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let target = SocketAddr::from(([239, 255, 255, 250], 1900));

        let run = discovery.run(socket, target, tx);
        let report = tokio::time::timeout(Duration::from_secs(10), run)
            .await
            .expect("socket error should end the receive loop");

        assert_eq!(report.responses, 3);
        assert_eq!(report.locations, 1);
        assert_eq!(report.devices, 0);
        assert!(rx.try_recv().is_err());

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].contains("ST: urn:schemas-upnp-org:device:MediaRenderer:1\r\n"));
        assert!(sent[1].contains("ST: ssdp:all\r\n"));
    }
}
