//! End-to-end resolution against a scripted delegation chain served
//! over loopback UDP: a mock root referring to a mock TLD referring to
//! a mock authoritative server.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;

use dns_wire::types::test_util::*;
use dns_wire::types::{Message, Rcode, RecordType};
use recursor::resolver::{Resolver, ResolverConfig};

const ROOT_IP: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 1);
const TLD_IP: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 2);
const AUTH_IP: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 3);

const WEB_IP: Ipv4Addr = Ipv4Addr::new(93, 184, 216, 34);

/// Bind the three mock servers on one shared port.  The root picks an
/// ephemeral port; if it happens to be taken on the other loopback
/// addresses, try again.
async fn bind_chain() -> (u16, UdpSocket, UdpSocket, UdpSocket) {
    loop {
        let root = UdpSocket::bind((ROOT_IP, 0)).await.unwrap();
        let port = root.local_addr().unwrap().port();
        let Ok(tld) = UdpSocket::bind((TLD_IP, port)).await else {
            continue;
        };
        let Ok(auth) = UdpSocket::bind((AUTH_IP, port)).await else {
            continue;
        };
        return (port, root, tld, auth);
    }
}

/// Answer every query on `socket` with `handler`, counting queries.
fn serve(
    socket: UdpSocket,
    queries: Arc<AtomicUsize>,
    handler: impl Fn(&Message) -> Message + Send + 'static,
) {
    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            let Ok((size, peer)) = socket.recv_from(&mut buf).await else {
                break;
            };
            queries.fetch_add(1, Ordering::SeqCst);
            let Ok(query) = Message::from_octets(&buf[..size]) else {
                continue;
            };
            let Ok(octets) = handler(&query).into_octets() else {
                continue;
            };
            let _ = socket.send_to(&octets, peer).await;
        }
    });
}

fn root_handler(query: &Message) -> Message {
    let mut response = query.make_response();
    response.authority = vec![ns_record("com.", "ns.tld-servers.test.")];
    response.additional = vec![a_record("ns.tld-servers.test.", TLD_IP)];
    response
}

fn tld_handler(query: &Message) -> Message {
    let mut response = query.make_response();
    response.authority = vec![ns_record("example.com.", "ns1.example.com.")];
    response.additional = vec![a_record("ns1.example.com.", AUTH_IP)];
    response
}

fn auth_handler(query: &Message) -> Message {
    let mut response = query.make_response();
    response.header.is_authoritative = true;

    let question = &query.questions[0];
    match question.name.to_dotted_string().as_str() {
        "example.com." => {
            response.answers = vec![a_record("example.com.", WEB_IP)];
        }
        "www.example.com." => {
            response.answers = vec![cname_record("www.example.com.", "example.com.")];
        }
        _ => {
            response.header.rcode = Rcode::NameError;
        }
    }
    response
}

struct MockHierarchy {
    resolver: Resolver,
    auth_queries: Arc<AtomicUsize>,
}

async fn start_mock_hierarchy() -> MockHierarchy {
    let (port, root, tld, auth) = bind_chain().await;

    let root_queries = Arc::new(AtomicUsize::new(0));
    let tld_queries = Arc::new(AtomicUsize::new(0));
    let auth_queries = Arc::new(AtomicUsize::new(0));

    serve(root, root_queries, root_handler);
    serve(tld, tld_queries, tld_handler);
    serve(auth, auth_queries.clone(), auth_handler);

    let resolver = Resolver::new(ResolverConfig {
        root_hints: vec![ROOT_IP],
        upstream_port: port,
        exchange_timeout: Duration::from_millis(1000),
    });

    MockHierarchy {
        resolver,
        auth_queries,
    }
}

#[tokio::test]
async fn resolves_through_the_delegation_chain() {
    let mock = start_mock_hierarchy().await;

    let answer = mock.resolver.resolve("example.com", "A").await;
    assert_eq!(vec![WEB_IP.to_string()], answer);

    // the answer was cached on the way out
    assert_eq!(
        Some(vec![WEB_IP.to_string()]),
        mock.resolver
            .cache()
            .get(&domain("example.com."), RecordType::A)
    );
}

#[tokio::test]
async fn second_resolution_is_served_from_cache() {
    let mock = start_mock_hierarchy().await;

    let first = mock.resolver.resolve("example.com", "A").await;
    let upstream_queries = mock.auth_queries.load(Ordering::SeqCst);

    let second = mock.resolver.resolve("example.com", "A").await;
    assert_eq!(first, second);
    assert_eq!(
        upstream_queries,
        mock.auth_queries.load(Ordering::SeqCst),
        "cached answer must not incur another exchange"
    );
}

#[tokio::test]
async fn chases_cnames_to_addresses() {
    let mock = start_mock_hierarchy().await;

    let answer = mock.resolver.resolve("www.example.com", "A").await;
    assert_eq!(vec![WEB_IP.to_string()], answer);
}

#[tokio::test]
async fn nxdomain_is_empty_and_negatively_cached() {
    let mock = start_mock_hierarchy().await;

    let answer = mock.resolver.resolve("missing.example.com", "A").await;
    assert!(answer.is_empty());
    assert!(mock
        .resolver
        .cache()
        .is_negative(&domain("missing.example.com."), RecordType::A));

    // answered from the negative cache: no further upstream traffic
    let upstream_queries = mock.auth_queries.load(Ordering::SeqCst);
    let again = mock.resolver.resolve("missing.example.com", "A").await;
    assert!(again.is_empty());
    assert_eq!(upstream_queries, mock.auth_queries.load(Ordering::SeqCst));
}

#[tokio::test]
async fn delegations_are_cached_for_later_resolutions() {
    let mock = start_mock_hierarchy().await;

    let _ = mock.resolver.resolve("example.com", "A").await;
    assert!(mock
        .resolver
        .cache()
        .get_delegation(&domain("example.com."))
        .is_some());
    assert!(mock
        .resolver
        .cache()
        .get_delegation(&domain("com."))
        .is_some());
}
