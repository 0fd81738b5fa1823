use bytes::BytesMut;
use clap::Parser;
use std::collections::HashSet;
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

use dns_wire::types::{
    DomainName, Message, Opcode, Question, Rcode, RecordClass, RecordData, RecordType,
    ResourceRecord, HEADER_MASK_TC,
};
use recursor::cache::RECLAIM_INTERVAL;
use recursor::{Resolver, ResolverConfig};

mod metrics;
use metrics::*;

/// TTL stamped onto answer records sent to clients.  The resolver's
/// cache enforces its own, much shorter, lifetimes internally.
const ANSWER_TTL: u32 = 3600;

/// Largest response sent without truncation.
const MAX_UDP_RESPONSE: usize = 512;

fn triage(query: &Message) -> Result<Option<&'_ Question>, &'static str> {
    if query.questions.is_empty() {
        Ok(None)
    } else if query.questions.len() == 1 {
        Ok(Some(&query.questions[0]))
    } else {
        Err(REFUSED_FOR_MULTIPLE_QUESTIONS)
    }
}

/// Rdata parsed back out of the resolver's textual answer form.
fn parse_rdata(qtype: RecordType, text: &str) -> Option<RecordData> {
    match qtype {
        RecordType::A => text.parse().ok().map(|address| RecordData::A { address }),
        RecordType::AAAA => text
            .parse()
            .ok()
            .map(|address| RecordData::AAAA { address }),
        RecordType::CNAME => {
            DomainName::from_dotted_string(text).map(|cname| RecordData::CNAME { cname })
        }
        RecordType::NS => {
            DomainName::from_dotted_string(text).map(|nsdname| RecordData::NS { nsdname })
        }
        RecordType::MX => {
            let (preference, exchange) = text.split_once(' ')?;
            Some(RecordData::MX {
                preference: preference.parse().ok()?,
                exchange: DomainName::from_dotted_string(exchange)?,
            })
        }
        _ => None,
    }
}

fn build_answer_records(question: &Question, answers: &[String]) -> Vec<ResourceRecord> {
    let mut records = Vec::with_capacity(answers.len());
    for answer in answers {
        if let Some(rdata) = parse_rdata(question.qtype, answer) {
            records.push(ResourceRecord {
                name: question.name.clone(),
                rdata,
                rclass: RecordClass::IN,
                ttl: ANSWER_TTL,
            });
        } else {
            // e.g. a CNAME target returned for an A question whose
            // chase came up empty
            tracing::debug!(%answer, qtype = %question.qtype, "answer does not form a record");
        }
    }
    records
}

async fn resolve_and_build_response(resolver: &Resolver, query: Message) -> Message {
    let mut response = query.make_response();

    match triage(&query) {
        Err(reason) => {
            DNS_REQUESTS_REFUSED_TOTAL
                .with_label_values(&[reason])
                .inc();
            tracing::info!(%reason, "refused");
            response.header.rcode = Rcode::Refused;
        }
        Ok(None) => {}
        Ok(Some(question)) => {
            let (resolution_metrics, answers) = resolver
                .resolve_with_metrics(
                    &question.name.to_dotted_string(),
                    &question.qtype.to_string(),
                )
                .await;

            RESOLVER_CACHE_HIT_TOTAL.inc_by(resolution_metrics.cache_hits);
            RESOLVER_CACHE_MISS_TOTAL.inc_by(resolution_metrics.cache_misses);
            RESOLVER_NEGATIVE_HIT_TOTAL.inc_by(resolution_metrics.negative_hits);
            RESOLVER_NAMESERVER_HIT_TOTAL.inc_by(resolution_metrics.nameserver_hits);
            RESOLVER_NAMESERVER_MISS_TOTAL.inc_by(resolution_metrics.nameserver_misses);
            RESOLVER_CNAME_CHASE_TOTAL.inc_by(resolution_metrics.cname_chases);

            if answers.is_empty() {
                response.header.rcode = Rcode::NameError;
            } else {
                response.answers = build_answer_records(question, &answers);
            }

            tracing::info!(
                question = %question,
                answers = answers.len(),
                cache_hits = resolution_metrics.cache_hits,
                nameserver_hits = resolution_metrics.nameserver_hits,
                "resolved"
            );
        }
    }

    response
}

async fn handle_raw_message(resolver: &Resolver, buf: &[u8]) -> Option<Message> {
    let parsed = Message::from_octets(buf);
    tracing::debug!(message = ?parsed, "got message");

    match parsed {
        Ok(message) => {
            if message.header.is_response {
                // Do not respond to response messages: an inbound
                // message could spoof its source address and port to
                // match ours, making the server answer itself forever.
                None
            } else if message.header.opcode == Opcode::Standard {
                Some(resolve_and_build_response(resolver, message).await)
            } else {
                let mut response = message.make_response();
                response.header.rcode = Rcode::NotImplemented;
                Some(response)
            }
        }
        Err(error) => error.id().map(Message::make_format_error_response),
    }
}

/// Write a serialised response to a client, truncating and setting the
/// TC flag if it does not fit a plain UDP payload.
async fn send_response_to(
    socket: &UdpSocket,
    target: SocketAddr,
    octets: &mut [u8],
) -> Result<(), std::io::Error> {
    debug_assert!(octets.len() >= 12);

    if octets.len() > MAX_UDP_RESPONSE {
        octets[2] |= HEADER_MASK_TC;
        socket.send_to(&octets[..MAX_UDP_RESPONSE], target).await?;
    } else {
        octets[2] &= !HEADER_MASK_TC;
        socket.send_to(octets, target).await?;
    }

    Ok(())
}

async fn listen_udp_task(resolver: Arc<Resolver>, socket: UdpSocket) {
    let (tx, mut rx) = mpsc::channel::<(Message, SocketAddr, prometheus::HistogramTimer)>(32);
    let mut buf = vec![0u8; 4096];

    loop {
        tokio::select! {
            Ok((size, peer)) = socket.recv_from(&mut buf) => {
                tracing::debug!(?peer, "request");
                DNS_REQUESTS_TOTAL.inc();
                let bytes = BytesMut::from(&buf[..size]);
                let reply = tx.clone();
                let resolver = resolver.clone();
                tokio::spawn(async move {
                    let response_timer = DNS_RESPONSE_TIME_SECONDS.start_timer();
                    if let Some(response) = handle_raw_message(&resolver, bytes.as_ref()).await {
                        if let Err(error) = reply.send((response, peer, response_timer)).await {
                            tracing::debug!(?peer, %error, "response channel closed");
                        }
                    }
                });
            }

            Some((response, peer, response_timer)) = rx.recv() => {
                DNS_RESPONSES_TOTAL
                    .with_label_values(&[&response.header.rcode.to_string()])
                    .inc();
                match response.into_octets() {
                    Ok(mut serialised) => {
                        if let Err(error) = send_response_to(&socket, peer, &mut serialised).await {
                            tracing::debug!(?peer, %error, "send error");
                        }
                    }
                    Err(error) => {
                        tracing::warn!(?peer, %error, "could not serialise response");
                    }
                }
                response_timer.observe_duration();
            }
        }
    }
}

/// Delete expired cache entries every reclaim interval.
async fn reclaim_cache_task(resolver: Arc<Resolver>) {
    loop {
        sleep(RECLAIM_INTERVAL).await;
        let removed = resolver.cache().remove_expired();

        CACHE_SIZE.set(resolver.cache().len().try_into().unwrap_or(i64::MAX));
        CACHE_EXPIRED_TOTAL.inc_by(removed.try_into().unwrap_or(u64::MAX));

        if removed > 0 {
            tracing::info!(%removed, "reclaimed expired cache entries");
        }
    }
}

async fn shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(error) => {
            tracing::error!(?error, "could not subscribe to SIGTERM");
            process::exit(1);
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => (),
        _ = sigterm.recv() => (),
    }
}

fn begin_logging() {
    let log_format = if let Ok(var) = env::var("RUST_LOG_FORMAT") {
        var.split(',').map(String::from).collect()
    } else {
        HashSet::new()
    };

    let logger = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(!log_format.contains("no-ansi"));

    if log_format.contains("json") {
        logger.json().init();
    } else if log_format.contains("compact") {
        logger.compact().init();
    } else {
        logger.init();
    }
}

// the doc comments for this struct turn into the CLI help text
#[derive(Debug, Clone, Parser)]
/// A recursive DNS resolver for IPv4 networks.
///
/// rootward answers A, AAAA, CNAME, MX, and NS questions by walking
/// the delegation hierarchy itself, starting from the root servers; it
/// needs no upstream resolver.  Answers, delegations, and name errors
/// are cached, and upstream nameservers are picked by measured
/// performance.
///
/// Prometheus metrics are served at
/// "http://{metrics_interface}/metrics".
struct Args {
    /// Address to listen on
    #[clap(short, long, value_parser, default_value_t = IpAddr::from(Ipv4Addr::UNSPECIFIED))]
    interface: IpAddr,

    /// Port to listen on (53 requires privilege)
    #[clap(short, long, value_parser, default_value_t = 53, env = "ROOTWARD_PORT")]
    port: u16,

    /// Interface to listen on (in `ip:port` form) to serve Prometheus
    /// metrics
    #[clap(long, value_parser, default_value_t = SocketAddr::from((Ipv4Addr::LOCALHOST, 9420)))]
    metrics_interface: SocketAddr,

    /// Per-exchange upstream timeout, in milliseconds
    #[clap(long, value_parser, default_value_t = 3000)]
    upstream_timeout_ms: u64,

    /// Port to query upstream nameservers on
    #[clap(long, value_parser, default_value_t = 53)]
    upstream_port: u16,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    begin_logging();

    let resolver = Arc::new(Resolver::new(ResolverConfig {
        upstream_port: args.upstream_port,
        exchange_timeout: Duration::from_millis(args.upstream_timeout_ms),
        ..ResolverConfig::default()
    }));

    let interface = SocketAddr::from((args.interface, args.port));
    tracing::info!(%interface, "binding DNS UDP socket");
    let socket = match UdpSocket::bind(interface).await {
        Ok(socket) => socket,
        Err(error) => {
            tracing::error!(?error, "could not bind DNS UDP socket");
            process::exit(1);
        }
    };

    tokio::spawn(listen_udp_task(resolver.clone(), socket));
    tokio::spawn(reclaim_cache_task(resolver));

    tracing::info!(interface = %args.metrics_interface, "binding HTTP TCP socket");
    tokio::select! {
        result = serve_prometheus_endpoint_task(args.metrics_interface) => {
            if let Err(error) = result {
                tracing::error!(?error, "could not bind HTTP TCP socket");
                process::exit(1);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutting down");
        }
    }
}
