//! The iterative descent engine.
//!
//! A question enters, the cache is consulted, and on a miss the
//! resolver walks the delegation hierarchy: query a few servers picked
//! by the tracker, classify the response, and either finish (answer,
//! NXDOMAIN, dead end) or descend into the referred-to zone and go
//! again.  Nested resolutions - glueless nameservers and CNAME
//! targets - run through the same machinery on a shared depth budget.
//!
//! See section 5.3.3 of RFC 1034 for the overall algorithm.

use async_recursion::async_recursion;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::Instrument;

use dns_wire::types::{DomainName, Message, Question, Rcode, RecordClass, RecordData, RecordType};

use crate::cache::{SharedCache, NEGATIVE_TTL};
use crate::hints::ROOT_HINTS;
use crate::metrics::Metrics;
use crate::tracker::ServerTracker;
use crate::transport::{self, ExchangeOutcome};

/// Depth budget for one resolution, spent by delegation levels,
/// glueless-nameserver lookups, and CNAME chases alike.
///
/// This protects against maliciously deep delegations and CNAME
/// chains; sixteen levels is more than any real name needs.
pub const MAX_DEPTH: usize = 16;

/// Retry rounds per delegation level, after the first attempt.
pub const MAX_RETRIES: u32 = 2;

/// The inter-round sleep grows by this much each round.
pub const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Wall-clock budget for one public resolution.  Without it the worst
/// case is bounded only by retries x servers x depth x timeout.
pub const RESOLUTION_BUDGET: Duration = Duration::from_secs(10);

/// Configuration for a [`Resolver`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Where to start when no delegation is cached.
    pub root_hints: Vec<Ipv4Addr>,
    /// Port upstream nameservers are queried on.
    pub upstream_port: u16,
    /// Per-exchange timeout.
    pub exchange_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            root_hints: ROOT_HINTS.to_vec(),
            upstream_port: 53,
            exchange_timeout: transport::DEFAULT_TIMEOUT,
        }
    }
}

/// The resolver.  One instance is shared by all in-flight resolutions;
/// the cache and tracker inside are safe for concurrent use.
#[derive(Debug)]
pub struct Resolver {
    cache: SharedCache,
    tracker: ServerTracker,
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            cache: SharedCache::new(),
            tracker: ServerTracker::new(),
            config,
        }
    }

    /// The shared cache, for reclaim sweeps and size gauges.
    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Resolve a domain to the rdata strings of the requested type:
    /// addresses in dotted/colon form, CNAME/NS targets as absolute
    /// names, MX as `"PREFERENCE EXCHANGE"`.
    ///
    /// This never fails: NXDOMAIN, unreachable nameservers, and
    /// unsupported record types all surface as an empty list, with the
    /// cause logged.
    pub async fn resolve(&self, domain: &str, rtype: &str) -> Vec<String> {
        self.resolve_with_metrics(domain, rtype).await.1
    }

    /// Like [`resolve`](Self::resolve), also returning what happened
    /// along the way.
    pub async fn resolve_with_metrics(&self, domain: &str, rtype: &str) -> (Metrics, Vec<String>) {
        let mut metrics = Metrics::new();
        match self.try_resolve(domain, rtype, &mut metrics).await {
            Ok(answer) => (metrics, answer),
            Err(error) => {
                tracing::warn!(%domain, %rtype, %error, "resolution failed");
                (metrics, Vec::new())
            }
        }
    }

    async fn try_resolve(
        &self,
        domain: &str,
        rtype: &str,
        metrics: &mut Metrics,
    ) -> Result<Vec<String>, ResolutionError> {
        let qtype =
            RecordType::from_str(rtype).map_err(|_| ResolutionError::UnsupportedType)?;
        let qname = canonicalise(domain).ok_or(ResolutionError::InvalidName)?;

        let mut seen_cnames = HashSet::new();
        let span = tracing::error_span!("resolve", %qname, %qtype);
        match timeout(
            RESOLUTION_BUDGET,
            self.resolve_internal(&qname, qtype, MAX_DEPTH, &mut seen_cnames, metrics)
                .instrument(span),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ResolutionError::Timeout),
        }
    }

    #[async_recursion]
    async fn resolve_internal(
        &self,
        qname: &DomainName,
        qtype: RecordType,
        depth: usize,
        seen_cnames: &mut HashSet<DomainName>,
        metrics: &mut Metrics,
    ) -> Result<Vec<String>, ResolutionError> {
        if depth == 0 {
            tracing::debug!("hit depth limit");
            return Err(ResolutionError::RecursionLimit);
        }

        if let Some(answer) = self.cache.get(qname, qtype) {
            tracing::debug!(%qname, %qtype, "cache hit");
            metrics.cache_hit();
            return Ok(answer);
        }
        metrics.cache_miss();

        if self.cache.is_negative(qname, qtype) {
            tracing::debug!(%qname, %qtype, "negative cache hit");
            metrics.negative_hit();
            return Ok(Vec::new());
        }

        let question = Question {
            name: qname.clone(),
            qtype,
            qclass: RecordClass::IN,
        };
        let mut nameservers = self.initial_nameservers(qname);
        let mut budget = depth;

        while !nameservers.is_empty() {
            if budget == 0 {
                tracing::debug!("hit depth limit during descent");
                return Err(ResolutionError::RecursionLimit);
            }
            budget -= 1;

            let Some(response) = self.query_level(&nameservers, &question).await else {
                metrics.nameserver_miss();
                return Err(ResolutionError::DeadEnd {
                    question: question.clone(),
                });
            };

            match response.header.rcode {
                Rcode::NoError => metrics.nameserver_hit(),
                Rcode::NameError => {
                    tracing::debug!(%qname, %qtype, "name does not exist");
                    metrics.nameserver_hit();
                    self.cache.put_negative(qname, qtype, NEGATIVE_TTL);
                    return Ok(Vec::new());
                }
                rcode => {
                    // the retained fallback from a level where no
                    // server did better than an error rcode
                    tracing::debug!(%qname, %qtype, %rcode, "upstream error response");
                    metrics.nameserver_miss();
                    return Ok(Vec::new());
                }
            }

            let (direct, cname_targets, ttl) = answers_in(&response, qtype);
            if !direct.is_empty() || !cname_targets.is_empty() {
                let mut answer = direct;
                for target in cname_targets {
                    self.chase_cname(&target, qtype, budget, seen_cnames, metrics, &mut answer)
                        .await;
                }
                self.cache.put(qname, qtype, answer.clone(), ttl);
                return Ok(answer);
            }

            let Some(delegation) = delegation_in(&response) else {
                tracing::debug!(%qname, %qtype, "response carries neither answer nor delegation");
                return Ok(Vec::new());
            };

            let next = self
                .delegation_addresses(&delegation, budget, metrics)
                .await;
            if next.is_empty() {
                tracing::debug!(zone = %delegation.zone, "no nameserver of the delegation is resolvable");
                return Ok(Vec::new());
            }

            self.cache
                .put_delegation(&delegation.zone, next.clone(), delegation.ttl);
            tracing::trace!(zone = %delegation.zone, count = next.len(), "descending into delegation");
            nameservers = next;
        }

        Ok(Vec::new())
    }

    /// Follow one CNAME target, appending what it produces to the
    /// answer.  A-queries chase the target through a fresh resolution
    /// unless it was already chased in this resolve; everything else -
    /// non-A queries, repeated targets, failed or empty chases - gets
    /// the target itself as text.
    async fn chase_cname(
        &self,
        target: &DomainName,
        qtype: RecordType,
        depth: usize,
        seen_cnames: &mut HashSet<DomainName>,
        metrics: &mut Metrics,
        answer: &mut Vec<String>,
    ) {
        if qtype == RecordType::A && !seen_cnames.contains(target) {
            seen_cnames.insert(target.clone());
            metrics.cname_chase();
            match self
                .resolve_internal(target, RecordType::A, depth, seen_cnames, metrics)
                .await
            {
                Ok(addresses) if !addresses.is_empty() => answer.extend(addresses),
                Ok(_) => answer.push(target.to_dotted_string()),
                Err(error) => {
                    tracing::debug!(%target, %error, "cname chase failed");
                    answer.push(target.to_dotted_string());
                }
            }
        } else {
            answer.push(target.to_dotted_string());
        }
    }

    /// Turn a delegation into nameserver addresses: glue where the
    /// referral supplied it, a nested A lookup where it did not.  A
    /// nameserver which cannot be resolved is dropped.
    async fn delegation_addresses(
        &self,
        delegation: &Delegation,
        depth: usize,
        metrics: &mut Metrics,
    ) -> Vec<Ipv4Addr> {
        let mut addresses = Vec::with_capacity(delegation.nameservers.len());
        for ns_name in &delegation.nameservers {
            if let Some(&glued) = delegation.glue.get(ns_name) {
                addresses.push(glued);
                continue;
            }

            match self
                .resolve_internal(ns_name, RecordType::A, depth, &mut HashSet::new(), metrics)
                .await
            {
                Ok(resolved) => {
                    addresses.extend(resolved.iter().filter_map(|text| text.parse::<Ipv4Addr>().ok()));
                }
                Err(error) => {
                    tracing::debug!(%ns_name, %error, "dropping unresolvable nameserver");
                }
            }
        }
        addresses
    }

    /// One delegation level: query the candidate servers, as picked by
    /// the tracker, over up to `1 + MAX_RETRIES` rounds, until one of
    /// them produces a definitive response.  Error rcodes are kept as
    /// a fallback (the server was reachable, so its exchange counts as
    /// a success); timeouts and socket errors count against the
    /// server and move on to the next.
    async fn query_level(&self, candidates: &[Ipv4Addr], question: &Question) -> Option<Message> {
        let mut fallback = None;

        for round in 0..=MAX_RETRIES {
            if round > 0 {
                tracing::debug!(%round, %question, "retrying");
                sleep(RETRY_DELAY * round).await;
            }

            let selected = self.tracker.select(candidates);
            if selected.is_empty() {
                break;
            }

            for address in selected {
                self.tracker.start_query(address);
                let outcome = transport::exchange(
                    address,
                    self.config.upstream_port,
                    question,
                    self.config.exchange_timeout,
                )
                .await;
                self.tracker.end_query(address);

                match outcome {
                    Ok(ExchangeOutcome { response, rtt }) => {
                        self.tracker.record_success(
                            address,
                            u64::try_from(rtt.as_millis()).unwrap_or(u64::MAX),
                        );
                        match response.header.rcode {
                            Rcode::NoError | Rcode::NameError => return Some(response),
                            Rcode::ServerFailure => {
                                tracing::debug!(%address, "SERVFAIL, trying next server");
                                fallback = Some(response);
                            }
                            rcode => {
                                tracing::warn!(%address, %rcode, "error rcode from nameserver");
                                fallback = Some(response);
                            }
                        }
                    }
                    Err(error) => {
                        tracing::debug!(%address, %error, "exchange failed");
                        self.tracker.record_failure(address);
                    }
                }
            }
        }

        fallback
    }

    /// The working nameserver set to start from: the deepest cached
    /// delegation covering the name, else the root hints.
    fn initial_nameservers(&self, qname: &DomainName) -> Vec<Ipv4Addr> {
        for i in 0..qname.labels.len() {
            if let Some(zone) = DomainName::from_labels(qname.labels[i..].to_vec()) {
                if let Some(nameservers) = self.cache.get_delegation(&zone) {
                    tracing::debug!(%zone, "starting from cached delegation");
                    return nameservers;
                }
            }
        }
        self.config.root_hints.clone()
    }
}

/// Append a label separator if there is none, and parse.  Lowercasing
/// happens inside the name type.
fn canonicalise(domain: &str) -> Option<DomainName> {
    if domain.ends_with('.') {
        DomainName::from_dotted_string(domain)
    } else {
        DomainName::from_dotted_string(&format!("{domain}."))
    }
}

/// Records in the answer section: rendered rdata of the queried type,
/// CNAME targets to follow (when the query is not itself for CNAMEs),
/// and the smallest TTL among the contributing records.
fn answers_in(response: &Message, qtype: RecordType) -> (Vec<String>, Vec<DomainName>, u32) {
    let mut direct = Vec::new();
    let mut cname_targets = Vec::new();
    let mut ttl = u32::MAX;

    for rr in &response.answers {
        if rr.rtype() == qtype {
            if let Some(text) = render_rdata(&rr.rdata) {
                direct.push(text);
                ttl = ttl.min(rr.ttl);
            }
        } else if let RecordData::CNAME { cname } = &rr.rdata {
            cname_targets.push(cname.clone());
            ttl = ttl.min(rr.ttl);
        }
    }

    if ttl == u32::MAX {
        ttl = 0;
    }
    (direct, cname_targets, ttl)
}

/// Rdata as answer text.  `None` for the types the resolver does not
/// interpret.
fn render_rdata(rdata: &RecordData) -> Option<String> {
    match rdata {
        RecordData::A { address } => Some(address.to_string()),
        RecordData::AAAA { address } => Some(address.to_string()),
        RecordData::CNAME { cname } => Some(cname.to_dotted_string()),
        RecordData::NS { nsdname } => Some(nsdname.to_dotted_string()),
        RecordData::MX {
            preference,
            exchange,
        } => Some(format!("{preference} {}", exchange.to_dotted_string())),
        RecordData::OPT { .. } | RecordData::Unknown { .. } => None,
    }
}

/// A referral mined out of a response: the delegated zone, its
/// nameserver names in the order the authority section gave them, and
/// whatever glue addresses the additional section supplied.
#[derive(Debug, Clone, Eq, PartialEq)]
struct Delegation {
    zone: DomainName,
    nameservers: Vec<DomainName>,
    glue: HashMap<DomainName, Ipv4Addr>,
    ttl: u32,
}

/// The delegation in a response, if its authority section carries NS
/// records.
fn delegation_in(response: &Message) -> Option<Delegation> {
    let mut zone = None;
    let mut nameservers = Vec::new();
    let mut ttl = u32::MAX;

    for rr in &response.authority {
        if let RecordData::NS { nsdname } = &rr.rdata {
            if zone.is_none() {
                zone = Some(rr.name.clone());
            }
            if !nameservers.contains(nsdname) {
                nameservers.push(nsdname.clone());
            }
            ttl = ttl.min(rr.ttl);
        }
    }
    let zone = zone?;

    let mut glue = HashMap::new();
    for rr in &response.additional {
        if let RecordData::A { address } = &rr.rdata {
            if nameservers.contains(&rr.name) {
                glue.entry(rr.name.clone()).or_insert(*address);
            }
        }
    }

    Some(Delegation {
        zone,
        nameservers,
        glue,
        ttl: if ttl == u32::MAX { 0 } else { ttl },
    })
}

/// An error along the way to an answer.  None of these escape the
/// public boundary: `resolve` recovers them all into an empty answer.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ResolutionError {
    /// The wall-clock budget ran out.
    Timeout,
    /// The depth budget ran out: the delegation or CNAME chain is too
    /// deep.
    RecursionLimit,
    /// No nameserver along the way would answer.
    DeadEnd { question: Question },
    /// The requested record type is not one this resolver answers.
    UnsupportedType,
    /// The domain is not a well-formed name.
    InvalidName,
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResolutionError::Timeout => write!(f, "timed out"),
            ResolutionError::RecursionLimit => write!(f, "hit the depth limit"),
            ResolutionError::DeadEnd { question } => {
                write!(f, "unable to answer '{question}'")
            }
            ResolutionError::UnsupportedType => write!(f, "unsupported record type"),
            ResolutionError::InvalidName => write!(f, "invalid domain name"),
        }
    }
}

impl std::error::Error for ResolutionError {}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv6Addr;

    use dns_wire::types::test_util::*;

    fn response_with(
        answers: Vec<dns_wire::types::ResourceRecord>,
        authority: Vec<dns_wire::types::ResourceRecord>,
        additional: Vec<dns_wire::types::ResourceRecord>,
    ) -> Message {
        let request = Message::from_question(
            1234,
            Question {
                name: domain("www.example.com."),
                qtype: RecordType::A,
                qclass: RecordClass::IN,
            },
        );
        let mut response = request.make_response();
        response.answers = answers;
        response.authority = authority;
        response.additional = additional;
        response
    }

    #[test]
    fn canonicalise_appends_separator_and_lowercases() {
        assert_eq!(Some(domain("example.com.")), canonicalise("Example.COM"));
        assert_eq!(Some(domain("example.com.")), canonicalise("example.com."));
        assert_eq!(None, canonicalise("bad..name"));
    }

    #[test]
    fn render_rdata_formats() {
        assert_eq!(
            Some("192.0.2.1".to_string()),
            render_rdata(&RecordData::A {
                address: Ipv4Addr::new(192, 0, 2, 1)
            })
        );
        assert_eq!(
            Some("2001:db8::1".to_string()),
            render_rdata(&RecordData::AAAA {
                address: Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)
            })
        );
        assert_eq!(
            Some("10 mail.example.com.".to_string()),
            render_rdata(&RecordData::MX {
                preference: 10,
                exchange: domain("mail.example.com.")
            })
        );
        assert_eq!(
            Some("ns1.example.com.".to_string()),
            render_rdata(&RecordData::NS {
                nsdname: domain("ns1.example.com.")
            })
        );
    }

    #[test]
    fn answers_in_splits_direct_and_cnames() {
        let response = response_with(
            vec![
                cname_record("www.example.com.", "example.com."),
                a_record("example.com.", Ipv4Addr::new(1, 1, 1, 1)),
            ],
            Vec::new(),
            Vec::new(),
        );

        let (direct, cname_targets, ttl) = answers_in(&response, RecordType::A);
        assert_eq!(vec!["1.1.1.1".to_string()], direct);
        assert_eq!(vec![domain("example.com.")], cname_targets);
        assert_eq!(300, ttl);
    }

    #[test]
    fn answers_in_takes_minimum_ttl() {
        let mut short_lived = a_record("www.example.com.", Ipv4Addr::new(1, 1, 1, 1));
        short_lived.ttl = 30;
        let response = response_with(
            vec![
                a_record("www.example.com.", Ipv4Addr::new(2, 2, 2, 2)),
                short_lived,
            ],
            Vec::new(),
            Vec::new(),
        );

        let (direct, _, ttl) = answers_in(&response, RecordType::A);
        assert_eq!(2, direct.len());
        assert_eq!(30, ttl);
    }

    #[test]
    fn answers_in_cname_query_returns_targets_directly() {
        let response = response_with(
            vec![cname_record("www.example.com.", "example.com.")],
            Vec::new(),
            Vec::new(),
        );

        let (direct, cname_targets, _) = answers_in(&response, RecordType::CNAME);
        assert_eq!(vec!["example.com.".to_string()], direct);
        assert!(cname_targets.is_empty());
    }

    #[test]
    fn delegation_in_collects_ns_and_matching_glue() {
        let response = response_with(
            Vec::new(),
            vec![
                ns_record("com.", "a.gtld-servers.net."),
                ns_record("com.", "b.gtld-servers.net."),
                ns_record("com.", "a.gtld-servers.net."),
            ],
            vec![
                a_record("a.gtld-servers.net.", Ipv4Addr::new(192, 5, 6, 30)),
                a_record("unrelated.example.net.", Ipv4Addr::new(9, 9, 9, 9)),
            ],
        );

        let delegation = delegation_in(&response).unwrap();
        assert_eq!(domain("com."), delegation.zone);
        assert_eq!(
            vec![domain("a.gtld-servers.net."), domain("b.gtld-servers.net.")],
            delegation.nameservers
        );
        assert_eq!(1, delegation.glue.len());
        assert_eq!(
            Some(&Ipv4Addr::new(192, 5, 6, 30)),
            delegation.glue.get(&domain("a.gtld-servers.net."))
        );
        assert_eq!(300, delegation.ttl);
    }

    #[test]
    fn delegation_in_requires_ns_records() {
        let response = response_with(Vec::new(), Vec::new(), Vec::new());
        assert_eq!(None, delegation_in(&response));
    }

    #[tokio::test]
    async fn resolve_rejects_unsupported_types() {
        let resolver = Resolver::new(ResolverConfig::default());
        assert!(resolver.resolve("example.com", "TXT").await.is_empty());
        assert!(resolver.resolve("example.com", "OPT").await.is_empty());
        assert!(resolver.resolve("example.com", "bogus").await.is_empty());
    }

    #[tokio::test]
    async fn resolve_rejects_invalid_names() {
        let resolver = Resolver::new(ResolverConfig::default());
        assert!(resolver.resolve("bad..name", "A").await.is_empty());
    }

    #[tokio::test]
    async fn resolve_answers_from_cache_without_network() {
        let resolver = Resolver::new(ResolverConfig {
            // nowhere to go if the cache misses
            root_hints: Vec::new(),
            ..ResolverConfig::default()
        });
        resolver.cache().put(
            &domain("example.com."),
            RecordType::A,
            vec!["93.184.216.34".to_string()],
            60,
        );

        let (metrics, answer) = resolver.resolve_with_metrics("Example.Com", "A").await;
        assert_eq!(vec!["93.184.216.34".to_string()], answer);
        assert_eq!(1, metrics.cache_hits);
        assert_eq!(0, metrics.nameserver_hits);
    }

    #[tokio::test]
    async fn resolve_honours_negative_cache() {
        let resolver = Resolver::new(ResolverConfig {
            root_hints: Vec::new(),
            ..ResolverConfig::default()
        });
        resolver
            .cache()
            .put_negative(&domain("missing.example.com."), RecordType::A, 60);

        let (metrics, answer) = resolver.resolve_with_metrics("missing.example.com", "A").await;
        assert!(answer.is_empty());
        assert_eq!(1, metrics.negative_hits);
    }
}
