use axum::{http::StatusCode, routing};
use prometheus::{
    opts, register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::net::SocketAddr;
use std::sync::LazyLock;

pub const RESPONSE_TIME_BUCKETS: &[f64] = &[
    0.0010, // 1    ms
    0.0050, // 5    ms
    0.0100, // 10   ms
    0.0250, // 25   ms
    0.0500, // 50   ms
    0.1000, // 100  ms
    0.2500, // 250  ms
    0.5000, // 500  ms
    1.0000, // 1     s
    2.5000, // 2.5   s
    5.0000, // 5     s
    10.000, // 10    s
];

pub const REFUSED_FOR_MULTIPLE_QUESTIONS: &str = "multiple_questions";

pub static DNS_REQUESTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "dns_requests_total",
        "Total number of DNS requests received, whether valid or invalid."
    ))
    .unwrap()
});

pub static DNS_REQUESTS_REFUSED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        opts!(
            "dns_requests_refused_total",
            "Total number of DNS requests refused."
        ),
        &["reason"]
    )
    .unwrap()
});

pub static DNS_RESPONSES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        opts!("dns_responses_total", "Total number of DNS responses sent."),
        &["rcode"]
    )
    .unwrap()
});

pub static DNS_RESPONSE_TIME_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "dns_response_time_seconds",
        "Response time of DNS requests, whether valid or invalid.",
        RESPONSE_TIME_BUCKETS.to_vec()
    )
    .unwrap()
});

pub static RESOLVER_CACHE_HIT_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "resolver_cache_hit_total",
        "Total number of questions answered from the positive cache."
    ))
    .unwrap()
});

pub static RESOLVER_CACHE_MISS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "resolver_cache_miss_total",
        "Total number of questions which had to go upstream."
    ))
    .unwrap()
});

pub static RESOLVER_NEGATIVE_HIT_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "resolver_negative_hit_total",
        "Total number of questions cut short by the negative cache."
    ))
    .unwrap()
});

pub static RESOLVER_NAMESERVER_HIT_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "resolver_nameserver_hit_total",
        "Total number of delegation levels answered by some upstream nameserver."
    ))
    .unwrap()
});

pub static RESOLVER_NAMESERVER_MISS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "resolver_nameserver_miss_total",
        "Total number of delegation levels where every upstream attempt failed."
    ))
    .unwrap()
});

pub static RESOLVER_CNAME_CHASE_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "resolver_cname_chase_total",
        "Total number of CNAME targets chased."
    ))
    .unwrap()
});

pub static CACHE_SIZE: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!(opts!("cache_size", "Number of entries in the cache.")).unwrap()
});

pub static CACHE_EXPIRED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "cache_expired_total",
        "Number of entries the reclaim sweep has removed."
    ))
    .unwrap()
});

async fn get_metrics() -> (StatusCode, String) {
    match TextEncoder::new().encode_to_string(&prometheus::gather()) {
        Ok(metrics_str) => (StatusCode::OK, metrics_str),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub async fn serve_prometheus_endpoint_task(address: SocketAddr) -> std::io::Result<()> {
    let app = axum::Router::new().route("/metrics", routing::get(get_metrics));
    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
