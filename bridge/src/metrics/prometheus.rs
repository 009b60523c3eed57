use prometheus::{Encoder, IntCounter, IntGauge, TextEncoder};
use prometheus::core::Collector;
use std::sync::OnceLock;

static RPC_REQUESTS: OnceLock<IntCounter> = OnceLock::new();
static RPC_ERRORS: OnceLock<IntCounter> = OnceLock::new();
static TEMPLATE_FETCHES: OnceLock<IntCounter> = OnceLock::new();
static TEMPLATE_FETCH_ERRORS: OnceLock<IntCounter> = OnceLock::new();
static TEMPLATE_PUBLISHES: OnceLock<IntCounter> = OnceLock::new();
static TEMPLATE_PUBLISH_ERRORS: OnceLock<IntCounter> = OnceLock::new();

static TEMPLATE_CACHED: OnceLock<IntGauge> = OnceLock::new();
static TEMPLATE_DAA_SCORE: OnceLock<IntGauge> = OnceLock::new();
static REDIS_UP: OnceLock<IntGauge> = OnceLock::new();

fn rpc_requests() -> &'static IntCounter {
    RPC_REQUESTS
        .get_or_init(|| IntCounter::new("rpc_requests_total", "Total RPC requests to kaspad").unwrap())
}

fn rpc_errors() -> &'static IntCounter {
    RPC_ERRORS.get_or_init(|| IntCounter::new("rpc_errors_total", "Total RPC errors").unwrap())
}

fn template_fetches() -> &'static IntCounter {
    TEMPLATE_FETCHES.get_or_init(|| {
        IntCounter::new("template_fetches_total", "Total successful template fetches").unwrap()
    })
}

fn template_fetch_errors() -> &'static IntCounter {
    TEMPLATE_FETCH_ERRORS.get_or_init(|| {
        IntCounter::new(
            "template_fetch_errors_total",
            "Total template fetch errors",
        )
        .unwrap()
    })
}

fn template_publishes() -> &'static IntCounter {
    TEMPLATE_PUBLISHES.get_or_init(|| {
        IntCounter::new("template_publishes_total", "Total templates published to Redis").unwrap()
    })
}

fn template_publish_errors() -> &'static IntCounter {
    TEMPLATE_PUBLISH_ERRORS.get_or_init(|| {
        IntCounter::new(
            "template_publish_errors_total",
            "Total failed template publishes (serialization or transport)",
        )
        .unwrap()
    })
}

fn template_cached() -> &'static IntGauge {
    TEMPLATE_CACHED.get_or_init(|| IntGauge::new("template_cached", "A template is cached (1/0)").unwrap())
}

fn template_daa_score() -> &'static IntGauge {
    TEMPLATE_DAA_SCORE
        .get_or_init(|| IntGauge::new("template_daa_score", "DAA score of the cached template").unwrap())
}

fn redis_up() -> &'static IntGauge {
    REDIS_UP.get_or_init(|| IntGauge::new("redis_up", "Redis reachable (1/0)").unwrap())
}

pub fn inc_rpc_requests() {
    rpc_requests().inc();
}

pub fn inc_rpc_errors() {
    rpc_errors().inc();
}

pub fn inc_template_fetches() {
    template_fetches().inc();
}

pub fn inc_template_fetch_errors() {
    template_fetch_errors().inc();
}

pub fn inc_template_publishes() {
    template_publishes().inc();
}

pub fn inc_template_publish_errors() {
    template_publish_errors().inc();
}

pub fn set_template_cached(daa_score: u64) {
    template_cached().set(1);
    template_daa_score().set(daa_score as i64);
}

pub fn set_redis_up(up: bool) {
    redis_up().set(if up { 1 } else { 0 });
}

#[cfg(test)]
pub(crate) fn redis_up_value() -> i64 {
    redis_up().get()
}

pub fn render() -> String {
    let enc = TextEncoder::new();
    let mut mfs = Vec::new();

    mfs.extend(rpc_requests().collect());
    mfs.extend(rpc_errors().collect());
    mfs.extend(template_fetches().collect());
    mfs.extend(template_fetch_errors().collect());
    mfs.extend(template_publishes().collect());
    mfs.extend(template_publish_errors().collect());
    mfs.extend(template_cached().collect());
    mfs.extend(template_daa_score().collect());
    mfs.extend(redis_up().collect());

    let mut buf = Vec::new();
    let _ = enc.encode(&mfs, &mut buf);
    String::from_utf8_lossy(&buf).to_string()
}
