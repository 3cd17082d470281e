//! Metrics definitions for the flag SDK.

use shared::metrics_defs::{MetricDef, MetricType};

pub const CACHE_HIT: MetricDef = MetricDef {
    name: "flagsvc.cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of document lookups served from the cache. Tagged with outcome.",
};

pub const CACHE_MISS: MetricDef = MetricDef {
    name: "flagsvc.cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of document lookups that required a fetch",
};

pub const FETCH_DURATION: MetricDef = MetricDef {
    name: "flagsvc.fetch.duration",
    metric_type: MetricType::Histogram,
    description: "Time to fetch and decode a host document in seconds",
};

pub const FETCH_ERROR: MetricDef = MetricDef {
    name: "flagsvc.fetch.error",
    metric_type: MetricType::Counter,
    description: "Number of failed document fetches. Tagged with kind.",
};

pub const RESOLVE_ERROR: MetricDef = MetricDef {
    name: "flagsvc.resolve.error",
    metric_type: MetricType::Counter,
    description: "Number of flag lookups that returned an error. Tagged with kind.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    CACHE_HIT,
    CACHE_MISS,
    FETCH_DURATION,
    FETCH_ERROR,
    RESOLVE_ERROR,
];
