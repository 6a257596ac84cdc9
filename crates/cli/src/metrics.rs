//! Prometheus registry for a crawl run.
//!
//! The binary has no HTTP surface, so the registry is encoded once at the end
//! of the run and logged.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntGauge, Registry, TextEncoder};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Albums in the catalog after the run.
pub static CATALOG_ALBUMS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("ostcat_catalog_albums", "Albums stored in the catalog").unwrap()
});

/// Tracks in the catalog after the run.
pub static CATALOG_TRACKS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("ostcat_catalog_tracks", "Tracks stored in the catalog").unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(CATALOG_ALBUMS.clone()))
        .unwrap();
    registry
        .register(Box::new(CATALOG_TRACKS.clone()))
        .unwrap();

    for metric in ostcat_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
