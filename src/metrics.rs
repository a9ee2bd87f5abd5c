//! Prometheus collectors for the webhook pipeline and the reaper.
//!
//! Every collector is registered against a registry owned by the `Metrics`
//! value rather than a process-wide default, so each server (and each test)
//! gets an isolated metric set.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::error::Result;

const NAMESPACE: &str = "regsweep";

/// Size distribution buckets, 1 MiB to 10 GiB.
const IMAGE_SIZE_BUCKETS: &[f64] = &[
    1_048_576.0,
    10_485_760.0,
    52_428_800.0,
    104_857_600.0,
    262_144_000.0,
    524_288_000.0,
    1_073_741_824.0,
    2_147_483_648.0,
    5_368_709_120.0,
    10_737_418_240.0,
];

/// Age buckets for overwritten images, 1 minute to 30 days.
const OVERWRITE_AGE_BUCKETS: &[f64] = &[
    60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0, 21_600.0, 43_200.0, 86_400.0, 172_800.0,
    604_800.0, 2_592_000.0,
];

pub struct Metrics {
    registry: Registry,

    pub webhook_events_total: IntCounterVec,
    pub images_tracked_total: IntCounter,
    pub digest_fetch_errors_total: IntCounter,
    pub image_size_fetch_errors_total: IntCounter,
    pub image_size_bytes: Histogram,

    pub tag_overwrites_total: IntCounterVec,
    pub immutable_tag_violations_total: IntCounterVec,
    pub overwritten_image_age_seconds: Histogram,

    pub images_reaped_total: IntCounter,
    pub reaper_cycle_errors_total: IntCounter,
    pub reaper_cycle_duration_seconds: Histogram,
    pub tracked_images: IntGauge,

    pub tracked_bytes_total: IntGauge,
    pub bytes_reclaimed_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let webhook_events_total = IntCounterVec::new(
            Opts::new(
                "webhook_events_total",
                "Total number of registry webhook events received.",
            )
            .namespace(NAMESPACE)
            .subsystem("hooks"),
            &["action"],
        )?;
        registry.register(Box::new(webhook_events_total.clone()))?;

        let images_tracked_total = IntCounter::with_opts(
            Opts::new(
                "images_tracked_total",
                "Total number of images added to TTL tracking.",
            )
            .namespace(NAMESPACE)
            .subsystem("hooks"),
        )?;
        registry.register(Box::new(images_tracked_total.clone()))?;

        let digest_fetch_errors_total = IntCounter::with_opts(
            Opts::new(
                "digest_fetch_errors_total",
                "Total failures fetching a manifest digest from the registry.",
            )
            .namespace(NAMESPACE)
            .subsystem("immutability"),
        )?;
        registry.register(Box::new(digest_fetch_errors_total.clone()))?;

        let image_size_fetch_errors_total = IntCounter::with_opts(
            Opts::new(
                "image_size_fetch_errors_total",
                "Total failures fetching image size from the registry.",
            )
            .namespace(NAMESPACE)
            .subsystem("hooks"),
        )?;
        registry.register(Box::new(image_size_fetch_errors_total.clone()))?;

        let image_size_bytes = Histogram::with_opts(
            HistogramOpts::new(
                "image_size_bytes",
                "Size distribution of tracked images in bytes.",
            )
            .namespace(NAMESPACE)
            .subsystem("storage")
            .buckets(IMAGE_SIZE_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(image_size_bytes.clone()))?;

        let tag_overwrites_total = IntCounterVec::new(
            Opts::new(
                "tag_overwrites_total",
                "Total tag overwrites detected (same tag, different digest).",
            )
            .namespace(NAMESPACE)
            .subsystem("immutability"),
            &["repository"],
        )?;
        registry.register(Box::new(tag_overwrites_total.clone()))?;

        let immutable_tag_violations_total = IntCounterVec::new(
            Opts::new(
                "immutable_tag_violations_total",
                "Total overwrite attempts blocked by immutability enforcement.",
            )
            .namespace(NAMESPACE)
            .subsystem("immutability"),
            &["repository", "tag"],
        )?;
        registry.register(Box::new(immutable_tag_violations_total.clone()))?;

        let overwritten_image_age_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "overwritten_image_age_seconds",
                "Age in seconds of the previous image when its tag was overwritten.",
            )
            .namespace(NAMESPACE)
            .subsystem("immutability")
            .buckets(OVERWRITE_AGE_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(overwritten_image_age_seconds.clone()))?;

        let images_reaped_total = IntCounter::with_opts(
            Opts::new(
                "images_reaped_total",
                "Total number of expired images deleted.",
            )
            .namespace(NAMESPACE)
            .subsystem("reaper"),
        )?;
        registry.register(Box::new(images_reaped_total.clone()))?;

        let reaper_cycle_errors_total = IntCounter::with_opts(
            Opts::new("cycle_errors_total", "Total number of failed reaper cycles.")
                .namespace(NAMESPACE)
                .subsystem("reaper"),
        )?;
        registry.register(Box::new(reaper_cycle_errors_total.clone()))?;

        let reaper_cycle_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "cycle_duration_seconds",
                "Duration of each reaper cycle in seconds.",
            )
            .namespace(NAMESPACE)
            .subsystem("reaper"),
        )?;
        registry.register(Box::new(reaper_cycle_duration_seconds.clone()))?;

        let tracked_images = IntGauge::with_opts(
            Opts::new(
                "tracked_images",
                "Current number of images being tracked for expiry.",
            )
            .namespace(NAMESPACE)
            .subsystem("reaper"),
        )?;
        registry.register(Box::new(tracked_images.clone()))?;

        let tracked_bytes_total = IntGauge::with_opts(
            Opts::new(
                "tracked_bytes_total",
                "Total storage in bytes currently tracked for expiry.",
            )
            .namespace(NAMESPACE)
            .subsystem("storage"),
        )?;
        registry.register(Box::new(tracked_bytes_total.clone()))?;

        let bytes_reclaimed_total = IntCounter::with_opts(
            Opts::new(
                "bytes_reclaimed_total",
                "Total storage in bytes reclaimed by deleting expired images.",
            )
            .namespace(NAMESPACE)
            .subsystem("storage"),
        )?;
        registry.register(Box::new(bytes_reclaimed_total.clone()))?;

        Ok(Metrics {
            registry,
            webhook_events_total,
            images_tracked_total,
            digest_fetch_errors_total,
            image_size_fetch_errors_total,
            image_size_bytes,
            tag_overwrites_total,
            immutable_tag_violations_total,
            overwritten_image_age_seconds,
            images_reaped_total,
            reaper_cycle_errors_total,
            reaper_cycle_duration_seconds,
            tracked_images,
            tracked_bytes_total,
            bytes_reclaimed_total,
        })
    }

    /// Render all collectors in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| crate::error::RegsweepError::Registry(format!("metrics encoding: {}", e)))
    }
}
