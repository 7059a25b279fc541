use crate::client_config::{ClientConfig, OperationMode};

/// Internal validation, called automatically during `ClientConfig::from_str`
/// / `load`.
pub(crate) fn validate(config: &ClientConfig) -> anyhow::Result<()> {
    for (name, value) in [
        ("split_sync_period_sec", config.split_sync_period_sec),
        ("segment_sync_period_sec", config.segment_sync_period_sec),
        (
            "impressions_flush_period_sec",
            config.impressions_flush_period_sec,
        ),
        (
            "counters_flush_period_sec",
            config.counters_flush_period_sec,
        ),
        ("gauges_flush_period_sec", config.gauges_flush_period_sec),
        (
            "latencies_flush_period_sec",
            config.latencies_flush_period_sec,
        ),
    ] {
        if value == 0 {
            anyhow::bail!("{name} must be > 0");
        }
    }

    if config.operation_mode == OperationMode::Remote && config.remote.host.trim().is_empty() {
        anyhow::bail!("operation_mode = \"remote\" requires a non-empty remote.host");
    }

    for (name, url) in [
        ("advanced.sdk_url", &config.advanced.sdk_url),
        ("advanced.events_url", &config.advanced.events_url),
    ] {
        if !has_url_scheme(url) {
            anyhow::bail!("{name} must be a URL with a scheme, got {url:?}");
        }
    }

    Ok(())
}

/// Minimal "looks like a URL" check: a scheme, `://`, then a non-empty rest.
/// `split-config` doesn't pull in a full URL-parsing crate since transport
/// itself is out of scope for this core.
fn has_url_scheme(s: &str) -> bool {
    match s.split_once("://") {
        Some((scheme, rest)) => {
            !scheme.is_empty()
                && !rest.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        }
        None => false,
    }
}
