//! Tag-encoded time-to-live parsing.
//!
//! Tags carry their desired lifetime as a trailing duration token, e.g.
//! `1h`, `30m`, or `prod-24h`. Tags without a recognizable token fall back
//! to the configured default.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

static TTL_TOKEN: OnceLock<Regex> = OnceLock::new();

fn ttl_token() -> &'static Regex {
    TTL_TOKEN.get_or_init(|| Regex::new(r"(\d+)([smhdw])").expect("valid ttl token regex"))
}

/// Extract a duration from a tag. Best-effort substring scan; when a tag
/// contains multiple duration tokens the rightmost one wins. Returns `None`
/// for tags without any token.
pub fn parse_ttl(tag: &str) -> Option<Duration> {
    let caps = ttl_token().captures_iter(tag).last()?;
    let value: u64 = caps[1].parse().ok()?;
    let secs = match &caps[2] {
        "s" => value,
        "m" => value * 60,
        "h" => value * 3600,
        "d" => value * 86_400,
        "w" => value * 7 * 86_400,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

/// Resolve a parsed TTL against the configured bounds: missing → `default`,
/// otherwise clamped into `[0, max]`.
pub fn clamp_ttl(ttl: Option<Duration>, default: Duration, max: Duration) -> Duration {
    match ttl {
        None => default,
        Some(d) => d.min(max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_tokens() {
        assert_eq!(parse_ttl("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_ttl("30m"), Some(Duration::from_secs(1800)));
        assert_eq!(parse_ttl("45s"), Some(Duration::from_secs(45)));
        assert_eq!(parse_ttl("2d"), Some(Duration::from_secs(2 * 86_400)));
        assert_eq!(parse_ttl("1w"), Some(Duration::from_secs(7 * 86_400)));
    }

    #[test]
    fn parses_embedded_tokens() {
        assert_eq!(parse_ttl("prod-24h"), Some(Duration::from_secs(24 * 3600)));
        assert_eq!(parse_ttl("feature-x-30m"), Some(Duration::from_secs(1800)));
    }

    #[test]
    fn rightmost_token_wins() {
        // "release-1h-v2": the trailing "v2" has no unit, so 1h is the match.
        assert_eq!(parse_ttl("release-1h-v2"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_ttl("1h-then-30m"), Some(Duration::from_secs(1800)));
    }

    #[test]
    fn rejects_tags_without_tokens() {
        assert_eq!(parse_ttl("latest"), None);
        assert_eq!(parse_ttl("v2"), None);
        assert_eq!(parse_ttl(""), None);
        assert_eq!(parse_ttl("h1"), None);
    }

    #[test]
    fn clamps_into_bounds() {
        let default = Duration::from_secs(3600);
        let max = Duration::from_secs(24 * 3600);

        assert_eq!(clamp_ttl(None, default, max), default);
        assert_eq!(
            clamp_ttl(Some(Duration::from_secs(60)), default, max),
            Duration::from_secs(60)
        );
        assert_eq!(
            clamp_ttl(Some(Duration::from_secs(48 * 3600)), default, max),
            max
        );
    }
}
