//! Landing page: a short usage guide rendered at `GET /`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::Html;

pub struct LandingPage {
    hostname: String,
    default_ttl: Duration,
    max_ttl: Duration,
}

impl LandingPage {
    pub fn new(hostname: String, default_ttl: Duration, max_ttl: Duration) -> Self {
        LandingPage {
            hostname,
            default_ttl,
            max_ttl,
        }
    }

    pub fn render(&self) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{host}</title>
  <style>
    body {{ font-family: monospace; max-width: 42rem; margin: 3rem auto; padding: 0 1rem; }}
    code {{ background: #f0f0f0; padding: 0.1rem 0.3rem; }}
  </style>
</head>
<body>
  <h1>{host}</h1>
  <p>An ephemeral container registry. Images expire after the lifetime
  encoded in their tag and are deleted automatically.</p>
  <pre>
docker tag myapp {host}/myapp:1h
docker push {host}/myapp:1h
  </pre>
  <p>Supported tag suffixes: <code>30s</code>, <code>15m</code>,
  <code>1h</code>, <code>2d</code>, <code>1w</code>.</p>
  <p>Tags without a lifetime default to <code>{default_ttl}</code>;
  the maximum is <code>{max_ttl}</code>.</p>
</body>
</html>
"#,
            host = self.hostname,
            default_ttl = humantime::format_duration(self.default_ttl),
            max_ttl = humantime::format_duration(self.max_ttl),
        )
    }
}

/// `GET /`.
pub async fn handle_index(State(page): State<Arc<LandingPage>>) -> Html<String> {
    Html(page.render())
}
