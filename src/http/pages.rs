//! Pages served by the proxy itself: dashboard, `/stats` and `robots.txt`.

use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::http::request::proxy_origin;
use crate::http::server::AppState;
use crate::routing::{Page, UpstreamRegistry, PROXY_PREFIX};
use crate::stats::usage::{DAY_MS, HOUR_MS, RETENTION_MS, WEEK_MS};
use crate::stats::{now_millis, UsageRecord};

pub const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /";

pub async fn serve(state: &AppState, page: Page, headers: &HeaderMap) -> Response {
    match page {
        Page::Robots => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            ROBOTS_TXT,
        )
            .into_response(),
        Page::Stats => stats(state).await,
        Page::Dashboard => {
            let record = state.usage.snapshot().await;
            let origin = proxy_origin(headers, state.public_origin.as_deref());
            let html = render_dashboard(&record, state.router.registry(), &origin, now_millis());
            (
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                html,
            )
                .into_response()
        }
    }
}

async fn stats(state: &AppState) -> Response {
    let record = state.usage.snapshot().await;
    match serde_json::to_string_pretty(&record) {
        Ok(body) => (
            [
                (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
            ],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize usage statistics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Render the dashboard from the aggregate record and the upstream table.
pub fn render_dashboard(
    record: &UsageRecord,
    registry: &UpstreamRegistry,
    origin: &str,
    now_ms: u64,
) -> String {
    let mut rows = String::new();
    for upstream in registry.entries() {
        let counts = record
            .endpoints
            .get(upstream.prefix())
            .copied()
            .unwrap_or_default();
        rows.push_str(&format!(
            "      <tr><td><code>{prefix}</code></td><td>{today}</td><td>{week}</td><td>{month}</td><td>{total}</td></tr>\n",
            prefix = escape(upstream.prefix()),
            today = counts.today,
            week = counts.week,
            month = counts.month,
            total = counts.total,
        ));
    }

    let mut charts = String::new();
    for (title, span, bucket) in [
        ("Last 24 hours (hourly)", DAY_MS, HOUR_MS),
        ("Last 7 days (daily)", WEEK_MS, DAY_MS),
        ("Last 30 days (daily)", RETENTION_MS, DAY_MS),
    ] {
        charts.push_str(&render_chart(title, &record.activity(now_ms, span, bucket)));
    }

    let mut endpoints = String::new();
    for upstream in registry.entries() {
        endpoints.push_str(&format!(
            "      <li><code>{origin}{prefix}</code> &rarr; <code>{base}</code></li>\n",
            origin = escape(origin),
            prefix = escape(upstream.prefix()),
            base = escape(&upstream.base),
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <meta name="robots" content="noindex, nofollow">
  <title>API Proxy</title>
  <style>
    body {{ font-family: system-ui, sans-serif; max-width: 960px; margin: 2rem auto; padding: 0 1rem; color: #222; }}
    table {{ border-collapse: collapse; width: 100%; }}
    th, td {{ border: 1px solid #ddd; padding: 0.4rem 0.6rem; text-align: left; }}
    th {{ background: #f5f5f5; }}
    code {{ background: #f0f0f0; padding: 0 0.2rem; }}
    .summary span {{ margin-right: 2rem; }}
    .chart {{ display: flex; align-items: flex-end; gap: 2px; height: 80px; border-bottom: 1px solid #ccc; margin-bottom: 1rem; }}
    .chart div {{ flex: 1; background: #4a7bd0; min-height: 1px; }}
  </style>
</head>
<body>
  <h1>API Proxy</h1>
  <p class="summary"><span>Total requests: <strong>{total}</strong></span><span>Active endpoints: <strong>{active}</strong></span></p>
  <h2>Usage</h2>
  <table>
    <thead><tr><th>Endpoint</th><th>24h</th><th>7d</th><th>30d</th><th>Total</th></tr></thead>
    <tbody>
{rows}    </tbody>
  </table>
  <h2>Activity</h2>
{charts}  <h2>Endpoints</h2>
  <ul>
{endpoints}  </ul>
  <h2>Generic proxy</h2>
  <p>Any URL can be fetched through <code>{origin}{proxy}&lt;url&gt;</code>, for example <code>{origin}{proxy}https://example.com/</code>.</p>
</body>
</html>
"#,
        total = record.total,
        active = record.active_endpoints(),
        rows = rows,
        charts = charts,
        endpoints = endpoints,
        origin = escape(origin),
        proxy = PROXY_PREFIX,
    )
}

/// One bar per bucket, scaled to the busiest bucket.
fn render_chart(title: &str, buckets: &[u64]) -> String {
    let peak = buckets.iter().copied().max().unwrap_or(0).max(1);
    let mut bars = String::new();
    for count in buckets {
        bars.push_str(&format!(
            r#"<div style="height:{}%" title="{}"></div>"#,
            count * 100 / peak,
            count
        ));
    }
    format!(
        "  <h3>{title}: {sum}</h3>\n  <div class=\"chart\">{bars}</div>\n",
        title = escape(title),
        sum = buckets.iter().sum::<u64>(),
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
