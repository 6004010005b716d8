//! HTML link rewriting.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::rewrite::RewriteContext;

static LINK_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(href|src|action)(\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});

static SRCSET_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(srcset)(\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});

static INTEGRITY_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+integrity\s*=\s*(?:"[^"]*"|'[^']*')"#).expect("valid regex")
});

/// Rewrite `href`/`src`/`action`/`srcset` links and drop `integrity`.
pub fn rewrite_html(ctx: &RewriteContext, text: &str) -> String {
    let text = INTEGRITY_ATTR.replace_all(text, "");

    let text = SRCSET_ATTR.replace_all(&text, |caps: &Captures| {
        rebuild_attr(caps, |value| Some(rewrite_srcset(ctx, value)))
    });

    LINK_ATTR
        .replace_all(&text, |caps: &Captures| rebuild_attr(caps, |value| ctx.rewrite_link(value)))
        .into_owned()
}

/// Reassemble `name=<quote>value<quote>`, keeping the original quote style.
///
/// Group 1 is the attribute name, 2 the `=` with its whitespace, 3 a
/// double-quoted value, 4 a single-quoted value.
fn rebuild_attr(caps: &Captures, rewrite: impl FnOnce(&str) -> Option<String>) -> String {
    let (quote, value) = match (caps.get(3), caps.get(4)) {
        (Some(v), _) => ('"', v.as_str()),
        (None, Some(v)) => ('\'', v.as_str()),
        (None, None) => return caps[0].to_string(),
    };
    match rewrite(value) {
        Some(new_value) => format!("{}{}{}{}{}", &caps[1], &caps[2], quote, new_value, quote),
        None => caps[0].to_string(),
    }
}

/// Apply the link rule to each candidate URL, keeping its descriptor.
pub fn rewrite_srcset(ctx: &RewriteContext, value: &str) -> String {
    value
        .split(',')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .map(|candidate| {
            let mut parts = candidate.split_whitespace();
            let url = parts.next().unwrap_or_default();
            let descriptor = parts.collect::<Vec<_>>().join(" ");
            let url = ctx.rewrite_link(url).unwrap_or_else(|| url.to_string());
            if descriptor.is_empty() {
                url
            } else {
                format!("{} {}", url, descriptor)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
