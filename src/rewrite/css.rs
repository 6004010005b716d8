//! CSS `url(...)` rewriting.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::rewrite::RewriteContext;

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"']*?))\s*\)"#).expect("valid regex")
});

/// Re-point every `url(...)` token through the proxy.
///
/// Anchors and data URIs are skipped; root-relative references get the
/// target origin; other relative references are resolved against the
/// stylesheet's own URL; absolute references are prefixed directly.
pub fn rewrite_css(ctx: &RewriteContext, text: &str) -> String {
    CSS_URL
        .replace_all(text, |caps: &Captures| {
            let (quote, value) = match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(v), _, _) => ("\"", v.as_str()),
                (None, Some(v), _) => ("'", v.as_str()),
                (None, None, Some(v)) => ("", v.as_str()),
                _ => return caps[0].to_string(),
            };
            match rewrite_css_url(ctx, value.trim()) {
                Some(url) => format!("url({}{}{})", quote, url, quote),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn rewrite_css_url(ctx: &RewriteContext, value: &str) -> Option<String> {
    let lower = value.to_ascii_lowercase();
    if value.is_empty() || value.starts_with('#') || lower.starts_with("data:") {
        return None;
    }
    if value.starts_with(ctx.proxy_base()) {
        return None;
    }
    ctx.resolve(value).map(|absolute| ctx.proxied(&absolute))
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    const P: &str = "https://relay.example/proxy/";
    const O: &str = "https://x.com";

    fn ctx() -> RewriteContext {
        RewriteContext::new(
            "https://relay.example",
            Url::parse("https://x.com/assets/css/site.css").unwrap(),
        )
    }

    #[test]
    fn test_root_relative() {
        assert_eq!(
            rewrite_css(&ctx(), "body { background: url(/img.png); }"),
            format!("body {{ background: url({P}{O}/img.png); }}")
        );
    }

    #[test]
    fn test_data_uri_and_anchor_untouched() {
        let css = "a { background: url(data:image/png;base64,AAA) } b { filter: url(#blur) }";
        assert_eq!(rewrite_css(&ctx(), css), css);
    }

    #[test]
    fn test_relative_resolved_against_stylesheet() {
        assert_eq!(
            rewrite_css(&ctx(), "src: url('../fonts/a.woff2')"),
            format!("src: url('{P}{O}/assets/fonts/a.woff2')")
        );
    }

    #[test]
    fn test_absolute_prefixed() {
        assert_eq!(
            rewrite_css(&ctx(), r#"@import url("https://fonts.example/css?family=A");"#),
            format!(r#"@import url("{P}https://fonts.example/css?family=A");"#)
        );
    }

    #[test]
    fn test_scheme_relative_uses_target_scheme() {
        assert_eq!(
            rewrite_css(&ctx(), "url(//cdn.example/x.png)"),
            format!("url({P}https://cdn.example/x.png)")
        );
    }

    #[test]
    fn test_idempotent_on_proxied_urls() {
        let once = rewrite_css(&ctx(), "url(/img.png)");
        assert_eq!(rewrite_css(&ctx(), &once), once);
    }

    #[test]
    fn test_whitespace_inside_parens() {
        assert_eq!(
            rewrite_css(&ctx(), "url(  /img.png  )"),
            format!("url({P}{O}/img.png)")
        );
    }
}
