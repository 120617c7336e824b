//! Rebasing emitted asset URLs onto the public base path.

/// True for URLs that point at another origin or are not paths at all:
/// `https://…`, `data:…`, `mailto:…`, protocol-relative `//host/…`,
/// fragment-only `#id`, and the empty string.
pub fn is_external_url(url: &str) -> bool {
    if url.is_empty() || url.starts_with('#') || url.starts_with("//") {
        return true;
    }
    has_scheme(url)
}

/// RFC 3986 scheme: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":"
fn has_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Prefix a root- or document-relative URL with `base`.
///
/// `base` must end in `/`. External URLs come back unchanged.
///
/// # Example
///
/// ```
/// use kiln_core::output::rebase_url;
///
/// assert_eq!(rebase_url("/assets/index.js", "./"), "./assets/index.js");
/// assert_eq!(rebase_url("logo.png", "/app/"), "/app/logo.png");
/// assert_eq!(rebase_url("https://cdn.example.com/x.js", "./"), "https://cdn.example.com/x.js");
/// ```
pub fn rebase_url(url: &str, base: &str) -> String {
    if is_external_url(url) {
        return url.to_string();
    }

    let path = url
        .strip_prefix("./")
        .or_else(|| url.strip_prefix('/'))
        .unwrap_or(url);
    format!("{base}{path}")
}

/// Replace delimited occurrences of each `(from, to)` pair inside `text`.
///
/// Only occurrences wrapped in matching quotes or in `url(...)`-style
/// parentheses are touched, so `/a.js` inside `"/a.js.map"` is left alone.
/// The text is scanned once from left to right and replaced text is never
/// matched again.
pub(crate) fn rewrite_references(text: &str, rewrites: &[(String, String)]) -> String {
    let rewrites: Vec<&(String, String)> = rewrites
        .iter()
        .filter(|(from, to)| !from.is_empty() && from != to)
        .collect();
    if rewrites.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.chars().next() {
        let after_open = &rest[open.len_utf8()..];
        let close = match open {
            '"' | '\'' | '`' => Some(open),
            '(' => Some(')'),
            _ => None,
        };

        let hit = close.and_then(|close| {
            rewrites
                .iter()
                .find(|(from, _)| {
                    after_open
                        .strip_prefix(from.as_str())
                        .is_some_and(|tail| tail.starts_with(close))
                })
                .map(|(from, to)| (from, to, close))
        });

        match hit {
            Some((from, to, close)) => {
                out.push(open);
                out.push_str(to);
                out.push(close);
                rest = &after_open[from.len() + close.len_utf8()..];
            }
            None => {
                out.push(open);
                rest = after_open;
            }
        }
    }
    out
}
