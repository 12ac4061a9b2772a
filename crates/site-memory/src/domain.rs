//! Domain normalization and task-text domain extraction (spec §4.4).

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// A small allowlist of second-level domains we recognize for the
/// "strip a single leading subdomain" normalization rule. Not a full
/// public-suffix list — just enough for the sites this platform is
/// likely to build site memory for.
static KNOWN_SECOND_LEVEL: &[&str] = &[
    "google.com",
    "github.com",
    "amazon.com",
    "wikipedia.org",
    "stackoverflow.com",
    "reddit.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "baidu.com",
    "taobao.com",
    "jd.com",
];

/// Chinese site names that commonly appear in task text without a URL,
/// mapped to their domain (spec §4.4 "a small hard-coded mapping of
/// Chinese site names to domains").
static CHINESE_SITE_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("淘宝", "taobao.com"),
        ("京东", "jd.com"),
        ("百度", "baidu.com"),
        ("知乎", "zhihu.com"),
        ("微博", "weibo.com"),
        ("豆瓣", "douban.com"),
        ("小红书", "xiaohongshu.com"),
    ])
});

/// Normalizes a hostname to the domain a knowledge card is keyed by:
/// lowercase, strip a leading `www.`, and collapse a single leading
/// subdomain when the remainder is a known second-level domain (spec
/// §4.4 "Knowledge Card Store").
pub fn normalize_domain(host: &str) -> String {
    let host = host.trim().to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() > 2 {
        let candidate = labels[1..].join(".");
        if KNOWN_SECOND_LEVEL.contains(&candidate.as_str()) {
            return candidate;
        }
    }
    host.to_string()
}

/// Extracts the domain a task is "about", in priority order: an explicit
/// URL in the text, a bare `host.tld`-shaped token, the Chinese
/// site-name mapping, else `None` (spec §4.4 "Extract domain from
/// task").
pub fn extract_domain_from_task(text: &str) -> Option<String> {
    if let Some(url_domain) = extract_from_url(text) {
        return Some(normalize_domain(&url_domain));
    }
    if let Some(token_domain) = extract_host_like_token(text) {
        return Some(normalize_domain(&token_domain));
    }
    for (name, domain) in CHINESE_SITE_NAMES.iter() {
        if text.contains(name) {
            return Some((*domain).to_string());
        }
    }
    None
}

fn extract_from_url(text: &str) -> Option<String> {
    for scheme in ["https://", "http://"] {
        if let Some(idx) = text.find(scheme) {
            let rest = &text[idx + scheme.len()..];
            let host_and_rest = rest.split(|c: char| c == '/' || c.is_whitespace()).next()?;
            let host = host_and_rest.split(':').next()?;
            if !host.is_empty() {
                return Some(host.to_string());
            }
        }
    }
    None
}

/// Looks for a bare `word.tld` token (e.g. "check amazon.com for") with
/// no scheme prefix.
fn extract_host_like_token(text: &str) -> Option<String> {
    text.split_whitespace().find_map(|word| {
        let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '-');
        let labels: Vec<&str> = trimmed.split('.').collect();
        if labels.len() >= 2
            && labels.iter().all(|l| !l.is_empty())
            && labels.last().map(|l| l.len() >= 2 && l.chars().all(|c| c.is_ascii_alphabetic())).unwrap_or(false)
        {
            Some(trimmed.to_string())
        } else {
            None
        }
    })
}
