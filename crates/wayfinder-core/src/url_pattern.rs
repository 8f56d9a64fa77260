//! URL pattern grammar for include/exclude and visibility rules.
//!
//! A pattern decomposes into optional scheme, domain, path, query and
//! fragment. Within each segment `*` matches any run of characters and
//! `:name` matches a run of non-separator characters. Segments are matched
//! independently and a segment absent from the pattern matches anything.

use regex::Regex;
use tracing::debug;
use url::Url;

/// Compiled URL pattern.
#[derive(Debug, Clone)]
pub struct UrlPattern {
    source: String,
    scheme: Option<String>,
    domain: Option<Regex>,
    path: Option<Regex>,
    query: Vec<(Regex, Option<Regex>)>,
    fragment: Option<Regex>,
}

impl UrlPattern {
    pub fn parse(pattern: &str) -> Result<Self, regex::Error> {
        let source = pattern.trim().to_string();
        let mut rest = source.as_str();

        let scheme = match rest.split_once("://") {
            Some((scheme, tail)) if !scheme.is_empty() && !scheme.contains('/') => {
                rest = tail;
                Some(scheme.to_ascii_lowercase())
            }
            _ => None,
        };

        let (rest, fragment) = match rest.split_once('#') {
            Some((head, fragment)) => (head, Some(fragment)),
            None => (rest, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((head, query)) => (head, Some(query)),
            None => (rest, None),
        };
        let (domain, path) = if rest.starts_with('/') {
            (None, Some(rest))
        } else {
            match rest.find('/') {
                Some(at) => (Some(&rest[..at]), Some(&rest[at..])),
                None => (Some(rest), None),
            }
        };

        let domain = domain
            .filter(|d| !d.is_empty())
            .map(|d| segment_regex(&d.to_ascii_lowercase(), "."))
            .transpose()?;
        let path = path
            .filter(|p| !p.is_empty())
            .map(|p| segment_regex(p, "/"))
            .transpose()?;
        let query = query
            .unwrap_or_default()
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => Ok((segment_regex(key, "&=")?, Some(segment_regex(value, "&")?))),
                None => Ok((segment_regex(pair, "&=")?, None)),
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        let fragment = fragment
            .filter(|f| !f.is_empty())
            .map(|f| segment_regex(f, ""))
            .transpose()?;

        Ok(Self {
            source,
            scheme,
            domain,
            path,
            query,
            fragment,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether an absolute URL matches every segment of the pattern.
    pub fn matches(&self, url: &str) -> bool {
        let Ok(url) = Url::parse(url) else {
            debug!(url, "Unparsable URL never matches a pattern");
            return false;
        };

        if let Some(scheme) = &self.scheme {
            if scheme != "*" && scheme != url.scheme() {
                return false;
            }
        }
        if let Some(domain) = &self.domain {
            let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
            let with_port = match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.clone(),
            };
            if !domain.is_match(&host) && !domain.is_match(&with_port) {
                return false;
            }
        }
        if let Some(path) = &self.path {
            if !path_matches(path, url.path()) {
                return false;
            }
        }
        for (key, value) in &self.query {
            let found = url.query_pairs().any(|(k, v)| {
                key.is_match(&k) && value.as_ref().is_none_or(|value| value.is_match(&v))
            });
            if !found {
                return false;
            }
        }
        if let Some(fragment) = &self.fragment {
            if !fragment.is_match(url.fragment().unwrap_or_default()) {
                return false;
            }
        }
        true
    }
}

/// Match a domain pattern such as `*.example.com` against a host.
pub fn match_domain(pattern: &str, host: &str) -> bool {
    match segment_regex(&pattern.trim().to_ascii_lowercase(), ".") {
        Ok(regex) => regex.is_match(&host.to_ascii_lowercase()),
        Err(e) => {
            debug!(pattern, error = %e, "Invalid domain pattern");
            false
        }
    }
}

/// Match a path pattern such as `/app/*` or `/users/:id` against a path.
pub fn match_path(pattern: &str, path: &str) -> bool {
    match segment_regex(pattern.trim(), "/") {
        Ok(regex) => path_matches(&regex, path),
        Err(e) => {
            debug!(pattern, error = %e, "Invalid path pattern");
            false
        }
    }
}

/// Any pattern in `patterns` matches `url`; unparsable patterns are skipped.
pub fn matches_any(patterns: &[String], url: &str) -> bool {
    patterns.iter().any(|p| match UrlPattern::parse(p) {
        Ok(pattern) => pattern.matches(url),
        Err(e) => {
            debug!(pattern = %p, error = %e, "Invalid URL pattern");
            false
        }
    })
}

/// Paths compare with and without a trailing slash.
fn path_matches(regex: &Regex, path: &str) -> bool {
    if regex.is_match(path) {
        return true;
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.len() != path.len() {
        return regex.is_match(if trimmed.is_empty() { "/" } else { trimmed });
    }
    regex.is_match(&format!("{}/", path))
}

/// Anchored regex for one segment. `separators` bound `:name` placeholders.
fn segment_regex(segment: &str, separators: &str) -> Result<Regex, regex::Error> {
    let placeholder = if separators.is_empty() {
        ".+".to_string()
    } else {
        format!("[^{}]+", regex::escape(separators))
    };

    let mut out = String::from("^");
    let mut chars = segment.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            ':' if chars.peek().is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') => {
                while chars
                    .peek()
                    .is_some_and(|n| n.is_ascii_alphanumeric() || *n == '_')
                {
                    chars.next();
                }
                out.push_str(&placeholder);
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_path() {
        assert!(match_path("/app/*", "/app/dashboard"));
        assert!(!match_path("/app/*", "/other"));
        assert!(match_path("/users/:id", "/users/42"));
        assert!(!match_path("/users/:id", "/users/42/edit"));
        assert!(match_path("/pricing", "/pricing/"));
    }

    #[test]
    fn test_match_domain() {
        assert!(match_domain("*.example.com", "sub.example.com"));
        assert!(!match_domain("*.example.com", "example.com"));
        assert!(match_domain(":tenant.example.com", "acme.example.com"));
        assert!(!match_domain(":tenant.example.com", "a.b.example.com"));
    }

    #[test]
    fn test_absent_segments_are_wildcards() {
        let pattern = UrlPattern::parse("/app/*").unwrap();
        assert!(pattern.matches("https://any.host/app/x?y=1#z"));
        assert!(!pattern.matches("https://any.host/other"));

        let pattern = UrlPattern::parse("example.com").unwrap();
        assert!(pattern.matches("http://example.com/anything"));
        assert!(!pattern.matches("http://example.org/"));
    }

    #[test]
    fn test_full_pattern() {
        let pattern = UrlPattern::parse("https://*.example.com/app/:section?tab=*#top").unwrap();
        assert!(pattern.matches("https://eu.example.com/app/billing?tab=cards&x=1#top"));
        assert!(!pattern.matches("http://eu.example.com/app/billing?tab=cards#top"));
        assert!(!pattern.matches("https://eu.example.com/app/billing#top"));
        assert!(!pattern.matches("https://eu.example.com/app/billing?tab=cards#bottom"));
    }

    #[test]
    fn test_domain_with_port() {
        let pattern = UrlPattern::parse("localhost:3000/*").unwrap();
        assert!(pattern.matches("http://localhost:3000/a"));
        assert!(!pattern.matches("http://localhost:4000/a"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(match_path("/a.b", "/a.b"));
        assert!(!match_path("/a.b", "/axb"));
    }

    #[test]
    fn test_matches_any() {
        let patterns = vec!["/docs/*".to_string(), "/pricing".to_string()];
        assert!(matches_any(&patterns, "https://x.io/pricing"));
        assert!(!matches_any(&patterns, "https://x.io/blog"));
        assert!(!matches_any(&patterns, "not a url"));
    }
}
