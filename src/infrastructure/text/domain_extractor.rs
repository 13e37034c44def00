//! Registrable-domain extraction — spec.md section 4.4.

/// Returns the registrable domain of `url` (`https://a.b.example.co.uk/x`
/// -> `example.co.uk`). Returns `"unknown"` on any parse failure.
#[must_use]
pub fn extract_registrable_domain(url: &str) -> String {
    let Ok(parsed) = url::Url::parse(url) else {
        return "unknown".to_string();
    };
    let Some(host) = parsed.host_str() else {
        return "unknown".to_string();
    };
    match addr::parse_domain_name(host) {
        Ok(name) => name
            .root()
            .map(str::to_string)
            .unwrap_or_else(|| "unknown".to_string()),
        Err(_) => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_simple_domain() {
        assert_eq!(
            extract_registrable_domain("https://example.com/page"),
            "example.com"
        );
    }

    #[test]
    fn strips_subdomains() {
        assert_eq!(
            extract_registrable_domain("https://www.news.example.com/a"),
            "example.com"
        );
    }

    #[test]
    fn handles_multi_part_suffix() {
        assert_eq!(
            extract_registrable_domain("https://shop.example.co.uk/item"),
            "example.co.uk"
        );
    }

    #[test]
    fn returns_unknown_on_parse_failure() {
        assert_eq!(extract_registrable_domain("not a url"), "unknown");
    }

    #[test]
    fn returns_unknown_for_bare_ip_without_registrable_suffix() {
        // addr rejects IP literals as domain names; this exercises the
        // parse-failure branch rather than host-based extraction.
        assert_eq!(extract_registrable_domain("http://localhost/a"), "unknown");
    }
}
