//! `Link` header pagination.

/// Links extracted from a GitHub `Link` response header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPagination {
    pub next_url: Option<String>,
    pub next_page: Option<u32>,
    pub last_page: Option<u32>,
}

/// Parse `<url>; rel="next", <url>; rel="last"`.
pub fn parse_link_header(link_header: &str) -> LinkPagination {
    let mut info = LinkPagination::default();

    for part in link_header.split(',') {
        let mut url = None;
        let mut rel = None;

        for segment in part.split(';').map(str::trim) {
            if let Some(inner) = segment.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
                url = Some(inner);
            } else if let Some(value) = segment.strip_prefix("rel=") {
                rel = Some(value.trim_matches('"'));
            }
        }

        let (Some(url), Some(rel)) = (url, rel) else {
            continue;
        };
        match rel {
            "next" => {
                info.next_url = Some(url.to_string());
                info.next_page = page_param(url);
            }
            "last" => info.last_page = page_param(url),
            _ => {}
        }
    }

    info
}

fn page_param(url: &str) -> Option<u32> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "page")
        .and_then(|(_, v)| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_next_and_last() {
        let header = r#"<https://api.github.com/user/repos?per_page=100&page=2>; rel="next", <https://api.github.com/user/repos?per_page=100&page=5>; rel="last""#;
        let info = parse_link_header(header);
        assert_eq!(
            info.next_url.as_deref(),
            Some("https://api.github.com/user/repos?per_page=100&page=2")
        );
        assert_eq!(info.next_page, Some(2));
        assert_eq!(info.last_page, Some(5));
    }

    #[test]
    fn last_page_has_no_next() {
        let header = r#"<https://api.github.com/user/repos?page=4>; rel="prev", <https://api.github.com/user/repos?page=1>; rel="first""#;
        assert_eq!(parse_link_header(header), LinkPagination::default());
    }

    #[test]
    fn malformed_segments_are_ignored() {
        let info = parse_link_header("garbage, <not closed; rel=\"next\"");
        assert_eq!(info, LinkPagination::default());
        assert_eq!(parse_link_header(""), LinkPagination::default());
    }
}
