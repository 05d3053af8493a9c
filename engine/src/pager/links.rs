//! RFC 5988 `Link` header parsing.

/// Navigation links read from one response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Links {
    pub first: Option<String>,
    pub prev: Option<String>,
    pub next: Option<String>,
    pub last: Option<String>,
}

impl Links {
    pub fn is_empty(&self) -> bool {
        self.first.is_none() && self.prev.is_none() && self.next.is_none() && self.last.is_none()
    }
}

fn trim_url(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '\''))
}

fn trim_value(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\''))
}

/// Split a header value on the commas that separate links, leaving commas
/// inside `<...>` alone.
fn split_links(header: &str) -> impl Iterator<Item = &str> {
    let mut in_url = false;
    header.split(move |c: char| {
        match c {
            '<' => in_url = true,
            '>' => in_url = false,
            _ => {}
        }
        c == ',' && !in_url
    })
}

/// Separate the link target from its parameters.
fn split_target(link: &str) -> (&str, &str) {
    let link = link.trim_start();
    if link.starts_with('<') {
        if let Some(end) = link.find('>') {
            return (&link[..=end], &link[end + 1..]);
        }
    }
    link.split_once(';').unwrap_or((link, ""))
}

/// Parse a `Link` header value. Relations other than `first`, `prev`,
/// `next` and `last` are ignored.
pub fn parse_links(header: &str) -> Links {
    let mut links = Links::default();
    for link in split_links(header) {
        let (target, params) = split_target(link);
        let url = trim_url(target);
        if url.is_empty() {
            continue;
        }
        let rel = params
            .split(';')
            .filter_map(|param| param.split_once('='))
            .find(|(key, _)| trim_value(key) == "rel")
            .map(|(_, value)| trim_value(value));

        let slot = match rel {
            Some("first") => &mut links.first,
            Some("prev") => &mut links.prev,
            Some("next") => &mut links.next,
            Some("last") => &mut links.last,
            _ => continue,
        };
        *slot = Some(url.to_string());
    }
    links
}
