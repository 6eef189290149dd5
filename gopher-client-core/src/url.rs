//! `gopher://` URLs as described in RFC 4266.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::{Host, Url};

use crate::gopher::{GopherLine, ItemType, DEFAULT_PORT};

const SELECTOR: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

#[derive(Error, Debug)]
pub enum UrlError {
    #[error("invalid URL: {0}")]
    Parse(#[from] url::ParseError),
    #[error("unsupported scheme {0:?}, expected gopher")]
    Scheme(String),
    #[error("URL has no host")]
    MissingHost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GopherUrl {
    pub host: String,
    pub port: u16,
    pub item_type: ItemType,
    pub selector: String,
    /// Search terms for type `7` items, carried after an encoded TAB.
    pub query: Option<String>,
}

impl GopherUrl {
    pub fn new(host: impl Into<String>, port: u16, item_type: ItemType, selector: impl Into<String>) -> Self {
        GopherUrl {
            host: host.into(),
            port,
            item_type,
            selector: selector.into(),
            query: None,
        }
    }
}

impl FromStr for GopherUrl {
    type Err = UrlError;

    /// Accepts `gopher://host[:port]/<type><selector>[%09<query>]`. The
    /// scheme may be left off.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = if s.contains("://") {
            Url::parse(s)?
        } else {
            Url::parse(&format!("gopher://{}", s))?
        };

        if url.scheme() != "gopher" {
            return Err(UrlError::Scheme(url.scheme().to_string()));
        }

        let host = match url.host() {
            Some(Host::Domain(d)) if !d.is_empty() => d.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(UrlError::MissingHost),
        };
        let port = url.port().unwrap_or(DEFAULT_PORT);

        // '?' is legal inside a selector, so the query component belongs to it.
        let mut raw_path = url.path().trim_start_matches('/').to_string();
        if let Some(q) = url.query() {
            raw_path.push('?');
            raw_path.push_str(q);
        }
        let decoded = percent_decode_str(&raw_path).decode_utf8_lossy();

        let mut chars = decoded.chars();
        let item_type = chars.next().map(ItemType::from).unwrap_or(ItemType::Menu);
        let rest = chars.as_str();
        let (selector, query) = match rest.split_once('\t') {
            Some((selector, query)) => (selector.to_string(), Some(query.to_string())),
            None => (rest.to_string(), None),
        };

        Ok(GopherUrl {
            host,
            port,
            item_type,
            selector,
            query,
        })
    }
}

impl fmt::Display for GopherUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "gopher://[{}]", self.host)?;
        } else {
            write!(f, "gopher://{}", self.host)?;
        }
        if self.port != DEFAULT_PORT {
            write!(f, ":{}", self.port)?;
        }
        write!(
            f,
            "/{}{}",
            self.item_type,
            utf8_percent_encode(&self.selector, SELECTOR)
        )?;
        if let Some(query) = &self.query {
            write!(f, "%09{}", utf8_percent_encode(query, SELECTOR))?;
        }
        Ok(())
    }
}

impl From<&GopherLine> for GopherUrl {
    fn from(line: &GopherLine) -> Self {
        GopherUrl::new(line.hostname.clone(), line.port, line.item_type, line.selector.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_url() {
        let url: GopherUrl = "gopher://gopher.example.org:7070/0/docs/readme.txt".parse().unwrap();
        assert_eq!(url.host, "gopher.example.org");
        assert_eq!(url.port, 7070);
        assert_eq!(url.item_type, ItemType::TextFile);
        assert_eq!(url.selector, "/docs/readme.txt");
        assert_eq!(url.query, None);
    }

    #[test]
    fn bare_host_is_root_menu() {
        let url: GopherUrl = "gopher.example.org".parse().unwrap();
        assert_eq!(url, GopherUrl::new("gopher.example.org", 70, ItemType::Menu, ""));

        let url: GopherUrl = "gopher://gopher.example.org/".parse().unwrap();
        assert_eq!(url.item_type, ItemType::Menu);
        assert_eq!(url.selector, "");
    }

    #[test]
    fn decodes_selector_and_search_terms() {
        let url: GopherUrl = "gopher://example.org/7/search%20here%09rust%20lang".parse().unwrap();
        assert_eq!(url.item_type, ItemType::Search);
        assert_eq!(url.selector, "/search here");
        assert_eq!(url.query.as_deref(), Some("rust lang"));
    }

    #[test]
    fn question_mark_stays_in_selector() {
        let url: GopherUrl = "gopher://example.org/1/cgi?x=1".parse().unwrap();
        assert_eq!(url.selector, "/cgi?x=1");
    }

    #[test]
    fn ipv6_host_is_unbracketed() {
        let url: GopherUrl = "gopher://[::1]:7070/1/".parse().unwrap();
        assert_eq!(url.host, "::1");
        assert_eq!(url.to_string(), "gopher://[::1]:7070/1/");
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(matches!("http://example.org/".parse::<GopherUrl>(), Err(UrlError::Scheme(_))));
    }

    #[test]
    fn display_encodes_selector() {
        let mut url = GopherUrl::new("example.org", 70, ItemType::Search, "/find it");
        url.query = Some("a b".into());
        assert_eq!(url.to_string(), "gopher://example.org/7/find%20it%09a%20b");
        assert_eq!(url.to_string().parse::<GopherUrl>().unwrap(), url);
    }

    #[test]
    fn menu_line_points_at_its_item() {
        let line = GopherLine::parse("gCat\t/cat.gif\tpics.example\t7071", "h", 70).unwrap();
        let url = GopherUrl::from(&line);
        assert_eq!(url.to_string(), "gopher://pics.example:7071/g/cat.gif");
    }
}
