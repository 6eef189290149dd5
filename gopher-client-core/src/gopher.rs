use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 70;

/// Bytes that delimit frames on the wire and may never appear inside a
/// selector or search query.
const FORBIDDEN: [char; 3] = ['\t', '\n', '\r'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "char", into = "char")]
pub enum ItemType {
    TextFile,
    Menu,
    CsoPhoneBook,
    Error,
    BinHex,
    DosBinary,
    UuEncoded,
    Search,
    Telnet,
    Binary,
    Mirror,
    Gif,
    Image,
    Tn3270,
    Bitmap,
    Movie,
    Sound,
    Doc,
    Html,
    Info,
    Png,
    Rtf,
    Wav,
    Pdf,
    Xml,
    Unknown(char),
}

impl From<char> for ItemType {
    fn from(c: char) -> Self {
        match c {
            '0' => ItemType::TextFile,
            '1' => ItemType::Menu,
            '2' => ItemType::CsoPhoneBook,
            '3' => ItemType::Error,
            '4' => ItemType::BinHex,
            '5' => ItemType::DosBinary,
            '6' => ItemType::UuEncoded,
            '7' => ItemType::Search,
            '8' => ItemType::Telnet,
            '9' => ItemType::Binary,
            '+' => ItemType::Mirror,
            'g' => ItemType::Gif,
            'I' => ItemType::Image,
            'T' => ItemType::Tn3270,
            ':' => ItemType::Bitmap,
            ';' => ItemType::Movie,
            '<' => ItemType::Sound,
            'd' => ItemType::Doc,
            'h' => ItemType::Html,
            'i' => ItemType::Info,
            'p' => ItemType::Png,
            'r' => ItemType::Rtf,
            's' => ItemType::Wav,
            'P' => ItemType::Pdf,
            'X' => ItemType::Xml,
            other => ItemType::Unknown(other),
        }
    }
}

impl From<ItemType> for char {
    fn from(itype: ItemType) -> Self {
        itype.to_char()
    }
}

impl ItemType {
    pub fn to_char(&self) -> char {
        match self {
            ItemType::TextFile => '0',
            ItemType::Menu => '1',
            ItemType::CsoPhoneBook => '2',
            ItemType::Error => '3',
            ItemType::BinHex => '4',
            ItemType::DosBinary => '5',
            ItemType::UuEncoded => '6',
            ItemType::Search => '7',
            ItemType::Telnet => '8',
            ItemType::Binary => '9',
            ItemType::Mirror => '+',
            ItemType::Gif => 'g',
            ItemType::Image => 'I',
            ItemType::Tn3270 => 'T',
            ItemType::Bitmap => ':',
            ItemType::Movie => ';',
            ItemType::Sound => '<',
            ItemType::Doc => 'd',
            ItemType::Html => 'h',
            ItemType::Info => 'i',
            ItemType::Png => 'p',
            ItemType::Rtf => 'r',
            ItemType::Wav => 's',
            ItemType::Pdf => 'P',
            ItemType::Xml => 'X',
            ItemType::Unknown(c) => *c,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ItemType::TextFile => "TextFile",
            ItemType::Menu => "Menu",
            ItemType::CsoPhoneBook => "CsoPhoneBook",
            ItemType::Error => "Error",
            ItemType::BinHex => "BinHex",
            ItemType::DosBinary => "DosBinary",
            ItemType::UuEncoded => "UuEncoded",
            ItemType::Search => "Search",
            ItemType::Telnet => "Telnet",
            ItemType::Binary => "Binary",
            ItemType::Mirror => "Mirror",
            ItemType::Gif => "Gif",
            ItemType::Image => "Image",
            ItemType::Tn3270 => "Tn3270",
            ItemType::Bitmap => "Bitmap",
            ItemType::Movie => "Movie",
            ItemType::Sound => "Sound",
            ItemType::Doc => "Doc",
            ItemType::Html => "Html",
            ItemType::Info => "Info",
            ItemType::Png => "Png",
            ItemType::Rtf => "Rtf",
            ItemType::Wav => "Wav",
            ItemType::Pdf => "Pdf",
            ItemType::Xml => "Xml",
            ItemType::Unknown(_) => "Unknown",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ItemType::TextFile | ItemType::Error | ItemType::Info => "text/plain",
            ItemType::Menu | ItemType::Search => "application/x-gopher-menu",
            ItemType::BinHex => "application/mac-binhex40",
            ItemType::UuEncoded => "text/x-uuencode",
            ItemType::Gif => "image/gif",
            ItemType::Image => "image/jpeg",
            ItemType::Bitmap => "image/bmp",
            ItemType::Png => "image/png",
            ItemType::Movie => "video/mpeg",
            ItemType::Sound => "audio/basic",
            ItemType::Wav => "audio/wav",
            ItemType::Html => "text/html",
            ItemType::Rtf => "application/rtf",
            ItemType::Pdf => "application/pdf",
            ItemType::Xml => "application/xml",
            _ => "application/octet-stream",
        }
    }

    /// Types whose response body is decoded as text rather than passed
    /// through as bytes.
    pub fn is_text(&self) -> bool {
        matches!(self, ItemType::TextFile | ItemType::Error)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// One entry of a parsed submenu.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GopherLine {
    pub item_type: ItemType,
    pub display: String,
    pub selector: String,
    pub hostname: String,
    pub port: u16,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MenuLineError {
    #[error("missing item type")]
    MissingType,
    #[error("invalid port {0:?}")]
    InvalidPort(String),
}

impl GopherLine {
    /// Parses a single menu line (without its line terminator).
    ///
    /// `default_host` and `default_port` are the coordinates of the menu the
    /// line was read from; they fill in hostname and port when those fields
    /// are absent or empty.
    pub fn parse(line: &str, default_host: &str, default_port: u16) -> Result<Self, MenuLineError> {
        let mut fields = line.splitn(4, '\t');
        let head = fields.next().unwrap_or_default();

        let mut chars = head.chars();
        let item_type = chars.next().map(ItemType::from).ok_or(MenuLineError::MissingType)?;
        let display = chars.as_str().to_string();

        let selector = fields.next().unwrap_or_default().to_string();
        let hostname = match fields.next() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => default_host.to_string(),
        };
        let port = match fields.next() {
            Some(port) if !port.is_empty() => port
                .parse()
                .map_err(|_| MenuLineError::InvalidPort(port.to_string()))?,
            _ => default_port,
        };

        Ok(GopherLine {
            item_type,
            display,
            selector,
            hostname,
            port,
        })
    }
}

/// Renders the line in wire form, without the trailing CR LF.
impl fmt::Display for GopherLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}\t{}\t{}\t{}",
            self.item_type, self.display, self.selector, self.hostname, self.port
        )
    }
}

/// Parses a full submenu body. Stops at a lone `.` line; a body that ends
/// without one is accepted as well. Any malformed line fails the whole menu.
pub fn parse_menu(content: &str, default_host: &str, default_port: u16) -> Result<Vec<GopherLine>, GopherError> {
    let mut lines = Vec::new();

    for (index, line) in content.lines().enumerate() {
        if line == "." {
            break;
        }
        let parsed = GopherLine::parse(line, default_host, default_port)
            .map_err(|source| GopherError::Protocol { line: index + 1, source })?;
        lines.push(parsed);
    }

    Ok(lines)
}

/// The interpreted body of a single transaction. Which variant is present is
/// decided by the item type the transaction was issued with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionResult {
    Menu(Vec<GopherLine>),
    Text(String),
    Binary(Vec<u8>),
}

impl TransactionResult {
    /// Interprets a fully buffered response. `hostname` and `port` are those
    /// of the request and become the defaults for menu lines.
    pub fn from_response(
        raw: Vec<u8>,
        item_type: ItemType,
        hostname: &str,
        port: u16,
    ) -> Result<Self, GopherError> {
        match item_type {
            ItemType::Menu => Ok(TransactionResult::Menu(parse_menu(&decode_text(raw), hostname, port)?)),
            t if t.is_text() => Ok(TransactionResult::Text(decode_text(raw))),
            _ => Ok(TransactionResult::Binary(raw)),
        }
    }
}

/// Lossy UTF-8 decode; only copies when the input is malformed.
pub fn decode_text(raw: Vec<u8>) -> String {
    String::from_utf8(raw).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

pub fn validate_selector(selector: &str) -> Result<(), GopherError> {
    validate("selector", selector)
}

pub(crate) fn validate(field: &'static str, value: &str) -> Result<(), GopherError> {
    match value.chars().find(|c| FORBIDDEN.contains(c)) {
        Some(found) => Err(GopherError::Validation { field, found }),
        None => Ok(()),
    }
}

#[derive(Error, Debug)]
pub enum GopherError {
    #[error("{field} contains forbidden character {found:?}")]
    Validation { field: &'static str, found: char },
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed menu line {line}: {source}")]
    Protocol {
        line: usize,
        #[source]
        source: MenuLineError,
    },
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Transaction cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_type_chars_survive_conversion() {
        for c in "0123456789+gIT:;<dhipPrsX".chars() {
            assert_eq!(ItemType::from(c).to_char(), c);
            assert!(!matches!(ItemType::from(c), ItemType::Unknown(_)));
        }
        assert_eq!(ItemType::from('z'), ItemType::Unknown('z'));
        assert_eq!(ItemType::Unknown('z').to_char(), 'z');
    }

    #[test]
    fn only_text_and_error_decode_as_text() {
        assert!(ItemType::TextFile.is_text());
        assert!(ItemType::Error.is_text());
        assert!(!ItemType::Menu.is_text());
        assert!(!ItemType::Html.is_text());
    }

    #[test]
    fn parses_full_line() {
        let line = GopherLine::parse("1Menu One\t/one\thost\t70", "other", 7070).unwrap();
        assert_eq!(
            line,
            GopherLine {
                item_type: ItemType::Menu,
                display: "Menu One".into(),
                selector: "/one".into(),
                hostname: "host".into(),
                port: 70,
            }
        );
    }

    #[test]
    fn empty_fields_take_request_defaults() {
        let line = GopherLine::parse("0Readme\t\t\t", "example.org", 70).unwrap();
        assert_eq!(line.item_type, ItemType::TextFile);
        assert_eq!(line.display, "Readme");
        assert_eq!(line.selector, "");
        assert_eq!(line.hostname, "example.org");
        assert_eq!(line.port, 70);
    }

    #[test]
    fn missing_fields_take_request_defaults() {
        let line = GopherLine::parse("iJust some info", "example.org", 7070).unwrap();
        assert_eq!(line.item_type, ItemType::Info);
        assert_eq!(line.selector, "");
        assert_eq!(line.hostname, "example.org");
        assert_eq!(line.port, 7070);
    }

    #[test]
    fn type_only_line_has_empty_display() {
        let line = GopherLine::parse("1", "h", 70).unwrap();
        assert_eq!(line.item_type, ItemType::Menu);
        assert_eq!(line.display, "");
    }

    #[test]
    fn leading_tab_is_missing_type() {
        assert_eq!(
            GopherLine::parse("\t/sel\thost\t70", "h", 70),
            Err(MenuLineError::MissingType)
        );
    }

    #[test]
    fn non_numeric_port_is_rejected() {
        assert_eq!(
            GopherLine::parse("0Doc\t/doc\thost\tseventy", "h", 70),
            Err(MenuLineError::InvalidPort("seventy".into()))
        );
        assert!(GopherLine::parse("0Doc\t/doc\thost\t70000", "h", 70).is_err());
    }

    #[test]
    fn fourth_tab_stays_in_port_field() {
        assert!(matches!(
            GopherLine::parse("1Plus\t/p\thost\t70\t+", "h", 70),
            Err(MenuLineError::InvalidPort(_))
        ));
    }

    #[test]
    fn multibyte_type_char_is_preserved() {
        let line = GopherLine::parse("éLabel\t/x", "h", 70).unwrap();
        assert_eq!(line.item_type, ItemType::Unknown('é'));
        assert_eq!(line.display, "Label");
    }

    #[test]
    fn rendered_line_parses_back() {
        let line = GopherLine {
            item_type: ItemType::Gif,
            display: "A picture".into(),
            selector: "/pics/a.gif".into(),
            hostname: "pics.example".into(),
            port: 7070,
        };
        let parsed = GopherLine::parse(&line.to_string(), "unused", 1).unwrap();
        assert_eq!(parsed, line);
    }

    #[test]
    fn menu_stops_at_terminator() {
        let body = "1One\t/1\th\t70\r\n0Two\t/2\th\t70\r\n.\r\n0After\t/3\th\t70\r\n";
        let menu = parse_menu(body, "h", 70).unwrap();
        assert_eq!(menu.len(), 2);
        assert_eq!(menu[0].display, "One");
        assert_eq!(menu[1].display, "Two");
    }

    #[test]
    fn menu_without_terminator_is_accepted() {
        let menu = parse_menu("1One\t/1\th\t70\n0Two\t/2\th\t70", "h", 70).unwrap();
        assert_eq!(menu.len(), 2);
    }

    #[test]
    fn empty_line_fails_whole_menu() {
        let err = parse_menu("1One\t/1\th\t70\r\n\r\n0Two\t/2\th\t70\r\n", "h", 70).unwrap_err();
        match err {
            GopherError::Protocol { line, source } => {
                assert_eq!(line, 2);
                assert_eq!(source, MenuLineError::MissingType);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn text_response_is_verbatim() {
        let result =
            TransactionResult::from_response(b"hello\nworld".to_vec(), ItemType::TextFile, "h", 70).unwrap();
        assert_eq!(result, TransactionResult::Text("hello\nworld".into()));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let result =
            TransactionResult::from_response(vec![b'o', b'k', 0xff], ItemType::Error, "h", 70).unwrap();
        assert_eq!(result, TransactionResult::Text("ok\u{fffd}".into()));
    }

    #[test]
    fn unknown_type_passes_bytes_through() {
        let raw = vec![0u8, 1, 2, 0xff];
        let result = TransactionResult::from_response(raw.clone(), ItemType::Unknown('z'), "h", 70).unwrap();
        assert_eq!(result, TransactionResult::Binary(raw));
    }

    #[test]
    fn selector_validation() {
        assert!(validate_selector("").is_ok());
        assert!(validate_selector("/some path/ü").is_ok());
        for bad in ["a\tb", "a\nb", "a\rb"] {
            assert!(matches!(
                validate_selector(bad),
                Err(GopherError::Validation { field: "selector", .. })
            ));
        }
    }

    #[test]
    fn item_type_serializes_as_char() {
        let json = serde_json::to_string(&ItemType::Menu).unwrap();
        assert_eq!(json, "\"1\"");
        let back: ItemType = serde_json::from_str("\"z\"").unwrap();
        assert_eq!(back, ItemType::Unknown('z'));
    }
}
