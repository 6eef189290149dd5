pub mod client;
pub mod gopher;
pub mod url;

pub use client::{transact, Connector, GopherClient, TcpConnector, TransactOptions};
pub use gopher::{
    decode_text, parse_menu, validate_selector, GopherError, GopherLine, ItemType, MenuLineError,
    TransactionResult, DEFAULT_PORT,
};
pub use crate::url::{GopherUrl, UrlError};
