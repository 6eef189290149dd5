use std::io::{self, IsTerminal, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::json;

use gopher_client_core::{GopherClient, GopherLine, GopherUrl, ItemType, TransactionResult};

/// JSON output is used when --json is set or stdout is piped.
pub fn use_json(flag: bool) -> bool {
    flag || !io::stdout().is_terminal()
}

fn type_indicator(item_type: ItemType) -> &'static str {
    match item_type {
        ItemType::Menu => "[+]",
        ItemType::TextFile => "[T]",
        ItemType::Search => "[?]",
        ItemType::Html => "[H]",
        ItemType::Error => "[!]",
        ItemType::Gif | ItemType::Image | ItemType::Png | ItemType::Bitmap => "[I]",
        ItemType::Info => "   ",
        _ => "[.]",
    }
}

fn line_json(line: &GopherLine) -> serde_json::Value {
    let url = if line.item_type == ItemType::Info {
        String::new()
    } else {
        GopherUrl::from(line).to_string()
    };
    json!({
        "type": line.item_type,
        "type_name": line.item_type.name(),
        "display": line.display,
        "selector": line.selector,
        "hostname": line.hostname,
        "port": line.port,
        "url": url,
        "mime": line.item_type.mime(),
    })
}

fn print_menu(lines: &[GopherLine], json: bool) -> Result<()> {
    if json {
        let items: Vec<_> = lines.iter().map(line_json).collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in lines {
            if line.item_type == ItemType::Info {
                println!("      {}", line.display);
            } else {
                println!(
                    "{} {:<40} {}",
                    type_indicator(line.item_type),
                    line.display,
                    GopherUrl::from(line)
                );
            }
        }
    }
    Ok(())
}

fn print_text(url: &GopherUrl, text: &str, json: bool) {
    if json {
        println!("{}", json!({ "url": url.to_string(), "content": text }));
    } else {
        print!("{}", text);
        // Ensure trailing newline for clean shell output
        if !text.ends_with('\n') {
            println!();
        }
    }
}

fn write_binary(url: &GopherUrl, bytes: &[u8], output: Option<&Path>, json: bool) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if json {
                println!(
                    "{}",
                    json!({ "ok": true, "url": url.to_string(), "output": path.display().to_string(), "bytes": bytes.len() })
                );
            } else {
                println!("Saved {} bytes to {}", bytes.len(), path.display());
            }
        }
        None => {
            if io::stdout().is_terminal() {
                bail!("Refusing to write binary content to a terminal. Pass --output.");
            }
            let mut stdout = io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Print a structured error and exit with code 1.
pub fn handle_error(err: anyhow::Error, json: bool) -> ! {
    if json {
        let msg = format!("{:#}", err);
        eprintln!("{}", json!({ "error": msg }));
    } else {
        eprintln!("error: {:#}", err);
    }
    std::process::exit(1);
}

pub async fn browse(client: &GopherClient, url: &GopherUrl, json: bool) -> Result<()> {
    let lines = client
        .fetch_menu(&url.host, url.port, &url.selector)
        .await
        .with_context(|| format!("Failed to browse {}", url))?;
    print_menu(&lines, json)
}

pub async fn fetch(client: &GopherClient, url: &GopherUrl, json: bool) -> Result<()> {
    let text = client
        .fetch_text(&url.host, url.port, &url.selector)
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;
    print_text(url, &text, json);
    Ok(())
}

pub async fn search(client: &GopherClient, url: &GopherUrl, query: &str, json: bool) -> Result<()> {
    let lines = client
        .search(&url.host, url.port, &url.selector, query)
        .await
        .with_context(|| format!("Failed to search {}", url))?;
    print_menu(&lines, json)
}

/// Fetches the target and renders it according to the item type in its URL.
pub async fn get(client: &GopherClient, url: &GopherUrl, output: Option<&Path>, json: bool) -> Result<()> {
    if let (ItemType::Search, Some(query)) = (url.item_type, &url.query) {
        return search(client, url, query, json).await;
    }

    let result = client
        .transact(&url.host, url.port, &url.selector, url.item_type)
        .await
        .with_context(|| format!("Failed to get {}", url))?;

    match result {
        TransactionResult::Menu(lines) => print_menu(&lines, json),
        TransactionResult::Text(text) => {
            print_text(url, &text, json);
            Ok(())
        }
        TransactionResult::Binary(bytes) => write_binary(url, &bytes, output, json),
    }
}
