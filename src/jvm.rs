//! JVM bytecode reference, scraped from a single table page into flat records.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};
use crate::fetch::Fetcher;

pub const SOURCE_URL: &str = "https://en.wikipedia.org/wiki/List_of_Java_bytecode_instructions";
pub const OUTPUT: &str = "jvm_instructions.json";
pub const USER_AGENT: &str = "jvm-scraper/1.0";
pub const TIMEOUT_SECS: u64 = 30;

static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.wikitable tbody tr").unwrap());
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const NO_CHANGE: &str = "No change";
const EMPTY_STACK: &str = "[empty]";
const UNKNOWN_STACK: &str = "...";

/// One row of the bytecode table, cells cleaned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub mnemonic: String,
    pub opcode_hex: String,
    pub opcode_binary: String,
    pub other_bytes: String,
    pub stack: String,
    pub description: String,
}

/// Flat output record. Keys serialize in alphabetical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JvmInstruction {
    pub anchor_id: String,
    pub description: String,
    pub format: String,
    pub mnemonic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opcode: Option<String>,
    pub operand_stack_after: String,
    pub operand_stack_before: String,
    pub operation: String,
}

impl From<&TableEntry> for JvmInstruction {
    fn from(entry: &TableEntry) -> Self {
        let mnemonic = entry.mnemonic.clone();
        let opcode = opcode_decimal(&entry.opcode_hex)
            .map(|dec| format!("{} = {} (0x{})", mnemonic, dec, entry.opcode_hex));
        let format = if entry.other_bytes.is_empty() {
            mnemonic.clone()
        } else {
            format!("{} {}", mnemonic, entry.other_bytes.replace(':', ""))
        };
        let (before, after) = split_stack(&entry.stack);

        Self {
            anchor_id: format!("jvm-{}", mnemonic.replace('_', "-")),
            description: entry.description.clone(),
            format,
            opcode,
            operand_stack_after: after,
            operand_stack_before: before,
            operation: entry.description.clone(),
            mnemonic,
        }
    }
}

pub async fn fetch_instructions(fetcher: &Fetcher, url: &str) -> Result<Vec<JvmInstruction>> {
    let html = fetcher
        .fetch(url)
        .await
        .map_err(|source| ScrapeError::Discovery {
            url: url.to_string(),
            source,
        })?;
    Ok(parse_table(&html).iter().map(JvmInstruction::from).collect())
}

/// Rows with at least six cells and a non-empty mnemonic.
pub fn parse_table(html: &str) -> Vec<TableEntry> {
    let doc = Html::parse_document(html);
    doc.select(&ROW)
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&TD).map(clean_text).collect();
            if cells.len() < 6 || cells[0].is_empty() {
                return None;
            }
            let mut cells = cells.into_iter();
            let mut next = || cells.next().unwrap_or_default();
            Some(TableEntry {
                mnemonic: next(),
                opcode_hex: next(),
                opcode_binary: next(),
                other_bytes: next(),
                stack: next(),
                description: next(),
            })
        })
        .collect()
}

fn clean_text(cell: ElementRef) -> String {
    let text = cell.text().collect::<String>();
    SPACES.replace_all(&text, " ").trim().to_string()
}

fn opcode_decimal(hex: &str) -> Option<i64> {
    let hex = hex.trim();
    if hex.is_empty() {
        return None;
    }
    i64::from_str_radix(hex, 16).ok()
}

/// Split "before → after" stack notation.
pub fn split_stack(stack: &str) -> (String, String) {
    if stack.is_empty() || stack == "[No change]" || stack == "[no change]" {
        return (NO_CHANGE.to_string(), NO_CHANGE.to_string());
    }

    let parts: Vec<&str> = stack.split('→').collect();
    if let [before, after] = parts.as_slice() {
        let before = match before.trim() {
            "" => UNKNOWN_STACK,
            b => b,
        };
        let after = match after.trim() {
            "" => EMPTY_STACK,
            a => a,
        };
        return (before.to_string(), after.to_string());
    }

    (UNKNOWN_STACK.to_string(), stack.to_string())
}
