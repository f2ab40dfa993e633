use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One table row: column header → cell text, in column order.
pub type Row = IndexMap<String, String>;

/// A detail page to scrape, as found on the index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub identifier: String,
    pub category: String,
}

impl Link {
    pub fn new(identifier: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            category: category.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(String),
    Table(Vec<Row>),
    KeyedBlocks(BTreeMap<String, Vec<String>>),
}

/// Everything extracted from one detail page. `identifier` is the page URL and
/// the dataset's primary key. A record with `error` set is a failure marker and
/// its fields must not be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord")]
pub struct ExtractedRecord {
    #[serde(rename = "url")]
    pub identifier: String,
    pub category: String,
    #[serde(flatten)]
    pub fields: IndexMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractedRecord {
    pub fn new(link: &Link) -> Self {
        Self {
            identifier: link.identifier.clone(),
            category: link.category.clone(),
            fields: IndexMap::new(),
            error: None,
        }
    }

    pub fn failed(link: &Link, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(link)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn scalar(&self, name: &str) -> Option<&str> {
        match self.fields.get(name)? {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn table(&self, name: &str) -> Option<&[Row]> {
        match self.fields.get(name)? {
            Value::Table(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn keyed(&self, name: &str) -> Option<&BTreeMap<String, Vec<String>>> {
        match self.fields.get(name)? {
            Value::KeyedBlocks(blocks) => Some(blocks),
            _ => None,
        }
    }
}

// Older datasets carry `null` for tables that were never found, `null` for an
// exception mode with no blocks, and `""` for a missing error. All are
// normalized away on load.
#[derive(Deserialize)]
struct RawRecord {
    url: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    rest: IndexMap<String, serde_json::Value>,
}

impl TryFrom<RawRecord> for ExtractedRecord {
    type Error = serde_json::Error;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let mut fields = IndexMap::with_capacity(raw.rest.len());
        for (name, mut value) in raw.rest {
            if value.is_null() {
                continue;
            }
            if let serde_json::Value::Object(blocks) = &mut value {
                for texts in blocks.values_mut().filter(|v| v.is_null()) {
                    *texts = serde_json::Value::Array(Vec::new());
                }
            }
            fields.insert(name, serde_json::from_value(value)?);
        }
        Ok(Self {
            identifier: raw.url,
            category: raw.category,
            fields,
            error: raw.error.filter(|e| !e.is_empty()),
        })
    }
}
