use std::collections::HashSet;

use scraper::{Html, Selector};
use tracing::{info, warn};
use url::Url;

use crate::config::DiscoveryProfile;
use crate::error::{Result, ScrapeError};
use crate::fetch::Fetcher;
use crate::model::Link;
use crate::parser::sections::next_element;
use crate::parser::tables::cell_text;

/// Finds detail-page links in the tables under the index page's section headers.
pub struct Discoverer {
    index_url: Url,
    base_url: String,
    site_prefix: String,
    sections: Vec<String>,
    keyword: String,
    header: Selector,
    link: Selector,
}

impl Discoverer {
    pub fn new(index_url: &str, base_url: &str, profile: &DiscoveryProfile) -> Result<Self> {
        let index_url = Url::parse(index_url)
            .map_err(|e| ScrapeError::Config(format!("index_url {:?}: {}", index_url, e)))?;
        let selector = |css: &str| {
            Selector::parse(css)
                .map_err(|e| ScrapeError::Config(format!("selector {:?}: {}", css, e)))
        };
        Ok(Self {
            index_url,
            base_url: base_url.trim_end_matches('/').to_string(),
            site_prefix: profile.site_prefix.clone(),
            sections: profile.sections.clone(),
            keyword: profile.section_keyword.to_lowercase(),
            header: selector(&profile.section_header)?,
            link: selector(&profile.link_selector)?,
        })
    }

    /// Fetch the index page and list its links. Any failure here is fatal.
    pub async fn fetch_links(&self, fetcher: &Fetcher) -> Result<Vec<Link>> {
        info!("Fetching instruction links from {}", self.index_url);
        let html = fetcher
            .fetch(self.index_url.as_str())
            .await
            .map_err(|source| ScrapeError::Discovery {
                url: self.index_url.to_string(),
                source,
            })?;
        let links = self.links(&html);
        info!("Found {} instruction links on index", links.len());
        Ok(links)
    }

    /// Links in document order, deduplicated by resolved URL (first wins).
    pub fn links(&self, html: &str) -> Vec<Link> {
        let doc = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for header in doc.select(&self.header) {
            let category = cell_text(header);
            if !self.is_instruction_section(&category) {
                continue;
            }
            let Some(table) = next_element(header).filter(|el| el.value().name() == "table")
            else {
                continue;
            };

            for anchor in table.select(&self.link) {
                let Some(href) = anchor.value().attr("href") else {
                    continue;
                };
                let Some(url) = self.resolve(href) else {
                    continue;
                };
                if seen.insert(url.clone()) {
                    links.push(Link::new(url, category.clone()));
                }
            }
        }

        links
    }

    pub fn is_instruction_section(&self, name: &str) -> bool {
        self.sections.iter().any(|s| s == name) || name.to_lowercase().contains(&self.keyword)
    }

    pub fn resolve(&self, href: &str) -> Option<String> {
        if href.starts_with(&self.site_prefix) {
            return Some(format!("{}{}", self.base_url, href));
        }
        if href.starts_with("http") {
            return Some(href.to_string());
        }
        match self.index_url.join(href) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                warn!("Skipping unresolvable href {:?}: {}", href, e);
                None
            }
        }
    }
}
