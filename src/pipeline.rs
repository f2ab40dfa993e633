use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Settings;
use crate::discover::Discoverer;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::parser::Extractor;
use crate::scraper::{self, ScrapeStats};
use crate::store::Dataset;

/// What one run did, for the end-of-run report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub skipped: usize,
    pub scraped: ScrapeStats,
    pub dataset_total: usize,
    pub dataset_errors: usize,
}

/// load → discover → filter → scrape → merge → persist.
pub async fn run(settings: &Settings) -> Result<RunSummary> {
    info!("Starting instruction scraper for {}", settings.index_url);

    let fetcher = Arc::new(Fetcher::new(&settings.user_agent, settings.timeout())?);
    let extractor = Arc::new(Extractor::new(&settings.extraction)?);
    let discoverer = Discoverer::new(&settings.index_url, &settings.base_url, &settings.discovery)?;

    let prior = Dataset::load(&settings.output);

    let links = discoverer.fetch_links(&fetcher).await?;
    let discovered = links.len();
    let pending = prior.pending(links);
    info!("{} links on index, {} to scrape", discovered, pending.len());
    let skipped = discovered - pending.len();

    let records = scraper::scrape_links(fetcher, extractor, pending, settings.workers).await?;
    let scraped = ScrapeStats::from_records(&records);

    let dataset = prior.merge(records);
    dataset.persist(&settings.output)?;

    let dataset_errors = dataset.error_count();
    if dataset_errors > 0 {
        warn!("Dataset contains {} error records", dataset_errors);
    }

    Ok(RunSummary {
        discovered,
        skipped,
        scraped,
        dataset_total: dataset.len(),
        dataset_errors,
    })
}
