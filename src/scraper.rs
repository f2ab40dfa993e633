use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::fetch::Fetcher;
use crate::model::{ExtractedRecord, Link};
use crate::parser::Extractor;

/// Scrape stats returned after completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

impl ScrapeStats {
    pub fn from_records(records: &[ExtractedRecord]) -> Self {
        let errors = records.iter().filter(|r| !r.is_ok()).count();
        Self {
            total: records.len(),
            ok: records.len() - errors,
            errors,
        }
    }
}

/// Fetch one page and extract it. Failures come back as an error record.
pub async fn scrape_one(fetcher: &Fetcher, extractor: &Extractor, link: &Link) -> ExtractedRecord {
    match fetcher.fetch(&link.identifier).await {
        Ok(html) => extractor.extract(link, &html),
        Err(e) => ExtractedRecord::failed(link, e),
    }
}

/// Scrape every link with a pool of `min(max_workers, links.len())` workers.
pub async fn scrape_links(
    fetcher: Arc<Fetcher>,
    extractor: Arc<Extractor>,
    links: Vec<Link>,
    max_workers: usize,
) -> Result<Vec<ExtractedRecord>> {
    run_workers(links, max_workers, move |link| {
        let fetcher = Arc::clone(&fetcher);
        let extractor = Arc::clone(&extractor);
        async move { scrape_one(&fetcher, &extractor, &link).await }
    })
    .await
}

/// Worker pool over a shared queue. Each worker pulls a link, runs `job` on it
/// and publishes the record; the result channel closes once every worker has
/// returned, so draining it yields exactly one record per input link.
pub async fn run_workers<F, Fut>(
    links: Vec<Link>,
    max_workers: usize,
    job: F,
) -> Result<Vec<ExtractedRecord>>
where
    F: Fn(Link) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ExtractedRecord> + Send + 'static,
{
    let total = links.len();
    if total == 0 {
        info!("No new or failed URLs to scrape");
        return Ok(Vec::new());
    }

    let workers = max_workers.clamp(1, total);
    info!("Starting concurrent scraping: {} workers, {} links", workers, total);

    let queue = Arc::new(Mutex::new(VecDeque::from(links)));
    let job = Arc::new(job);
    // Sized to hold every result so workers never wait on the consumer.
    let (tx, mut rx) = mpsc::channel::<ExtractedRecord>(total);

    let mut pool = JoinSet::new();
    for worker_id in 0..workers {
        let queue = Arc::clone(&queue);
        let job = Arc::clone(&job);
        let tx = tx.clone();

        pool.spawn(async move {
            loop {
                let next = queue
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .pop_front();
                let Some(link) = next else { break };

                debug!(worker = worker_id, url = %link.identifier, "Scraping instruction");
                let record = job(link).await;
                if tx.send(record).await.is_err() {
                    break;
                }
            }
        });
    }

    // Drop our copy of tx so rx closes when all workers finish
    drop(tx);

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut records = Vec::with_capacity(total);
    while let Some(record) = rx.recv().await {
        match &record.error {
            Some(e) => warn!("Error scraping {}: {}", record.identifier, e),
            None => debug!("Scraped {}", record.identifier),
        }
        pb.inc(1);
        records.push(record);
    }
    pb.finish_and_clear();

    while let Some(joined) = pool.join_next().await {
        joined?;
    }

    let stats = ScrapeStats::from_records(&records);
    info!(
        "Scraping completed: {} scraped ({} ok, {} errors)",
        stats.total, stats.ok, stats.errors
    );
    Ok(records)
}
