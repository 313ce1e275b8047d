//! Crawl orchestration
//!
//! The orchestrator fetches the province index once, then hands every province
//! to the worker pool as an independent task. A province task walks its whole
//! subtree, persists it in one transaction and reports how it ended. Run
//! metadata and per-province outcomes are recorded in the database.

use crate::config::Config;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::parser::{parse_provinces, ProvinceLink};
use crate::crawler::pool::{PoolError, WorkerPool};
use crate::crawler::walker::{HierarchyWalker, WalkOutcome};
use crate::output::{ProvinceOutcome, ProvinceReport, RunSummary};
use crate::storage::{self, RunStatus, SqliteStorage, Storage};
use crate::CrawlError;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;
use tracing::Instrument;
use url::Url;

/// Main crawl orchestrator
pub struct Orchestrator {
    config: Config,
    fetcher: PageFetcher,
    walker: HierarchyWalker,
    storage: Mutex<SqliteStorage>,
    db_path: PathBuf,
    run_id: i64,
}

impl Orchestrator {
    /// Creates a new orchestrator and records the start of a run
    ///
    /// # Arguments
    ///
    /// * `config` - The validated crawler configuration
    /// * `config_hash` - Hash of the configuration file, stored with the run
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Database initialized and run created
    /// * `Err(CrawlError)` - Failed to open the database or build the client
    pub fn new(config: Config, config_hash: &str) -> Result<Self, CrawlError> {
        let db_path = PathBuf::from(&config.output.database_path);
        let mut storage = SqliteStorage::new(&db_path)?;

        let fetcher = PageFetcher::from_config(&config.user_agent, &config.fetch)?;
        let walker = HierarchyWalker::new(fetcher.clone(), config.crawler.on_fetch_failure);

        let run_id = storage.create_run(config_hash)?;
        tracing::info!("Created crawl run {}", run_id);

        Ok(Self {
            config,
            fetcher,
            walker,
            storage: Mutex::new(storage),
            db_path,
            run_id,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Crawls every province listed on the root page
    ///
    /// Returns once every admitted province task has finished. Province
    /// failures are part of the summary; only a failure to read the root page
    /// or to record the run ends the run with an error, and marks it failed.
    pub async fn run(&self) -> Result<RunSummary, CrawlError> {
        let started = Instant::now();

        let provinces = match self.discover_provinces().await {
            Ok(provinces) => provinces,
            Err(e) => {
                tracing::error!("Crawl run {} failed: {}", self.run_id, e);
                self.storage()?.complete_run(self.run_id, RunStatus::Failed)?;
                return Err(e);
            }
        };

        let reports = self.crawl_provinces(provinces).await;
        let summary = RunSummary::new(self.run_id, reports, started.elapsed());

        let status = if summary.is_complete() {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithErrors
        };

        let mut storage = self.storage()?;
        for report in &summary.provinces {
            storage.record_province_result(self.run_id, &report.to_record())?;
        }
        storage.complete_run(self.run_id, status)?;

        tracing::info!(
            "Crawl run {} finished in {:.1}s: {} villages from {} provinces",
            self.run_id,
            summary.elapsed.as_secs_f64(),
            summary.total_villages(),
            summary.provinces.len()
        );

        Ok(summary)
    }

    /// Fetches the root page and extracts the province links
    async fn discover_provinces(&self) -> Result<Vec<ProvinceLink>, CrawlError> {
        let root_url = Url::parse(&self.config.crawler.root_url)?;
        tracing::info!("Fetching province index {}", root_url);

        let page = self.fetcher.fetch(&root_url).await?;
        let (provinces, errors) = parse_provinces(&page.body, &page.url)?;

        for error in &errors {
            tracing::warn!("Skipping province link: {}", error);
        }

        if provinces.is_empty() {
            return Err(CrawlError::NoProvinces {
                url: root_url.to_string(),
            });
        }

        tracing::info!("Found {} provinces", provinces.len());
        Ok(provinces)
    }

    /// Runs one pool task per province and collects their reports
    async fn crawl_provinces(&self, provinces: Vec<ProvinceLink>) -> Vec<ProvinceReport> {
        let pool = WorkerPool::new(
            self.config.crawler.workers,
            self.config.crawler.queue_capacity,
        );

        let mut reports = Vec::new();
        let mut admitted = 0;

        for link in provinces {
            let span = tracing::info_span!("province", code = %link.code);
            let task = crawl_province(self.walker.clone(), self.db_path.clone(), link.clone())
                .instrument(span);

            match pool.submit(report_panics(link.clone(), task)) {
                Ok(()) => admitted += 1,
                Err(e) => {
                    tracing::warn!("Province {} ({}) not crawled: {}", link.name, link.code, e);
                    let outcome = match e {
                        PoolError::Rejected { .. } => ProvinceOutcome::Rejected,
                        other => ProvinceOutcome::Failed(other.to_string()),
                    };
                    reports.push(ProvinceReport::new(link.code, link.name, outcome));
                }
            }
        }

        tracing::debug!(
            "Submitted {} provinces to a pool of capacity {}",
            admitted,
            pool.capacity()
        );

        for result in pool.shutdown().await {
            match result {
                Ok(report) => reports.push(report),
                // Province tasks catch their own panics
                Err(e) => tracing::error!("Worker pool job failed: {}", e),
            }
        }

        reports
    }

    fn storage(&self) -> Result<std::sync::MutexGuard<'_, SqliteStorage>, CrawlError> {
        self.storage.lock().map_err(|_| {
            CrawlError::Storage(storage::StorageError::Database(
                "storage lock poisoned".to_string(),
            ))
        })
    }
}

/// Runs a province task on its own tokio task
///
/// A panic inside the task becomes a `Failed` report for that province.
async fn report_panics<F>(link: ProvinceLink, task: F) -> ProvinceReport
where
    F: Future<Output = ProvinceReport> + Send + 'static,
{
    match tokio::spawn(task).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Province task {} ({}) failed: {}", link.name, link.code, e);
            ProvinceReport::new(
                link.code,
                link.name,
                ProvinceOutcome::Failed(format!("province task failed: {}", e)),
            )
        }
    }
}

/// Walks and persists one province
///
/// Never fails: every error becomes the province's outcome.
async fn crawl_province(
    walker: HierarchyWalker,
    db_path: PathBuf,
    link: ProvinceLink,
) -> ProvinceReport {
    tracing::info!("Crawling {} from {}", link.name, link.url);

    let outcome = match walker.walk_province(&link).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!("Walk of {} aborted: {}", link.name, e);
            return ProvinceReport::new(link.code, link.name, ProvinceOutcome::Failed(e.to_string()));
        }
    };

    for violation in outcome.province.prefix_violations() {
        tracing::warn!(
            "{} code {} does not extend parent code {}",
            violation.child_level,
            violation.child_code,
            violation.parent_code
        );
    }

    let complete = outcome.is_complete();
    let WalkOutcome {
        province,
        truncations,
    } = outcome;

    let persisted = tokio::task::spawn_blocking(move || {
        storage::persist_province(&db_path, &province, complete)
    })
    .await;

    let outcome = match persisted {
        Ok(Ok(villages)) if truncations.is_empty() => ProvinceOutcome::Complete { villages },
        Ok(Ok(villages)) => ProvinceOutcome::Partial {
            villages,
            truncations,
        },
        Ok(Err(e)) => ProvinceOutcome::Failed(e.to_string()),
        Err(e) => ProvinceOutcome::Failed(e.to_string()),
    };

    tracing::info!("{} ({}): {}", link.name, link.code, outcome);
    ProvinceReport::new(link.code, link.name, outcome)
}

/// Runs a complete crawl with the given configuration
pub async fn run_crawl(config: Config, config_hash: &str) -> Result<RunSummary, CrawlError> {
    let orchestrator = Orchestrator::new(config, config_hash)?;
    orchestrator.run().await
}
