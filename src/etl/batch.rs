use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::EtlError;
use crate::etl::discovery::{JSON_EXTENSION, discover_files};
use crate::ports::loader::Loader;
use crate::services::star_schema::SeaOrmLoader;

/// Extract + load step for a single file of one dataset.
#[async_trait::async_trait]
pub trait FileProcessor: Send + Sync {
    /// Dataset name used in logs and reports
    fn dataset(&self) -> &'static str;

    async fn process(&self, loader: &dyn Loader, path: &Path) -> Result<FileSummary, EtlError>;
}

/// What to do when a file fails to extract or load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Roll back the failing file and abort the run
    #[default]
    FailFast,
    /// Roll back the failing file, record it and carry on with the next one
    SkipAndReport,
}

/// Rows written for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub songs: usize,
    pub artists: usize,
    pub users: usize,
    pub time_rows: usize,
    pub songplays: usize,
    /// Songplays stored without song/artist keys
    pub unresolved: usize,
}

impl AddAssign for FileSummary {
    fn add_assign(&mut self, other: Self) {
        self.songs += other.songs;
        self.artists += other.artists;
        self.users += other.users;
        self.time_rows += other.time_rows;
        self.songplays += other.songplays;
        self.unresolved += other.unresolved;
    }
}

#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub error: EtlError,
}

/// Outcome of running one dataset.
#[derive(Debug)]
pub struct DatasetReport {
    pub dataset: &'static str,
    pub root: PathBuf,
    pub files_found: usize,
    pub files_processed: usize,
    pub skipped: Vec<SkippedFile>,
    pub totals: FileSummary,
    pub elapsed: Duration,
}

impl DatasetReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.files_processed == self.files_found
    }
}

/// Runs a [`FileProcessor`] over every file of a dataset, one transaction
/// per file, strictly in discovery order.
pub struct BatchDriver<'a> {
    database: &'a Database,
    policy: FailurePolicy,
}

impl<'a> BatchDriver<'a> {
    pub fn new(database: &'a Database, policy: FailurePolicy) -> Self {
        Self { database, policy }
    }

    pub async fn run(
        &self,
        root: &Path,
        processor: &dyn FileProcessor,
    ) -> Result<DatasetReport, EtlError> {
        let started = Instant::now();
        let files = discover_files(root, JSON_EXTENSION)?;
        let total = files.len();

        log::info!("Processing {} dataset: {} files", processor.dataset(), total);
        println!("{} files found in {}", total, root.display());

        let mut report = DatasetReport {
            dataset: processor.dataset(),
            root: root.to_path_buf(),
            files_found: total,
            files_processed: 0,
            skipped: Vec::new(),
            totals: FileSummary::default(),
            elapsed: Duration::ZERO,
        };

        for (index, path) in files.into_iter().enumerate() {
            log::debug!("Processing file ({}/{}): {}", index + 1, total, path.display());

            match self.process_file(processor, &path).await {
                Ok(summary) => {
                    report.totals += summary;
                    report.files_processed += 1;
                    println!("{}/{} files processed.", index + 1, total);
                }
                Err(error) => match self.policy {
                    FailurePolicy::FailFast => {
                        log::error!(
                            "Aborting {} run at {}: {}",
                            processor.dataset(),
                            path.display(),
                            error
                        );
                        return Err(error);
                    }
                    FailurePolicy::SkipAndReport => {
                        log::warn!("Skipping {}: {}", path.display(), error);
                        println!(
                            "{}/{} files processed (skipped {}).",
                            index + 1,
                            total,
                            path.display()
                        );
                        report.skipped.push(SkippedFile { path, error });
                    }
                },
            }
        }

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        report.elapsed = Duration::from_millis(elapsed_ms);
        log::info!(
            "Finished {} dataset: {}/{} files loaded in {}",
            report.dataset,
            report.files_processed,
            report.files_found,
            humantime::format_duration(report.elapsed)
        );
        Ok(report)
    }

    /// Process one file inside its own transaction. Commits on success,
    /// rolls back on any failure.
    async fn process_file(
        &self,
        processor: &dyn FileProcessor,
        path: &Path,
    ) -> Result<FileSummary, EtlError> {
        let txn = self
            .database
            .conn
            .begin()
            .await
            .map_err(EtlError::load("begin transaction"))?;

        let result = processor.process(&SeaOrmLoader::new(&txn), path).await;

        match result {
            Ok(summary) => {
                txn.commit().await.map_err(EtlError::load("commit transaction"))?;
                Ok(summary)
            }
            Err(error) => {
                if let Err(rollback_error) = txn.rollback().await {
                    log::warn!("Failed to roll back {}: {}", path.display(), rollback_error);
                }
                Err(error)
            }
        }
    }
}
