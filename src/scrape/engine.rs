//! The scrape loop shared by every target.
//!
//! ```text
//! prepare → partitions → for each partition:
//!     fetch list page → parse rows → dedup → fetch detail → merge → insert
//!     → persist (every N new records) → save cursor → next page
//! → persist → clear cursor → done
//! ```

use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::record::RawRecord;
use crate::scrape::{DetailPolicy, RowPolicy, ScrapeError, Target};
use crate::store::{Cursor, ScrapeStore};
use crate::transport::Transport;
use crate::utils::fmt_duration;

/// Per-run knobs, seeded from the target's defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeOptions {
    /// Cap on list pages per partition, on top of the target's own limit.
    pub max_pages: Option<u32>,
    /// Continue from the saved cursor when there is one.
    pub resume: bool,
    pub row_policy: RowPolicy,
    pub detail_policy: DetailPolicy,
}

impl ScrapeOptions {
    pub fn for_target(target: &dyn Target) -> Self {
        Self {
            max_pages: None,
            resume: true,
            row_policy: target.row_policy(),
            detail_policy: target.detail_policy(),
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages: u32,
    pub rows: usize,
    pub new_records: usize,
    pub already_scraped: usize,
    pub skipped_rows: usize,
    pub detail_failures: usize,
    pub elapsed: Duration,
}

pub struct Engine<'a> {
    target: &'a mut dyn Target,
    transport: &'a dyn Transport,
    options: ScrapeOptions,
}

impl<'a> Engine<'a> {
    pub fn new(
        target: &'a mut dyn Target,
        transport: &'a dyn Transport,
        options: ScrapeOptions,
    ) -> Self {
        Self {
            target,
            transport,
            options,
        }
    }

    /// Drive the target to exhaustion, adding new records to `store`.
    ///
    /// The store is persisted and the cursor saved after every list page, so
    /// an error or interrupt loses at most the page in progress.
    pub async fn run(&mut self, store: &mut ScrapeStore) -> Result<RunSummary> {
        let start = Instant::now();
        let name = self.target.name();
        let mut summary = RunSummary::default();

        self.target.prepare(self.transport).await?;
        let partitions = self.target.partitions(self.transport).await?;
        if partitions.is_empty() {
            return Err(ScrapeError::navigation(name, "portal offered nothing to search").into());
        }

        let cursor = if self.options.resume {
            store.cursor()?
        } else {
            None
        };
        let (first_partition, mut next_page) = match &cursor {
            Some(cursor) => resume_point(&partitions, cursor, self.target.seekable()),
            None => (0, 1),
        };
        if let Some(cursor) = &cursor {
            info!(
                target_name = name,
                partition = %cursor.partition,
                page = cursor.page,
                start_partition = first_partition,
                start_page = next_page,
                "Resuming from saved cursor"
            );
        }

        let limit = self
            .options
            .max_pages
            .map_or(self.target.page_limit(), |max| max.min(self.target.page_limit()));

        info!(
            target_name = name,
            partitions = partitions.len(),
            cached = store.len(),
            page_limit = limit,
            "Starting scrape"
        );

        for (index, partition) in partitions.iter().enumerate().skip(first_partition) {
            let first_page = std::mem::replace(&mut next_page, 1);
            if !partition.is_empty() {
                debug!(target_name = name, partition = %partition, index, "Starting partition");
            }
            self.scrape_partition(store, partition, index, first_page, limit, &mut summary)
                .await?;

            if store.unsaved() > 0 {
                store.persist()?;
            }
            let next = Cursor {
                partition: partitions.get(index + 1).cloned().unwrap_or_default(),
                partition_index: index + 1,
                page: 1,
            };
            store.save_cursor(&next)?;
        }

        store.persist()?;
        store.clear_cursor()?;
        summary.elapsed = start.elapsed();

        info!(
            target_name = name,
            pages = summary.pages,
            rows = summary.rows,
            new_records = summary.new_records,
            already_scraped = summary.already_scraped,
            skipped_rows = summary.skipped_rows,
            detail_failures = summary.detail_failures,
            total = store.len(),
            duration = fmt_duration(summary.elapsed),
            "Scrape finished"
        );
        Ok(summary)
    }

    async fn scrape_partition(
        &mut self,
        store: &mut ScrapeStore,
        partition: &str,
        index: usize,
        first_page: u32,
        limit: u32,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let name = self.target.name();

        for page_number in first_page..=limit {
            let Some(page) = self
                .target
                .fetch_list_page(self.transport, partition, page_number)
                .await?
            else {
                debug!(target_name = name, page = page_number, "No further list page");
                break;
            };
            summary.pages += 1;

            let rows = self.target.parse_rows(&page, page_number)?;
            if rows.is_empty() {
                debug!(target_name = name, page = page_number, "Empty list page");
                break;
            }

            let before = summary.new_records;
            let row_count = rows.len();
            for (i, row) in rows.into_iter().enumerate() {
                summary.rows += 1;
                let record = match row {
                    Ok(record) => record,
                    Err(e) => match self.options.row_policy {
                        RowPolicy::Skip => {
                            warn!(target_name = name, page = page_number, row = i + 1, reason = %e, "Skipping malformed row");
                            summary.skipped_rows += 1;
                            continue;
                        }
                        RowPolicy::Fail => {
                            return Err(ScrapeError::Parse {
                                target: name,
                                page: page_number,
                                row: i + 1,
                                reason: e.reason,
                            }
                            .into());
                        }
                    },
                };
                self.process_record(store, record, summary).await?;
            }

            if store.unsaved() > 0 {
                store.persist()?;
            }
            store.save_cursor(&Cursor {
                partition: partition.to_string(),
                partition_index: index,
                page: page_number + 1,
            })?;

            info!(
                target_name = name,
                partition = %partition,
                page = page_number,
                rows = row_count,
                new_records = summary.new_records - before,
                total = store.len(),
                "Scraped list page"
            );
        }

        Ok(())
    }

    async fn process_record(
        &mut self,
        store: &mut ScrapeStore,
        mut record: RawRecord,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let name = self.target.name();
        let key = self.target.identity_key(&record);
        if store.contains(&key) {
            debug!(target_name = name, key = %key, "Already scraped");
            summary.already_scraped += 1;
            return Ok(());
        }

        if self.target.has_detail() {
            debug!(target_name = name, key = %key, "Scraping details");
            match self.target.fetch_detail(self.transport, &record).await {
                Ok(detail) => record.merge_detail(detail, self.target.detail_overrides()),
                Err(e) => {
                    summary.detail_failures += 1;
                    match self.options.detail_policy {
                        DetailPolicy::KeepPartial => {
                            warn!(target_name = name, key = %key, error = %e, "Detail fetch failed, keeping list fields");
                        }
                        DetailPolicy::Drop => {
                            warn!(target_name = name, key = %key, error = %e, "Detail fetch failed, dropping record");
                            return Ok(());
                        }
                        DetailPolicy::Abort => return Err(e.into()),
                    }
                }
            }
        }

        if store.insert(key, record) {
            summary.new_records += 1;
        }
        if store.unsaved() >= self.target.persist_interval() {
            store.persist()?;
        }
        Ok(())
    }
}

/// Partition index and first page to continue from.
///
/// The partition is found by name, falling back to the saved index when the
/// portal no longer lists it. Only seekable targets can jump to the saved
/// page; the others walk the partition again from page 1, skipping known
/// records.
fn resume_point(partitions: &[String], cursor: &Cursor, seekable: bool) -> (usize, u32) {
    // A past-the-end cursor carries an empty name, which an unnamed
    // partition would otherwise match.
    let index = if cursor.partition_index >= partitions.len()
        || partitions[cursor.partition_index] == cursor.partition
    {
        cursor.partition_index
    } else {
        partitions
            .iter()
            .position(|p| *p == cursor.partition)
            .unwrap_or(cursor.partition_index)
    };
    let page = if seekable { cursor.page.max(1) } else { 1 };
    (index, page)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partitions() -> Vec<String> {
        ["Anderson", "Andrews", "Angelina"].map(String::from).to_vec()
    }

    fn cursor(partition: &str, partition_index: usize, page: u32) -> Cursor {
        Cursor {
            partition: partition.to_string(),
            partition_index,
            page,
        }
    }

    #[test]
    fn resume_matches_partition_by_name() {
        assert_eq!(resume_point(&partitions(), &cursor("Andrews", 0, 7), true), (1, 7));
    }

    #[test]
    fn resume_falls_back_to_index() {
        assert_eq!(resume_point(&partitions(), &cursor("Gone", 2, 3), true), (2, 3));
    }

    #[test]
    fn resume_restarts_page_for_sequential_targets() {
        assert_eq!(resume_point(&partitions(), &cursor("Andrews", 1, 7), false), (1, 1));
    }

    #[test]
    fn resume_past_the_end_skips_everything() {
        let (index, _) = resume_point(&partitions(), &cursor("", 3, 1), true);
        assert_eq!(index, 3);
        assert_eq!(partitions().iter().skip(index).count(), 0);
    }

    #[test]
    fn resume_past_the_end_of_unnamed_partition() {
        let single = vec![String::new()];
        assert_eq!(resume_point(&single, &cursor("", 1, 1), true), (1, 1));
        assert_eq!(resume_point(&single, &cursor("", 0, 5), true), (0, 5));
    }
}
