//! Full reloads, incremental pages and metadata.

use tokio::sync::mpsc;

use tabula_core::{EngineError, LiveEvent};

use crate::engine::{now_ms, QueryStateEngine};
use crate::flatten;
use crate::pagination::{advance, next_batch_size};
use crate::rows::PageMode;
use crate::service::FetchRequest;

impl QueryStateEngine {
    /// Load metadata, start live updates if configured, and reload.
    ///
    /// Returns the live event stream when live updates were started; drive
    /// it with `run_live_events`.
    pub async fn open(&self) -> Result<Option<mpsc::UnboundedReceiver<LiveEvent>>, EngineError> {
        self.load_metadata().await?;

        let events = if self.config.live_updates {
            Some(self.subscribe_live().await?)
        } else {
            None
        };

        self.reload().await?;
        Ok(events)
    }

    /// Fetch object metadata for the current object type.
    ///
    /// Metadata drives default searchability and column sortability.
    pub async fn load_metadata(&self) -> Result<(), EngineError> {
        let object_type = self.table.read(|s| s.query.object_type.clone());
        let info = self.service.object_metadata(object_type.clone()).await?;

        self.table.modify(|s| {
            if s.query.object_type == object_type {
                tracing::debug!(
                    "Loaded metadata for '{}' ({} fields)",
                    object_type,
                    info.fields.len()
                );
                s.metadata = Some(info);
            } else {
                tracing::debug!("Discarding metadata for previous object '{}'", object_type);
            }
        });
        Ok(())
    }

    /// Replace the held rows with the first page of the current query.
    ///
    /// A response that arrives after a newer reload or invalidation is
    /// dropped. A failed fetch leaves the held rows, offset and paging state
    /// as they were.
    pub async fn reload(&self) -> Result<(), EngineError> {
        let (generation, had_more, request) = self.table.modify(|s| -> Result<_, EngineError> {
            let query_string = s.query.build_initial(s.metadata.as_ref())?;
            let generation = s.bump_generation();
            let had_more = s.cursor.has_more();
            // No paging until the first page is in.
            s.cursor.reset(false);
            s.loading = true;
            Ok((
                generation,
                had_more,
                FetchRequest {
                    object_type: s.query.object_type.clone(),
                    filter: s.query.filter.clone(),
                    query_string,
                },
            ))
        })?;

        tracing::debug!("Reload (generation {}): {}", generation, request.query_string);
        let result = self.service.fetch(request).await;

        self.table.modify(|s| -> Result<(), EngineError> {
            if !s.is_current(generation) {
                tracing::debug!(
                    "Discarding stale reload (generation {}, current {})",
                    generation,
                    s.generation
                );
                return Ok(());
            }
            s.loading = false;

            let parsed = result.map_err(EngineError::from).and_then(|page| {
                let total_count = page.total_count;
                Ok((flatten::to_records(page.rows)?, total_count))
            });
            let (records, total_count) = match parsed {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!("Reload failed: {}", e);
                    s.cursor.reset(had_more);
                    s.table_error = Some(e.to_string());
                    return Err(e);
                }
            };

            let paging = s.query.paging;
            let fetched = records.len();
            let (offset, more) = advance(0, fetched, paging.initial_limit(), paging.max_records);

            s.rows.apply_page(records, PageMode::Replace);
            s.query.offset = offset;
            s.cursor.reset(self.config.infinite_loading && more);
            s.record_count = total_count;
            s.table_error = None;
            s.guard.mark_refreshed(now_ms());

            tracing::info!(
                "Loaded {} rows of '{}' (more: {})",
                fetched,
                s.query.object_type,
                s.cursor.has_more()
            );
            Ok(())
        })
    }

    /// Append the next page. Returns false if there was nothing to load.
    ///
    /// Calling this while a page is in flight fails with
    /// `EngineError::LoadInProgress`. A failed fetch leaves rows and offset
    /// as they were.
    pub async fn load_more(&self) -> Result<bool, EngineError> {
        let prepared = self.table.modify(|s| -> Result<_, EngineError> {
            s.cursor.begin()?;
            if !s.cursor.has_more() {
                s.cursor.abort();
                return Ok(None);
            }

            let paging = s.query.paging;
            let batch = next_batch_size(s.query.offset, paging.records_per_batch, paging.max_records);
            if batch <= 0 {
                s.cursor.exhaust();
                return Ok(None);
            }

            let batch = batch as usize;
            let query_string = match s.query.build_page(batch, s.metadata.as_ref()) {
                Ok(query) => query,
                Err(e) => {
                    s.cursor.abort();
                    return Err(e.into());
                }
            };

            Ok(Some((
                s.generation,
                batch,
                FetchRequest {
                    object_type: s.query.object_type.clone(),
                    filter: s.query.filter.clone(),
                    query_string,
                },
            )))
        })?;

        let Some((generation, batch, request)) = prepared else {
            return Ok(false);
        };

        tracing::debug!("Load more: {}", request.query_string);
        let result = self.service.fetch(request).await;

        self.table.modify(|s| -> Result<bool, EngineError> {
            // An invalidation or reload already released the cursor.
            if !s.is_current(generation) {
                tracing::debug!("Discarding stale page (generation {})", generation);
                return Ok(false);
            }

            let records = match result
                .map_err(EngineError::from)
                .and_then(|page| flatten::to_records(page.rows).map_err(EngineError::from))
            {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!("Load more failed: {}", e);
                    s.cursor.abort();
                    s.table_error = Some(e.to_string());
                    return Err(e);
                }
            };

            let fetched = records.len();
            let (offset, more) = advance(s.query.offset, fetched, batch, s.query.paging.max_records);

            s.rows.apply_page(records, PageMode::Append);
            s.query.offset = offset;
            s.cursor.complete(more);
            s.table_error = None;

            tracing::debug!("Appended {} rows, offset {} (more: {})", fetched, offset, more);
            Ok(true)
        })
    }
}
