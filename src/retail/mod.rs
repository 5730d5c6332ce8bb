//! Phase 3 — Retail catalog acquisition. Fetches, pages, caches, and
//! queries Azure Retail Prices rows (§4.1). Cache is append-only JSONL per
//! shard; concurrent callers for the same shard coalesce onto one
//! in-flight fetch (§5).

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use crate::domain::catalog::{CatalogRow, CatalogShard, ShardKey, ShardManifest};
use crate::error::{CostPilotError, Result};
use crate::retry::{RetryConfig, RetryPolicy};

const RETAIL_PRICES_ENDPOINT: &str = "https://prices.azure.com/api/retail/prices";

#[derive(Deserialize)]
struct RetailPricesPage {
    #[serde(rename = "Items")]
    items: Vec<serde_json::Value>,
    #[serde(rename = "NextPageLink")]
    next_page_link: Option<String>,
}

/// One RetailCatalog instance owns exactly one cache directory (§5: "one
/// RetailCatalog instance per (cache_dir)").
pub struct RetailCatalog {
    cache_dir: PathBuf,
    client: Client,
    retry: RetryPolicy,
    in_flight: Mutex<HashMap<ShardKey, Arc<Notify>>>,
}

impl RetailCatalog {
    pub fn new(cache_dir: impl Into<PathBuf>, http_timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir)?;
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(http_timeout_secs))
            .build()?;
        let retry = RetryPolicy::new(RetryConfig::new(
            max_retries,
            std::time::Duration::from_millis(500),
            std::time::Duration::from_secs(10),
        ));
        Ok(Self {
            cache_dir,
            client,
            retry,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    fn shard_path(&self, key: &ShardKey) -> PathBuf {
        self.cache_dir.join(format!("{}.jsonl", key.file_stem()))
    }

    fn manifest_path(&self, key: &ShardKey) -> PathBuf {
        self.cache_dir.join(format!("{}.manifest.json", key.file_stem()))
    }

    /// Returns the local shard if present and `refresh` is false; otherwise
    /// fetches all pages, writing rows as they arrive (crash-safe append).
    /// An empty `candidate_services` set yields an empty shard without any
    /// network call (§4.1 edge case).
    pub async fn get_or_fetch(
        &self,
        key: ShardKey,
        candidate_services: &[String],
        region: &str,
        currency: &str,
        refresh: bool,
    ) -> Result<CatalogShard> {
        if !refresh {
            if let Some(shard) = self.read_shard(&key)? {
                return Ok(shard);
            }
        }

        if candidate_services.is_empty() {
            return Ok(CatalogShard::empty(key));
        }

        // Coalesce concurrent fetches of the same shard (§5).
        let notify = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(existing) = in_flight.get(&key) {
                Some(existing.clone())
            } else {
                in_flight.insert(key.clone(), Arc::new(Notify::new()));
                None
            }
        };

        if let Some(notify) = notify {
            notify.notified().await;
            return self
                .read_shard(&key)?
                .ok_or_else(|| CostPilotError::CatalogFetch {
                    shard: key.file_stem(),
                    reason: "coalesced fetch completed but shard file is missing".to_string(),
                });
        }

        let result = self.fetch_all_pages(&key, candidate_services, region, currency).await;

        let notify = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight.remove(&key)
        };
        if let Some(notify) = notify {
            notify.notify_waiters();
        }

        result
    }

    async fn fetch_all_pages(
        &self,
        key: &ShardKey,
        candidate_services: &[String],
        region: &str,
        currency: &str,
    ) -> Result<CatalogShard> {
        let shard_path = self.shard_path(key);
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&shard_path)?;

        let filter = build_filter(candidate_services, region, currency);
        let mut next_url: Option<String> = Some(format!("{RETAIL_PRICES_ENDPOINT}?$filter={filter}"));
        let mut all_rows = Vec::new();
        let mut row_count = 0usize;

        while let Some(url) = next_url.take() {
            let page = self
                .retry
                .execute(|| async {
                    let response = self.client.get(&url).send().await?;
                    if !response.status().is_success() {
                        return Err(CostPilotError::CatalogFetch {
                            shard: key.file_stem(),
                            reason: format!("HTTP status {}", response.status()),
                        });
                    }
                    response
                        .json::<RetailPricesPage>()
                        .await
                        .map_err(CostPilotError::from)
                })
                .await
                .map_err(|err| CostPilotError::CatalogFetch {
                    shard: key.file_stem(),
                    reason: err.to_string(),
                })?;

            for row in convert_items(page.items, &key.file_stem()) {
                if let Err(err) = serde_json::to_writer(&mut file, &row) {
                    warn!(shard = %key.file_stem(), error = %err, "skipping unserializable row");
                    continue;
                }
                let _ = file.write_all(b"\n");
                row_count += 1;
                all_rows.push(row);
            }
            next_url = page.next_page_link;
        }
        file.flush()?;

        let manifest = ShardManifest {
            fetched_at: Utc::now(),
            row_count,
            next_page_cursor: None,
            hash: format!("{:x}", {
                use sha2::{Digest, Sha256};
                let mut hasher = Sha256::new();
                hasher.update(key.file_stem().as_bytes());
                hasher.update(row_count.to_le_bytes());
                hasher.finalize()
            }),
        };
        std::fs::write(self.manifest_path(key), serde_json::to_string_pretty(&manifest)?)?;

        debug!(shard = %key.file_stem(), rows = row_count, "fetched shard");

        Ok(CatalogShard {
            key: key.clone(),
            rows: all_rows,
            manifest: Some(manifest),
        })
    }

    /// Reads a shard from disk, tolerant of a truncated trailing line
    /// (§4.1 edge case: "a shard that crashed mid-write is recoverable").
    fn read_shard(&self, key: &ShardKey) -> Result<Option<CatalogShard>> {
        let path = self.shard_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let file = std::fs::File::open(&path)?;
        let reader = std::io::BufReader::new(file);
        let mut rows = Vec::new();
        let mut lines: Vec<String> = reader.lines().collect::<std::result::Result<_, _>>()?;

        // The last line may be a partial write from a crashed fetch; if it
        // fails to parse, drop it rather than failing the whole read.
        if let Some(last) = lines.last() {
            if serde_json::from_str::<CatalogRow>(last).is_err() {
                lines.pop();
            }
        }

        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CatalogRow>(&line) {
                Ok(row) => rows.push(row),
                Err(err) => warn!(shard = %key.file_stem(), error = %err, "dropping malformed cache line"),
            }
        }

        let manifest = std::fs::read_to_string(self.manifest_path(key))
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok());

        Ok(Some(CatalogShard {
            key: key.clone(),
            rows,
            manifest,
        }))
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

/// Converts one page's raw JSON rows to `CatalogRow`s one at a time. A row
/// that fails to convert (unmodeled `type`, missing price, bad date, ...) is
/// logged and dropped; it never fails the page (§9).
fn convert_items(items: Vec<serde_json::Value>, shard: &str) -> Vec<CatalogRow> {
    items
        .into_iter()
        .filter_map(|raw_row| match serde_json::from_value::<CatalogRow>(raw_row) {
            Ok(row) => Some(row),
            Err(err) => {
                warn!(shard = %shard, error = %err, "skipping row that failed to convert");
                None
            }
        })
        .collect()
}

fn build_filter(candidate_services: &[String], region: &str, currency: &str) -> String {
    let service_clause = candidate_services
        .iter()
        .map(|s| format!("serviceName eq '{s}'"))
        .collect::<Vec<_>>()
        .join(" or ");
    format!(
        "({service_clause}) and armRegionName eq '{region}' and currencyCode eq '{currency}'"
    )
}
