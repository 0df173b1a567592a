//! Load-once store for the raw tables.

use std::sync::Arc;

use crimes_france_source::{
    Fetcher,
    config::{self, SourcesConfig, TableSource},
    fetch::{FileFetcher, HttpFetcher},
    parsing,
};
use crimes_france_source_models::{Table, TableId};

use crate::{DatasetError, KeyNormalizer, Snapshot, single_flight::SingleFlight};

/// Owns the raw-table cache and the normalized snapshot.
///
/// Construct one store per process and share it (`Arc<DatasetStore>`)
/// with every component. Each table is retrieved at most once while it
/// loads successfully; concurrent first calls for the same table share one
/// retrieval and observe the same result. Failed loads are not cached.
pub struct DatasetStore {
    fetcher: Arc<dyn Fetcher>,
    config: SourcesConfig,
    local: bool,
    normalizer: KeyNormalizer,
    tables: [SingleFlight<Table, DatasetError>; 3],
    snapshot: SingleFlight<Snapshot, DatasetError>,
}

impl std::fmt::Debug for DatasetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetStore")
            .field("local", &self.local)
            .field("tables", &self.tables)
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}

const fn slot(table: TableId) -> usize {
    match table {
        TableId::Main => 0,
        TableId::Department => 1,
        TableId::CommuneMetadata => 2,
    }
}

impl DatasetStore {
    /// Creates a store reading the configured URLs through `fetcher`.
    ///
    /// The normalizer maps legacy commune codes through the configured
    /// crosswalk.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>, config: SourcesConfig) -> Self {
        let normalizer = KeyNormalizer::new().with_crosswalk(&config.crosswalk);
        Self {
            fetcher,
            config,
            local: false,
            normalizer,
            tables: std::array::from_fn(|_| SingleFlight::new()),
            snapshot: SingleFlight::new(),
        }
    }

    /// Makes the store ask the fetcher for each table's local file name
    /// instead of its URL.
    #[must_use]
    pub const fn with_local_files(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    /// Replaces the key normalizer used to build the snapshot.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: KeyNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Creates a store from the environment.
    ///
    /// Reads the configuration named by `CRIMES_FRANCE_CONFIG` (or the
    /// embedded one). When `CRIMES_FRANCE_DATA_DIR` is set, tables are read
    /// from that directory; otherwise they are downloaded.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Config`] if the configuration cannot be
    /// loaded or the HTTP client cannot be built.
    pub fn from_env() -> Result<Self, DatasetError> {
        let config_error = |e: crimes_france_source::SourceError| DatasetError::Config {
            message: e.to_string(),
        };
        let sources = SourcesConfig::from_env().map_err(config_error)?;

        if let Some(dir) = config::data_dir_from_env() {
            log::info!("Reading tables from {}", dir.display());
            return Ok(Self::new(Arc::new(FileFetcher::new(dir)), sources).with_local_files(true));
        }

        let fetcher = HttpFetcher::new().map_err(config_error)?;
        Ok(Self::new(Arc::new(fetcher), sources))
    }

    /// The source configuration.
    #[must_use]
    pub const fn config(&self) -> &SourcesConfig {
        &self.config
    }

    /// Returns a table, retrieving and decoding it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::SourceUnavailable`] if the table cannot be
    /// retrieved and [`DatasetError::ParseError`] if it cannot be decoded.
    pub async fn load(&self, table: TableId) -> Result<Arc<Table>, DatasetError> {
        let fetcher = Arc::clone(&self.fetcher);
        let source = self.config.table(table).clone();
        let location = source.location(self.local).to_string();

        self.tables[slot(table)]
            .get_or_load(move || retrieve(fetcher, table, source, location))
            .await
    }

    /// Returns a table if it has already been loaded.
    #[must_use]
    pub fn cached(&self, table: TableId) -> Option<Arc<Table>> {
        self.tables[slot(table)].get()
    }

    /// Returns the normalized snapshot if it has already been built.
    #[must_use]
    pub fn cached_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.get()
    }

    /// Returns the normalized snapshot, loading and normalizing the three
    /// tables on first use.
    ///
    /// # Errors
    ///
    /// Returns the first [`DatasetError`] raised while loading a table.
    pub async fn snapshot(&self) -> Result<Arc<Snapshot>, DatasetError> {
        if let Some(snapshot) = self.snapshot.get() {
            return Ok(snapshot);
        }

        let (main, department, metadata) = futures::try_join!(
            self.load(TableId::Main),
            self.load(TableId::Department),
            self.load(TableId::CommuneMetadata),
        )?;
        let population = self
            .config
            .national_reference()
            .map_err(|e| DatasetError::Config {
                message: e.to_string(),
            })?;
        let normalizer = self.normalizer.clone();

        self.snapshot
            .get_or_load(move || async move {
                tokio::task::spawn_blocking(move || {
                    Snapshot::from_tables(&normalizer, &main, &department, &metadata)
                        .map(|snapshot| snapshot.with_national_population(population))
                })
                .await
                .map_err(|e| DatasetError::ParseError {
                    table: TableId::Main,
                    message: format!("normalization task failed: {e}"),
                })?
            })
            .await
    }
}

async fn retrieve(
    fetcher: Arc<dyn Fetcher>,
    table: TableId,
    source: TableSource,
    location: String,
) -> Result<Table, DatasetError> {
    let bytes = fetcher.fetch(&location).await.map_err(|e| {
        log::warn!("{table}: retrieval from {location} failed: {e}");
        DatasetError::from_source(table, &e)
    })?;
    log::debug!("{table}: retrieved {} bytes", bytes.len());

    let decoded = tokio::task::spawn_blocking(move || parsing::decode_table(table, &source, &bytes))
        .await
        .map_err(|e| DatasetError::ParseError {
            table,
            message: format!("decoder task failed: {e}"),
        })?;

    decoded.map_err(|e| {
        log::error!("{table}: {e}");
        DatasetError::from_source(table, &e)
    })
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use crimes_france_source::SourceError;
    use tokio::sync::Notify;

    use super::*;

    const CONFIG: &str = r#"
        [tables.main]
        url = "https://example.org/main"
        format = "csv"
        [tables.department]
        url = "https://example.org/department"
        format = "csv"
        [tables.commune_metadata]
        url = "https://example.org/metadata"
        format = "csv"
        delimiter = ","
        [population.national]
        2021 = 67_407_241
    "#;

    const MAIN_CSV: &str = "\
CODGEO_2023;annee;classe;faits;POP
01001;16;Vols avec armes;2;767
01001;17;Vols avec armes;3;770
99999;17;Vols avec armes;9;100
";

    const DEPARTMENT_CSV: &str = "\
Code.département;annee;classe;faits;POP
01;16;Vols avec armes;200;643350
";

    const METADATA_CSV: &str = "\
CODGEO,LIBGEO,DEP,LIBDEP
01001,L'Abergement-Clémenciat,01,Ain
";

    #[derive(Default)]
    struct MockFetcher {
        payloads: HashMap<String, Vec<u8>>,
        calls: AtomicUsize,
        failures_left: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl MockFetcher {
        fn with_tables() -> Self {
            let payloads = [
                ("https://example.org/main", MAIN_CSV),
                ("https://example.org/department", DEPARTMENT_CSV),
                ("https://example.org/metadata", METADATA_CSV),
            ]
            .into_iter()
            .map(|(url, body)| (url.to_string(), body.as_bytes().to_vec()))
            .collect();
            Self {
                payloads,
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, location: &str) -> Result<Vec<u8>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(SourceError::Status {
                    status: 503,
                    url: location.to_string(),
                });
            }
            self.payloads
                .get(location)
                .cloned()
                .ok_or_else(|| SourceError::Status {
                    status: 404,
                    url: location.to_string(),
                })
        }
    }

    fn store(fetcher: &Arc<MockFetcher>) -> DatasetStore {
        let config = SourcesConfig::from_toml(CONFIG).unwrap();
        DatasetStore::new(Arc::clone(fetcher) as Arc<dyn Fetcher>, config)
    }

    #[tokio::test]
    async fn second_load_returns_cached_snapshot_without_refetching() {
        let fetcher = Arc::new(MockFetcher::with_tables());
        let store = store(&fetcher);

        let first = store.load(TableId::Main).await.unwrap();
        let second = store.load(TableId::Main).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(first.len(), 3);
        assert!(store.cached(TableId::Main).is_some());
        assert!(store.cached(TableId::Department).is_none());
    }

    #[tokio::test]
    async fn concurrent_first_loads_share_one_retrieval() {
        let gate = Arc::new(Notify::new());
        let fetcher = Arc::new(MockFetcher {
            gate: Some(Arc::clone(&gate)),
            ..MockFetcher::with_tables()
        });
        let store = store(&fetcher);

        let (a, b, ()) = tokio::join!(
            store.load(TableId::Main),
            store.load(TableId::Main),
            async {
                tokio::task::yield_now().await;
                gate.notify_one();
            }
        );

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn failed_retrieval_is_not_cached() {
        let fetcher = Arc::new(MockFetcher {
            failures_left: AtomicUsize::new(1),
            ..MockFetcher::with_tables()
        });
        let store = store(&fetcher);

        let err = store.load(TableId::Department).await.unwrap_err();
        assert!(matches!(
            err,
            DatasetError::SourceUnavailable {
                table: TableId::Department,
                ..
            }
        ));
        assert!(store.cached(TableId::Department).is_none());

        let table = store.load(TableId::Department).await.unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn undecodable_payload_is_a_parse_error() {
        let mut fetcher = MockFetcher::with_tables();
        fetcher.payloads.insert(
            "https://example.org/main".to_string(),
            b"CODGEO_2023,annee,classe,faits,POP\n01001,16,Vols avec armes,2,767\n".to_vec(),
        );
        let fetcher = Arc::new(fetcher);
        let store = store(&fetcher);

        let err = store.load(TableId::Main).await.unwrap_err();
        let DatasetError::ParseError { table, message } = err else {
            panic!("expected parse error, got {err:?}");
        };
        assert_eq!(table, TableId::Main);
        assert!(message.contains("delimiter"), "{message}");
    }

    #[tokio::test]
    async fn snapshot_normalizes_all_tables_once() {
        let fetcher = Arc::new(MockFetcher::with_tables());
        let store = store(&fetcher);

        assert!(store.cached_snapshot().is_none());
        let first = store.snapshot().await.unwrap();
        let second = store.snapshot().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(store.cached_snapshot().is_some());
        assert_eq!(fetcher.calls(), 3);

        assert_eq!(first.main().len(), 2);
        assert!(first.main().iter().all(|r| r.year >= 2016));
        assert_eq!(first.report(TableId::Main).unwrap().dropped_count(), 1);
        assert_eq!(first.department()[0].geography_code, "01");
        assert_eq!(first.national_population().get(&2021), Some(&67_407_241));
    }

    #[tokio::test]
    async fn configured_crosswalk_merges_legacy_communes() {
        let mut fetcher = MockFetcher::with_tables();
        fetcher.payloads.insert(
            "https://example.org/main".to_string(),
            format!("{MAIN_CSV}01999;16;Vols avec armes;4;233\n").into_bytes(),
        );
        let fetcher = Arc::new(fetcher);
        let config =
            SourcesConfig::from_toml(&format!("{CONFIG}\n[crosswalk]\n\"01999\" = \"01001\"\n"))
                .unwrap();
        let store = DatasetStore::new(Arc::clone(&fetcher) as Arc<dyn Fetcher>, config);

        let snapshot = store.snapshot().await.unwrap();
        let merged = snapshot
            .main()
            .iter()
            .find(|r| r.year == 2016)
            .unwrap();
        assert_eq!(merged.geography_code, "01001");
        assert_eq!(merged.offense_count, 6);
        assert_eq!(merged.population, Some(1000));
        assert_eq!(snapshot.main().len(), 2);
    }

    #[tokio::test]
    async fn local_files_use_file_names() {
        let mut fetcher = MockFetcher::default();
        fetcher
            .payloads
            .insert("main".to_string(), MAIN_CSV.as_bytes().to_vec());
        let fetcher = Arc::new(fetcher);
        let store = store(&fetcher).with_local_files(true);

        assert_eq!(store.load(TableId::Main).await.unwrap().len(), 3);
    }
}
