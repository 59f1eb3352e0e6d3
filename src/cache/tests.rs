use super::*;
use crate::cache::clock::ManualClock;
use crate::grid::CellValue;
use crate::grid::RawGrid;
use parking_lot::Condvar;
use std::sync::atomic::AtomicUsize;
use std::sync::Barrier;
use std::thread;
use std::time::SystemTime;

const WAIT_LIMIT: Duration = Duration::from_secs(10);

type Sheets = Vec<(String, Vec<Vec<CellValue>>)>;

#[derive(Default)]
struct Book {
    version: u64,
    sheets: Sheets,
}

/// In-memory decoder counting decodes, optionally held at a gate.
#[derive(Default)]
struct StubState {
    books: Mutex<HashMap<PathBuf, Book>>,
    decodes: AtomicUsize,
    gated: Mutex<bool>,
    gate: Condvar,
    panic_on_decode: Mutex<bool>,
}

#[derive(Clone, Default)]
struct StubDecoder {
    state: Arc<StubState>,
}

impl StubDecoder {
    fn with_book(self, path: &str, sheets: Sheets) -> Self {
        self.state.books.lock().insert(
            PathBuf::from(path),
            Book { version: 1, sheets },
        );
        self
    }

    fn decodes(&self) -> usize {
        self.state.decodes.load(Ordering::SeqCst)
    }

    /// Simulates the file being rewritten on disk.
    fn touch(&self, path: &str) {
        if let Some(book) = self.state.books.lock().get_mut(Path::new(path)) {
            book.version += 1;
        }
    }

    fn close_gate(&self) {
        *self.state.gated.lock() = true;
    }

    fn open_gate(&self) {
        *self.state.gated.lock() = false;
        self.state.gate.notify_all();
    }

    fn panic_on_decode(&self) {
        *self.state.panic_on_decode.lock() = true;
    }
}

impl TableDecoder for StubDecoder {
    fn decode(&self, path: &Path, sheet_name: &str) -> Result<RawGrid, DecodeError> {
        self.state.decodes.fetch_add(1, Ordering::SeqCst);
        {
            let mut gated = self.state.gated.lock();
            while *gated {
                self.state.gate.wait(&mut gated);
            }
        }
        if *self.state.panic_on_decode.lock() {
            panic!("decoder blew up");
        }
        let books = self.state.books.lock();
        let book = books
            .get(path)
            .ok_or_else(|| DecodeError::FileNotFound(path.to_path_buf()))?;
        let rows = book
            .sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, rows)| rows.clone())
            .ok_or_else(|| DecodeError::SheetNotFound {
                path: path.to_path_buf(),
                sheet: sheet_name.to_owned(),
            })?;
        Ok(RawGrid::new(path, sheet_name, rows))
    }

    fn list_sheets(&self, path: &Path) -> Result<Vec<String>, DecodeError> {
        let books = self.state.books.lock();
        let book = books
            .get(path)
            .ok_or_else(|| DecodeError::FileNotFound(path.to_path_buf()))?;
        Ok(book.sheets.iter().map(|(name, _)| name.to_owned()).collect())
    }

    fn identity(&self, path: &Path) -> Result<FileIdentity, DecodeError> {
        let books = self.state.books.lock();
        let book = books
            .get(path)
            .ok_or_else(|| DecodeError::FileNotFound(path.to_path_buf()))?;
        Ok(FileIdentity {
            size: 1024,
            modified_at: SystemTime::UNIX_EPOCH + Duration::from_secs(book.version),
        })
    }
}

fn text(value: &str) -> CellValue {
    CellValue::Text(value.to_owned())
}

fn people(rows: usize) -> Vec<Vec<CellValue>> {
    let mut grid = vec![vec![text("Name"), text("Age")]];
    for index in 0..rows {
        grid.push(vec![text(&format!("person {index}")), CellValue::Number(20.0 + index as f64)]);
    }
    grid
}

fn sheet(name: &str, rows: Vec<Vec<CellValue>>) -> Sheets {
    vec![(name.to_owned(), rows)]
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let started = Instant::now();
    while !condition() {
        assert!(started.elapsed() < WAIT_LIMIT, "condition not reached in time");
        thread::sleep(Duration::from_millis(2));
    }
}

fn assert_accounting(cache: &TableCache) {
    let index = cache.inner.index.lock();
    let sum = index.entries.values().map(|entry| entry.memory_bytes).sum::<usize>();
    assert_eq!(index.total_bytes, sum);
}

#[test]
fn repeated_get_shares_one_table() {
    let decoder = StubDecoder::default().with_book("/books/a.xlsx", sheet("People", people(3)));
    let cache = TableCache::new(CacheConfig::default(), decoder.clone());

    let first = cache.get("/books/a.xlsx", "People", None).unwrap();
    let second = cache.get("/books/a.xlsx", "People", None).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(decoder.decodes(), 1);
    assert_eq!(first.column_names(), vec!["Name", "Age"]);
    assert_eq!(first.row_count(), 3);
    assert_eq!(first.provenance().header_row, 0);

    let stats = cache.stats();
    assert_eq!(stats.entry_count, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.decodes, 1);
    assert_eq!(stats.in_flight, 0);
}

#[test]
fn explicit_row_matching_detection_hits_same_entry() {
    let decoder = StubDecoder::default().with_book("/books/a.xlsx", sheet("People", people(3)));
    let cache = TableCache::new(CacheConfig::default(), decoder.clone());

    let detected = cache.get("/books/a.xlsx", "People", None).unwrap();
    let explicit = cache.get("/books/a.xlsx", "People", Some(0)).unwrap();

    assert!(Arc::ptr_eq(&detected, &explicit));
    assert_eq!(decoder.decodes(), 1);
    assert_eq!(cache.stats().entry_count, 1);
}

#[test]
fn explicit_rows_are_separate_entries() {
    let decoder = StubDecoder::default().with_book("/books/a.xlsx", sheet("People", people(3)));
    let cache = TableCache::new(CacheConfig::default(), decoder.clone());

    let first = cache.get("/books/a.xlsx", "People", Some(0)).unwrap();
    let second = cache.get("/books/a.xlsx", "People", Some(1)).unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.row_count(), 2);
    assert_eq!(second.provenance().confidence, 1.0);
    assert_eq!(decoder.decodes(), 2);
    assert_eq!(cache.stats().entry_count, 2);
}

#[test]
fn changed_file_is_decoded_once_more() {
    let decoder = StubDecoder::default().with_book("/books/a.xlsx", sheet("People", people(3)));
    let cache = TableCache::new(CacheConfig::default(), decoder.clone());

    let before = cache.get("/books/a.xlsx", "People", None).unwrap();
    decoder.touch("/books/a.xlsx");
    let after = cache.get("/books/a.xlsx", "People", None).unwrap();
    let again = cache.get("/books/a.xlsx", "People", None).unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    assert!(Arc::ptr_eq(&after, &again));
    assert_eq!(decoder.decodes(), 2);
    assert_eq!(cache.stats().entry_count, 1);
    assert_eq!(before.row_count(), 3);
    assert_ne!(before.provenance().identity, after.provenance().identity);
    assert_accounting(&cache);
}

#[test]
fn changed_file_drops_every_sheet_of_old_version() {
    let sheets = vec![
        ("People".to_owned(), people(3)),
        ("More".to_owned(), people(5)),
    ];
    let decoder = StubDecoder::default().with_book("/books/a.xlsx", sheets);
    let cache = TableCache::new(CacheConfig::default(), decoder.clone());

    cache.get("/books/a.xlsx", "People", None).unwrap();
    cache.get("/books/a.xlsx", "More", None).unwrap();
    assert_eq!(cache.stats().entry_count, 2);

    decoder.touch("/books/a.xlsx");
    cache.get("/books/a.xlsx", "People", None).unwrap();

    let stats = cache.stats();
    assert_eq!(stats.entry_count, 1);
    assert_eq!(stats.evictions, 2);
}

#[test]
fn invalidate_twice_is_harmless() {
    let sheets = vec![
        ("People".to_owned(), people(3)),
        ("More".to_owned(), people(5)),
    ];
    let decoder = StubDecoder::default()
        .with_book("/books/a.xlsx", sheets)
        .with_book("/books/b.xlsx", sheet("People", people(2)));
    let cache = TableCache::new(CacheConfig::default(), decoder.clone());

    cache.get("/books/a.xlsx", "People", None).unwrap();
    cache.get("/books/a.xlsx", "More", Some(0)).unwrap();
    cache.get("/books/b.xlsx", "People", None).unwrap();

    cache.invalidate("/books/a.xlsx");
    assert_eq!(cache.stats().entry_count, 1);
    cache.invalidate("/books/a.xlsx");
    assert_eq!(cache.stats().entry_count, 1);
    cache.invalidate("/books/never-seen.xlsx");
    assert_accounting(&cache);

    cache.get("/books/a.xlsx", "People", None).unwrap();
    assert_eq!(decoder.decodes(), 4);
}

#[test]
fn memory_pressure_evicts_least_recently_used() {
    let decoder = StubDecoder::default()
        .with_book("/books/a.xlsx", sheet("People", people(10)))
        .with_book("/books/b.xlsx", sheet("People", people(10)))
        .with_book("/books/c.xlsx", sheet("People", people(10)));
    let sizing = TableCache::new(CacheConfig::default(), decoder.clone());
    sizing.get("/books/a.xlsx", "People", None).unwrap();
    let one = sizing.stats().total_memory_bytes;

    let config = CacheConfig {
        max_memory_bytes: one * 2 + one / 2,
        ..CacheConfig::default()
    };
    let cache = TableCache::new(config, decoder.clone());
    cache.get("/books/a.xlsx", "People", None).unwrap();
    let b = cache.get("/books/b.xlsx", "People", None).unwrap();
    cache.get("/books/a.xlsx", "People", None).unwrap();
    cache.get("/books/c.xlsx", "People", None).unwrap();

    let stats = cache.stats();
    assert_eq!(stats.entry_count, 2);
    assert!(stats.total_memory_bytes <= stats.max_memory_bytes);
    assert_eq!(b.row_count(), 10);

    let decodes = decoder.decodes();
    cache.get("/books/a.xlsx", "People", None).unwrap();
    assert_eq!(decoder.decodes(), decodes);
    cache.get("/books/b.xlsx", "People", None).unwrap();
    assert_eq!(decoder.decodes(), decodes + 1);
    assert_accounting(&cache);
}

#[test]
fn larger_table_evicts_smaller_one_under_tight_budget() {
    let decoder = StubDecoder::default()
        .with_book("/books/small.xlsx", sheet("People", people(5)))
        .with_book("/books/large.xlsx", sheet("People", people(50)));
    let sizing = TableCache::new(CacheConfig::default(), decoder.clone());
    sizing.get("/books/small.xlsx", "People", None).unwrap();
    sizing.get("/books/large.xlsx", "People", None).unwrap();
    let both = sizing.stats().total_memory_bytes;

    let config = CacheConfig {
        max_memory_bytes: both - 1,
        ..CacheConfig::default()
    };
    let cache = TableCache::new(config, decoder.clone());
    let small = cache.get("/books/small.xlsx", "People", None).unwrap();
    let large = cache.get("/books/large.xlsx", "People", None).unwrap();

    let stats = cache.stats();
    assert_eq!(stats.entry_count, 1);
    assert_eq!(stats.evictions, 1);
    assert_eq!(small.row_count(), 5);
    assert_eq!(large.row_count(), 50);

    let decodes = decoder.decodes();
    let reloaded = cache.get("/books/small.xlsx", "People", None).unwrap();
    assert_eq!(decoder.decodes(), decodes + 1);
    assert!(!Arc::ptr_eq(&small, &reloaded));
}

#[test]
fn oversized_table_is_kept_alone() {
    let decoder = StubDecoder::default()
        .with_book("/books/a.xlsx", sheet("People", people(10)))
        .with_book("/books/b.xlsx", sheet("People", people(10)));
    let config = CacheConfig {
        max_memory_bytes: 1,
        ..CacheConfig::default()
    };
    let cache = TableCache::new(config, decoder);

    cache.get("/books/a.xlsx", "People", None).unwrap();
    assert_eq!(cache.stats().entry_count, 1);
    let b = cache.get("/books/b.xlsx", "People", None).unwrap();

    let stats = cache.stats();
    assert_eq!(stats.entry_count, 1);
    assert_eq!(stats.total_memory_bytes, {
        let index = cache.inner.index.lock();
        index.entries.values().map(|entry| entry.memory_bytes).sum::<usize>()
    });
    let again = cache.get("/books/b.xlsx", "People", None).unwrap();
    assert!(Arc::ptr_eq(&b, &again));
}

#[test]
fn entry_bound_evicts_oldest() {
    let decoder = StubDecoder::default()
        .with_book("/books/a.xlsx", sheet("People", people(2)))
        .with_book("/books/b.xlsx", sheet("People", people(2)))
        .with_book("/books/c.xlsx", sheet("People", people(2)));
    let config = CacheConfig {
        max_entries: Some(2),
        ..CacheConfig::default()
    };
    let cache = TableCache::new(config, decoder.clone());

    cache.get("/books/a.xlsx", "People", None).unwrap();
    cache.get("/books/b.xlsx", "People", None).unwrap();
    cache.get("/books/c.xlsx", "People", None).unwrap();
    assert_eq!(cache.stats().entry_count, 2);

    cache.get("/books/c.xlsx", "People", None).unwrap();
    cache.get("/books/b.xlsx", "People", None).unwrap();
    assert_eq!(decoder.decodes(), 3);
    cache.get("/books/a.xlsx", "People", None).unwrap();
    assert_eq!(decoder.decodes(), 4);
}

#[test]
fn idle_entries_expire() {
    let clock = Arc::new(ManualClock::new());
    let decoder = StubDecoder::default()
        .with_book("/books/a.xlsx", sheet("People", people(2)))
        .with_book("/books/b.xlsx", sheet("People", people(2)));
    let cache = TableCache::with_clock(CacheConfig::default(), decoder.clone(), clock.clone());

    cache.get("/books/a.xlsx", "People", None).unwrap();
    clock.advance(Duration::from_secs(300));
    assert_eq!(cache.stats().oldest_idle_seconds, 300.0);
    assert_eq!(cache.evict_idle(), 0);

    clock.advance(Duration::from_secs(1));
    assert_eq!(cache.evict_idle(), 1);
    let stats = cache.stats();
    assert_eq!(stats.entry_count, 0);
    assert_eq!(stats.total_memory_bytes, 0);
    assert_eq!(stats.oldest_idle_seconds, 0.0);
}

#[test]
fn get_sweeps_idle_entries_first() {
    let clock = Arc::new(ManualClock::new());
    let decoder = StubDecoder::default()
        .with_book("/books/a.xlsx", sheet("People", people(2)))
        .with_book("/books/b.xlsx", sheet("People", people(2)));
    let cache = TableCache::with_clock(CacheConfig::default(), decoder.clone(), clock.clone());

    cache.get("/books/a.xlsx", "People", None).unwrap();
    clock.advance(Duration::from_secs(200));
    cache.get("/books/b.xlsx", "People", None).unwrap();
    clock.advance(Duration::from_secs(150));
    cache.get("/books/b.xlsx", "People", None).unwrap();

    let stats = cache.stats();
    assert_eq!(stats.entry_count, 1);
    assert_eq!(stats.evictions, 1);
    cache.get("/books/a.xlsx", "People", None).unwrap();
    assert_eq!(decoder.decodes(), 3);
}

#[test]
fn reaper_sweeps_in_background() {
    let clock = Arc::new(ManualClock::new());
    let decoder = StubDecoder::default().with_book("/books/a.xlsx", sheet("People", people(2)));
    let cache = TableCache::with_clock(CacheConfig::default(), decoder, clock.clone());

    cache.get("/books/a.xlsx", "People", None).unwrap();
    let reaper = cache.spawn_reaper(Duration::from_millis(5)).unwrap();
    clock.advance(Duration::from_secs(301));
    wait_until(|| cache.stats().entry_count == 0);
    reaper.stop();
}

#[test]
fn concurrent_misses_decode_once() {
    const CALLERS: usize = 8;
    let decoder = StubDecoder::default().with_book("/books/a.xlsx", sheet("People", people(20)));
    decoder.close_gate();
    let cache = TableCache::new(CacheConfig::default(), decoder.clone());
    let barrier = Arc::new(Barrier::new(CALLERS));

    let callers = (0..CALLERS)
        .map(|_| {
            let cache = cache.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get("/books/a.xlsx", "People", None)
            })
        })
        .collect::<Vec<_>>();

    wait_until(|| cache.stats().misses == CALLERS as u64);
    assert_eq!(cache.stats().in_flight, 1);
    decoder.open_gate();

    let tables = callers
        .into_iter()
        .map(|caller| caller.join().unwrap().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(decoder.decodes(), 1);
    assert!(tables.iter().all(|table| Arc::ptr_eq(table, &tables[0])));
    assert_eq!(cache.stats().in_flight, 0);
}

#[test]
fn explicit_row_shares_detection_in_flight() {
    let decoder = StubDecoder::default().with_book("/books/a.xlsx", sheet("People", people(5)));
    decoder.close_gate();
    let cache = TableCache::new(CacheConfig::default(), decoder.clone());

    let detecting = {
        let cache = cache.clone();
        thread::spawn(move || cache.get("/books/a.xlsx", "People", None))
    };
    wait_until(|| cache.stats().in_flight == 1);
    let explicit = [0, 1].map(|row| {
        let cache = cache.clone();
        thread::spawn(move || cache.get("/books/a.xlsx", "People", Some(row)))
    });
    wait_until(|| cache.stats().misses == 3);
    assert_eq!(cache.stats().in_flight, 1);
    decoder.open_gate();

    let detected = detecting.join().unwrap().unwrap();
    let [first, second] = explicit.map(|caller| caller.join().unwrap().unwrap());
    assert_eq!(detected.provenance().header_row, 0);
    assert!(Arc::ptr_eq(&detected, &first));
    assert_eq!(second.provenance().header_row, 1);
    assert_eq!(decoder.decodes(), 2);
    assert_eq!(cache.stats().misses, 3);
}

#[test]
fn deadline_expires_while_build_continues() {
    let decoder = StubDecoder::default().with_book("/books/a.xlsx", sheet("People", people(3)));
    decoder.close_gate();
    let cache = TableCache::new(CacheConfig::default(), decoder.clone());

    let builder = {
        let cache = cache.clone();
        thread::spawn(move || cache.get("/books/a.xlsx", "People", None))
    };
    wait_until(|| cache.stats().in_flight == 1);

    let result = cache.get_with_deadline(
        "/books/a.xlsx",
        "People",
        None,
        Instant::now() + Duration::from_millis(20),
    );
    assert!(matches!(result, Err(CacheError::BuildTimeout { .. })));

    decoder.open_gate();
    let built = builder.join().unwrap().unwrap();
    let cached = cache.get("/books/a.xlsx", "People", None).unwrap();
    assert!(Arc::ptr_eq(&built, &cached));
    assert_eq!(decoder.decodes(), 1);
}

#[test]
fn waiters_share_the_builders_failure() {
    let decoder = StubDecoder::default().with_book("/books/a.xlsx", sheet("People", people(3)));
    decoder.close_gate();
    let cache = TableCache::new(CacheConfig::default(), decoder.clone());

    let builder = {
        let cache = cache.clone();
        thread::spawn(move || cache.get("/books/a.xlsx", "Missing", None))
    };
    wait_until(|| cache.stats().in_flight == 1);
    let waiter = {
        let cache = cache.clone();
        thread::spawn(move || cache.get("/books/a.xlsx", "Missing", None))
    };
    wait_until(|| cache.stats().misses == 2);
    decoder.open_gate();

    let built = builder.join().unwrap();
    let waited = waiter.join().unwrap();
    assert!(matches!(
        built,
        Err(CacheError::SourceUnavailable {
            cause: DecodeError::SheetNotFound { .. },
            ..
        })
    ));
    assert_eq!(built.unwrap_err(), waited.unwrap_err());
    assert_eq!(decoder.decodes(), 1);

    let stats = cache.stats();
    assert_eq!(stats.entry_count, 0);
    assert_eq!(stats.in_flight, 0);
}

#[test]
fn panicking_builder_releases_waiters() {
    let decoder = StubDecoder::default().with_book("/books/a.xlsx", sheet("People", people(3)));
    decoder.close_gate();
    decoder.panic_on_decode();
    let cache = TableCache::new(CacheConfig::default(), decoder.clone());

    let builder = {
        let cache = cache.clone();
        thread::spawn(move || cache.get("/books/a.xlsx", "People", None))
    };
    wait_until(|| cache.stats().in_flight == 1);
    let waiter = {
        let cache = cache.clone();
        thread::spawn(move || cache.get("/books/a.xlsx", "People", None))
    };
    wait_until(|| cache.stats().misses == 2);
    decoder.open_gate();

    assert!(builder.join().is_err());
    assert!(matches!(waiter.join().unwrap(), Err(CacheError::BuildAbandoned { .. })));
    let stats = cache.stats();
    assert_eq!(stats.in_flight, 0);
    assert_eq!(stats.entry_count, 0);
}

#[test]
fn header_row_out_of_range() {
    let decoder = StubDecoder::default().with_book("/books/a.xlsx", sheet("People", people(3)));
    let cache = TableCache::new(CacheConfig::default(), decoder);

    let result = cache.get("/books/a.xlsx", "People", Some(4));
    assert_eq!(
        result.unwrap_err(),
        CacheError::InvalidHeaderRow {
            sheet: "People".to_owned(),
            row: 4,
            row_count: 4,
        }
    );
    let stats = cache.stats();
    assert_eq!(stats.entry_count, 0);
    assert_eq!(stats.in_flight, 0);
}

#[test]
fn empty_sheet_fails_detection() {
    let decoder = StubDecoder::default().with_book("/books/a.xlsx", sheet("Blank", Vec::new()));
    let cache = TableCache::new(CacheConfig::default(), decoder);

    let result = cache.get("/books/a.xlsx", "Blank", None);
    assert!(matches!(result, Err(CacheError::Detect(DetectError::EmptyGrid(_)))));
    assert_eq!(cache.stats().entry_count, 0);
}

#[test]
fn failures_are_not_cached() {
    let decoder = StubDecoder::default().with_book("/books/a.xlsx", sheet("People", people(3)));
    let cache = TableCache::new(CacheConfig::default(), decoder.clone());

    assert!(cache.get("/books/a.xlsx", "Missing", None).is_err());
    assert!(cache.get("/books/a.xlsx", "Missing", None).is_err());
    assert_eq!(decoder.decodes(), 2);
    assert_eq!(cache.stats().entry_count, 0);
}

#[test]
fn missing_file_skips_decoding() {
    let decoder = StubDecoder::default();
    let cache = TableCache::new(CacheConfig::default(), decoder.clone());

    let result = cache.get("/books/gone.xlsx", "People", None);
    assert!(matches!(
        result,
        Err(CacheError::SourceUnavailable {
            cause: DecodeError::FileNotFound(_),
            ..
        })
    ));
    assert_eq!(decoder.decodes(), 0);
    assert_eq!(cache.stats().misses, 0);
}

#[test]
fn clear_drops_everything() {
    let decoder = StubDecoder::default()
        .with_book("/books/a.xlsx", sheet("People", people(2)))
        .with_book("/books/b.xlsx", sheet("People", people(2)));
    let cache = TableCache::new(CacheConfig::default(), decoder.clone());

    let kept = cache.get("/books/a.xlsx", "People", None).unwrap();
    cache.get("/books/b.xlsx", "People", None).unwrap();
    cache.clear();

    let stats = cache.stats();
    assert_eq!(stats.entry_count, 0);
    assert_eq!(stats.total_memory_bytes, 0);
    assert_eq!(kept.row_count(), 2);
    cache.get("/books/a.xlsx", "People", None).unwrap();
    assert_eq!(decoder.decodes(), 3);
}

#[test]
fn sheet_listing_and_inspection_bypass_cache() {
    let sheets = vec![
        ("People".to_owned(), people(3)),
        ("More".to_owned(), people(5)),
    ];
    let decoder = StubDecoder::default().with_book("/books/a.xlsx", sheets);
    let cache = TableCache::new(CacheConfig::default(), decoder.clone());

    assert_eq!(cache.sheet_names("/books/a.xlsx").unwrap(), vec!["People", "More"]);
    let info = cache.inspect("/books/a.xlsx").unwrap();
    assert_eq!(info.path, PathBuf::from("/books/a.xlsx"));
    assert_eq!(info.format, "xlsx");
    assert_eq!(info.identity.size, 1024);
    assert_eq!(info.sheet_names, vec!["People", "More"]);
    assert!(matches!(
        cache.inspect("/books/gone.ods"),
        Err(CacheError::SourceUnavailable { .. })
    ));

    assert_eq!(decoder.decodes(), 0);
    assert_eq!(cache.stats(), CacheStats {
        max_memory_bytes: CacheConfig::default().max_memory_bytes,
        ..CacheStats::default()
    });
}

#[test]
fn stats_serialize() {
    let cache = TableCache::new(CacheConfig::default(), StubDecoder::default());
    let json = serde_json::to_value(cache.stats()).unwrap();
    assert_eq!(json["entry_count"], 0);
    assert_eq!(json["max_memory_bytes"], 500 * 1024 * 1024);
}
