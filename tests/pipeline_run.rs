// tests/pipeline_run.rs
// Full-run orchestration against canned sources: batch ordering, index
// merging, the all-or-nothing abort and the deliver-then-persist contract.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use review_radar::{
    Config, FetchOutcome, IndexStore, MessagePayload, MessageSink, PublishedIndex, ResolvedApp,
    ReviewPipeline, ReviewSource, RunSummary, SourceParams, Tone,
};

fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

fn payload(app_id: &str, review_id: &str) -> MessagePayload {
    MessagePayload {
        color: Tone::Positive,
        author_name: "author".into(),
        thumb_url: None,
        title: format!("{app_id}:{review_id}"),
        text: "text\n".into(),
        footer: String::new(),
    }
}

/// Serves fixed review ids per app and records the `seen` slice it was
/// handed. One designated app id can be made to fail.
struct StaticSource {
    by_app: HashMap<String, Vec<String>>,
    fail_app: Option<String>,
    seen_log: Mutex<HashMap<String, Vec<String>>>,
}

impl StaticSource {
    fn new(entries: &[(&str, &[&str])]) -> Self {
        Self {
            by_app: entries
                .iter()
                .map(|(app, list)| (app.to_string(), ids(list)))
                .collect(),
            fail_app: None,
            seen_log: Mutex::new(HashMap::new()),
        }
    }

    fn failing_for(mut self, app_id: &str) -> Self {
        self.fail_app = Some(app_id.to_string());
        self
    }
}

#[async_trait]
impl ReviewSource for StaticSource {
    async fn fetch_new(&self, app: &ResolvedApp, seen: &[String]) -> Result<FetchOutcome> {
        self.seen_log
            .lock()
            .unwrap()
            .insert(app.id.clone(), seen.to_vec());
        if self.fail_app.as_deref() == Some(app.id.as_str()) {
            bail!("store lookup failed for {}", app.id);
        }
        let all = self.by_app.get(&app.id).cloned().unwrap_or_default();
        let new_ids: Vec<String> = all.into_iter().filter(|id| !seen.contains(id)).collect();
        let messages = new_ids.iter().map(|id| payload(&app.id, id)).collect();
        Ok(FetchOutcome { new_ids, messages })
    }

    fn name(&self) -> &'static str {
        "Static"
    }
}

struct RecordingStore {
    initial: PublishedIndex,
    persisted: Mutex<Option<PublishedIndex>>,
    fail_persist: bool,
    order: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingStore {
    fn new(initial: PublishedIndex, order: Arc<Mutex<Vec<&'static str>>>) -> Self {
        Self {
            initial,
            persisted: Mutex::new(None),
            fail_persist: false,
            order,
        }
    }

    fn failing_persist(mut self) -> Self {
        self.fail_persist = true;
        self
    }
}

#[async_trait]
impl IndexStore for RecordingStore {
    async fn retrieve(&self) -> PublishedIndex {
        self.initial.clone()
    }

    async fn persist(&self, index: &PublishedIndex) -> Result<()> {
        self.order.lock().unwrap().push("persist");
        if self.fail_persist {
            bail!("disk full");
        }
        *self.persisted.lock().unwrap() = Some(index.clone());
        Ok(())
    }
}

struct RecordingSink {
    batches: Mutex<Vec<Vec<MessagePayload>>>,
    order: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingSink {
    fn new(order: Arc<Mutex<Vec<&'static str>>>) -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            order,
        }
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn deliver(&self, batch: &[MessagePayload]) -> Result<()> {
        self.order.lock().unwrap().push("deliver");
        self.batches.lock().unwrap().push(batch.to_vec());
        Ok(())
    }
}

fn app_store_app(id: &str) -> ResolvedApp {
    ResolvedApp {
        id: id.into(),
        params: SourceParams::AppStore {
            regions: vec!["us".into()],
            page_range: 1,
        },
        show_app_icon: false,
        icon_override: None,
        verbose: false,
        renderer: None,
    }
}

fn play_store_app(id: &str) -> ResolvedApp {
    ResolvedApp {
        id: id.into(),
        params: SourceParams::PlayStore {
            publisher_key: "key.json".into(),
        },
        show_app_icon: false,
        icon_override: None,
        verbose: false,
        renderer: None,
    }
}

fn two_app_config() -> Config {
    Config {
        apps: vec![app_store_app("alpha"), play_store_app("com.beta")],
        review_limit: None,
    }
}

#[tokio::test]
async fn merges_two_apps_into_one_ordered_batch() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let cfg = two_app_config();
    let store = RecordingStore::new(PublishedIndex::new(), Arc::clone(&order));
    let sink = RecordingSink::new(Arc::clone(&order));
    let pipeline = ReviewPipeline::with_sources(
        Arc::new(StaticSource::new(&[("alpha", &["a1", "a2"])])),
        Arc::new(StaticSource::new(&[("com.beta", &["b1"])])),
    );

    let summary = pipeline.run(&cfg, &store, &sink).await.unwrap();

    assert_eq!(
        summary,
        RunSummary {
            apps: 2,
            new_reviews: 3,
            delivered: 3
        }
    );

    // one batch, app order then per-app fetch order
    let batches = sink.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    let titles: Vec<&str> = batches[0].iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, vec!["alpha:a1", "alpha:a2", "com.beta:b1"]);

    // both apps' sequences updated independently, most recent first
    let persisted = store.persisted.lock().unwrap().clone().unwrap();
    assert_eq!(persisted.seen_for("alpha"), ids(&["a2", "a1"]).as_slice());
    assert_eq!(persisted.seen_for("com.beta"), ids(&["b1"]).as_slice());
}

#[tokio::test]
async fn one_failing_app_aborts_before_delivery_and_persistence() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let cfg = two_app_config();
    let store = RecordingStore::new(PublishedIndex::new(), Arc::clone(&order));
    let sink = RecordingSink::new(Arc::clone(&order));
    let pipeline = ReviewPipeline::with_sources(
        Arc::new(StaticSource::new(&[("alpha", &["a1"])]).failing_for("alpha")),
        Arc::new(StaticSource::new(&[("com.beta", &["b1"])])),
    );

    let err = pipeline.run(&cfg, &store, &sink).await.unwrap_err();
    assert!(format!("{err:#}").contains("store lookup failed for alpha"));

    assert!(sink.batches.lock().unwrap().is_empty());
    assert!(store.persisted.lock().unwrap().is_none());
    assert!(order.lock().unwrap().is_empty());
}

#[tokio::test]
async fn delivery_happens_before_persistence() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let cfg = two_app_config();
    let store = RecordingStore::new(PublishedIndex::new(), Arc::clone(&order));
    let sink = RecordingSink::new(Arc::clone(&order));
    let pipeline = ReviewPipeline::with_sources(
        Arc::new(StaticSource::new(&[("alpha", &["a1"])])),
        Arc::new(StaticSource::new(&[("com.beta", &["b1"])])),
    );

    pipeline.run(&cfg, &store, &sink).await.unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["deliver", "persist"]);
}

#[tokio::test]
async fn a_persist_failure_after_delivery_leaves_the_old_index() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let cfg = two_app_config();
    let store =
        RecordingStore::new(PublishedIndex::new(), Arc::clone(&order)).failing_persist();
    let sink = RecordingSink::new(Arc::clone(&order));
    let pipeline = ReviewPipeline::with_sources(
        Arc::new(StaticSource::new(&[("alpha", &["a1"])])),
        Arc::new(StaticSource::new(&[("com.beta", &["b1"])])),
    );

    let err = pipeline.run(&cfg, &store, &sink).await.unwrap_err();
    assert!(format!("{err:#}").contains("persisting published index"));

    // messages went out, the index did not advance: the next run re-sends
    assert_eq!(sink.batches.lock().unwrap().len(), 1);
    assert!(store.persisted.lock().unwrap().is_none());
    assert_eq!(*order.lock().unwrap(), vec!["deliver", "persist"]);
}

#[tokio::test]
async fn the_review_limit_caps_the_persisted_index() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut cfg = two_app_config();
    cfg.review_limit = Some(3);

    let mut initial = PublishedIndex::new();
    initial.merge("alpha", &ids(&["old1", "old2"]), None);

    let source = StaticSource::new(&[("alpha", &["a1", "a2"])]);
    let store = RecordingStore::new(initial, Arc::clone(&order));
    let sink = RecordingSink::new(Arc::clone(&order));
    let pipeline = ReviewPipeline::with_sources(
        Arc::new(source),
        Arc::new(StaticSource::new(&[("com.beta", &["b1"])])),
    );

    pipeline.run(&cfg, &store, &sink).await.unwrap();

    let persisted = store.persisted.lock().unwrap().clone().unwrap();
    // new ids prepend, then the cap keeps the most recent three
    assert_eq!(persisted.seen_for("alpha"), ids(&["a2", "a1", "old2"]).as_slice());
}

#[tokio::test]
async fn the_fetch_sees_the_previously_published_ids() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let cfg = two_app_config();

    let mut initial = PublishedIndex::new();
    initial.merge("alpha", &ids(&["a1"]), None);

    let alpha_source = Arc::new(StaticSource::new(&[("alpha", &["a1", "a2"])]));
    let store = RecordingStore::new(initial, Arc::clone(&order));
    let sink = RecordingSink::new(Arc::clone(&order));
    let pipeline = ReviewPipeline::with_sources(
        Arc::clone(&alpha_source) as Arc<dyn ReviewSource>,
        Arc::new(StaticSource::new(&[("com.beta", &["b1"])])),
    );

    let summary = pipeline.run(&cfg, &store, &sink).await.unwrap();

    let seen_log = alpha_source.seen_log.lock().unwrap();
    assert_eq!(seen_log.get("alpha").unwrap(), &ids(&["a1"]));
    assert_eq!(summary.new_reviews, 2, "a2 plus com.beta's b1");
}

#[tokio::test]
async fn a_run_with_nothing_new_still_delivers_and_persists() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let cfg = two_app_config();

    let mut initial = PublishedIndex::new();
    initial.merge("alpha", &ids(&["a1", "a2"]), None);
    initial.merge("com.beta", &ids(&["b1"]), None);

    let store = RecordingStore::new(initial.clone(), Arc::clone(&order));
    let sink = RecordingSink::new(Arc::clone(&order));
    let pipeline = ReviewPipeline::with_sources(
        Arc::new(StaticSource::new(&[("alpha", &["a1", "a2"])])),
        Arc::new(StaticSource::new(&[("com.beta", &["b1"])])),
    );

    let summary = pipeline.run(&cfg, &store, &sink).await.unwrap();

    assert_eq!(summary.new_reviews, 0);
    assert_eq!(summary.delivered, 0);
    // the (empty) batch still goes to the sink and the index is re-persisted
    assert_eq!(*order.lock().unwrap(), vec!["deliver", "persist"]);
    assert_eq!(store.persisted.lock().unwrap().clone().unwrap(), initial);
}
