//! In-memory collaborators for pipeline tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Notify;

use vrelay_media::{
    CutMode, FetchConfig, FetchedMedia, MediaError, MediaFetcher, MediaInfo, MediaResult,
    MediaToolkit,
};
use vrelay_models::{RequesterId, SizeLimits, MB};
use vrelay_worker::{
    DeliveryRef, Orchestrator, StatusHandle, SupportedOrigins, Transport, WorkerConfig,
    WorkerResult,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Status(String),
    Updatable { id: u64, text: String },
    Update { id: u64, text: String },
    Delete { id: u64 },
    File { name: String, caption: String, thumbnail: bool },
    Relay { delivery: String, target: String },
    Document { name: String, caption: String, content: String },
}

#[derive(Default)]
pub struct FakeTransport {
    events: Arc<Mutex<Vec<Event>>>,
    next_id: AtomicU64,
    panic_on_delivery: AtomicBool,
}

impl FakeTransport {
    /// Make the next `deliver_file` call panic.
    pub fn panic_on_next_delivery(&self) {
        self.panic_on_delivery.store(true, Ordering::SeqCst);
    }

    pub fn relays(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Relay { delivery, .. } => Some(delivery),
                _ => None,
            })
            .collect()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Status(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn files(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::File { name, caption, .. } => Some((name, caption)),
                _ => None,
            })
            .collect()
    }

    pub fn documents(&self) -> Vec<(String, String, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Document {
                    name,
                    caption,
                    content,
                } => Some((name, caption, content)),
                _ => None,
            })
            .collect()
    }

    /// Final text of every updatable status, in creation order.
    pub fn updatable_final_texts(&self) -> Vec<String> {
        let mut texts: Vec<(u64, String)> = Vec::new();
        for event in self.events() {
            match event {
                Event::Updatable { id, text } => texts.push((id, text)),
                Event::Update { id, text } => {
                    if let Some(entry) = texts.iter_mut().find(|(i, _)| *i == id) {
                        entry.1 = text;
                    }
                }
                _ => {}
            }
        }
        texts.into_iter().map(|(_, text)| text).collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

struct FakeStatus {
    id: u64,
    events: Arc<Mutex<Vec<Event>>>,
}

#[async_trait]
impl StatusHandle for FakeStatus {
    async fn update(&self, text: &str) -> WorkerResult<()> {
        self.events.lock().unwrap().push(Event::Update {
            id: self.id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete(&self) -> WorkerResult<()> {
        self.events.lock().unwrap().push(Event::Delete { id: self.id });
        Ok(())
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn report_status(&self, _to: &RequesterId, text: &str) -> WorkerResult<()> {
        self.push(Event::Status(text.to_string()));
        Ok(())
    }

    async fn report_status_updatable(
        &self,
        _to: &RequesterId,
        text: &str,
    ) -> WorkerResult<Box<dyn StatusHandle>> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.push(Event::Updatable {
            id,
            text: text.to_string(),
        });
        Ok(Box::new(FakeStatus {
            id,
            events: self.events.clone(),
        }))
    }

    async fn deliver_file(
        &self,
        _to: &RequesterId,
        path: &Path,
        caption: &str,
        thumbnail: Option<&Path>,
    ) -> WorkerResult<DeliveryRef> {
        if self.panic_on_delivery.swap(false, Ordering::SeqCst) {
            panic!("transport crashed while uploading {}", path.display());
        }
        assert!(path.exists(), "delivered file must exist during upload");
        let name = file_name(path);
        self.push(Event::File {
            name: name.clone(),
            caption: caption.to_string(),
            thumbnail: thumbnail.is_some(),
        });
        Ok(DeliveryRef(name))
    }

    async fn relay(&self, delivery: &DeliveryRef, target: &RequesterId) -> WorkerResult<()> {
        self.push(Event::Relay {
            delivery: delivery.0.clone(),
            target: target.to_string(),
        });
        Ok(())
    }

    async fn deliver_document(
        &self,
        _to: &RequesterId,
        path: &Path,
        caption: &str,
    ) -> WorkerResult<()> {
        let content = std::fs::read_to_string(path).map_err(vrelay_worker::WorkerError::Io)?;
        self.push(Event::Document {
            name: file_name(path),
            caption: caption.to_string(),
            content,
        });
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Holds the first gated call until released.
#[derive(Default)]
pub struct Gate {
    pub started: Notify,
    pub release: Notify,
}

/// Scripted acquisition backend.
///
/// URLs containing `fail-primary` fail the accelerated attempt, URLs
/// containing `fail-all` fail both. Successful fetches write a sparse file of
/// `size_bytes`.
pub struct FakeFetcher {
    pub size_bytes: u64,
    pub duration_seconds: f64,
    pub calls: Mutex<Vec<(String, &'static str)>>,
    gate: Mutex<Option<Arc<Gate>>>,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl FakeFetcher {
    pub fn new(size_bytes: u64, duration_seconds: f64) -> Self {
        Self {
            size_bytes,
            duration_seconds,
            calls: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Block the next fetch on `gate`.
    pub fn gated(self, gate: Arc<Gate>) -> Self {
        *self.gate.lock().unwrap() = Some(gate);
        self
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for (url, _) in self.calls.lock().unwrap().iter() {
            if urls.last() != Some(url) {
                urls.push(url.clone());
            }
        }
        urls
    }
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch(
        &self,
        url: &str,
        config: &FetchConfig,
        output_dir: &Path,
    ) -> MediaResult<FetchedMedia> {
        let method = if config.external_downloader.is_some() {
            "primary"
        } else {
            "fallback"
        };
        self.calls.lock().unwrap().push((url.to_string(), method));

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        tokio::task::yield_now().await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        let fails = url.contains("fail-all") || (url.contains("fail-primary") && method == "primary");
        if fails {
            return Err(MediaError::download_failed(format!("ERROR: {method} refused {url}")));
        }

        let path = output_dir.join("Title.mp4");
        let file = std::fs::File::create(&path)?;
        file.set_len(self.size_bytes)?;
        Ok(FetchedMedia {
            path,
            title: "Title".to_string(),
            duration_seconds: Some(self.duration_seconds),
        })
    }
}

/// Toolkit that reports a fixed duration and writes tiny outputs.
pub struct FakeToolkit {
    pub duration_seconds: f64,
    pub cuts: Mutex<Vec<(f64, f64, CutMode)>>,
    cut_gate: Mutex<Option<Arc<Gate>>>,
}

impl FakeToolkit {
    pub fn new(duration_seconds: f64) -> Self {
        Self {
            duration_seconds,
            cuts: Mutex::new(Vec::new()),
            cut_gate: Mutex::new(None),
        }
    }

    /// Block the next segment cut on `gate`, after its output is written.
    pub fn gate_next_cut(&self, gate: Arc<Gate>) {
        *self.cut_gate.lock().unwrap() = Some(gate);
    }

    pub fn cut_count(&self) -> usize {
        self.cuts.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaToolkit for FakeToolkit {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        Ok(MediaInfo {
            duration: self.duration_seconds,
            size: std::fs::metadata(path)?.len(),
        })
    }

    async fn extract_frame(&self, _path: &Path, _ts: f64, output: &Path) -> MediaResult<()> {
        std::fs::write(output, b"jpg")?;
        Ok(())
    }

    async fn cut_segment(
        &self,
        _input: &Path,
        start_secs: f64,
        length_secs: f64,
        mode: CutMode,
        output: &Path,
    ) -> MediaResult<()> {
        self.cuts.lock().unwrap().push((start_secs, length_secs, mode));
        std::fs::write(output, b"part")?;

        let gate = self.cut_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        Ok(())
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub transport: Arc<FakeTransport>,
    pub fetcher: Arc<FakeFetcher>,
    pub toolkit: Arc<FakeToolkit>,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub async fn new(fetcher: FakeFetcher) -> Self {
        Self::with_config(fetcher, |_| {}).await
    }

    /// Like [`Harness::new`], with `tweak` applied to the zero-delay config.
    pub async fn with_config(fetcher: FakeFetcher, tweak: impl FnOnce(&mut WorkerConfig)) -> Self {
        let dir = TempDir::new().unwrap();
        let duration = fetcher.duration_seconds;
        let transport = Arc::new(FakeTransport::default());
        let fetcher = Arc::new(fetcher);
        let toolkit = Arc::new(FakeToolkit::new(duration));

        let mut config = test_config(dir.path());
        tweak(&mut config);
        let origins = SupportedOrigins::load(&config.site_log).await.unwrap();
        let orchestrator = Orchestrator::new(
            config,
            transport.clone(),
            fetcher.clone(),
            toolkit.clone(),
            Arc::new(origins),
        );

        Self {
            dir,
            transport,
            fetcher,
            toolkit,
            orchestrator,
        }
    }

    pub fn admin(&self) -> RequesterId {
        RequesterId::new("admin")
    }

    /// Per-job temporary directories still on disk.
    pub fn leftover_job_dirs(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.work_dir())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().starts_with("vrelay_"))
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn work_dir(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    pub async fn wait_idle(&self) {
        self.wait_idle_within(Duration::from_secs(10)).await;
    }

    /// For paused-clock tests whose delays add up past the default bound.
    pub async fn wait_idle_within(&self, limit: Duration) {
        tokio::time::timeout(limit, self.orchestrator.wait_until_idle())
            .await
            .expect("run loop did not go idle");
    }
}

pub fn test_config(root: &Path) -> WorkerConfig {
    let work_dir = root.join("work");
    std::fs::create_dir_all(&work_dir).unwrap();

    WorkerConfig {
        work_dir,
        limits: SizeLimits::new(50 * MB, 45 * MB).unwrap(),
        job_delay_secs: 0,
        part_delay_secs: 0,
        site_log: root.join("sitelog.txt"),
        cancel_cooldown: Duration::ZERO,
        attempt_delay: Duration::ZERO,
        relay_delay: Duration::ZERO,
        relay_target: Some("channel".to_string()),
        outbox_dir: root.join("outbox"),
        relay_dir: root.join("relay"),
        ..WorkerConfig::default()
    }
}
