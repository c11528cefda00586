//! Hand-written fakes shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::FetchError;
use crate::feed::{ArticleSource, RemoteArticle, RemoteSource};
use crate::models::Language;
use crate::services::{HostScheduler, JobSpec, NotificationSink, PeriodicJob};

pub fn remote(url: &str, published_at: &str) -> RemoteArticle {
    RemoteArticle {
        title: Some(format!("Story {}", url)),
        description: Some("Body".to_string()),
        url: url.to_string(),
        url_to_image: None,
        published_at: Some(published_at.to_string()),
        source: Some(RemoteSource {
            name: Some("Wire".to_string()),
        }),
    }
}

#[derive(Default)]
struct FakeSourceState {
    responses: HashMap<String, Vec<RemoteArticle>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    hang: bool,
    calls: Vec<(String, Language)>,
}

/// Scripted [`ArticleSource`]: unknown topics return an empty result set.
#[derive(Default)]
pub struct FakeSource {
    state: Mutex<FakeSourceState>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, topic: &str, articles: Vec<RemoteArticle>) {
        let mut state = self.state.lock().unwrap();
        state.failing.remove(topic);
        state.responses.insert(topic.to_string(), articles);
    }

    pub fn fail(&self, topic: &str) {
        self.state.lock().unwrap().failing.insert(topic.to_string());
    }

    pub fn delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    /// Every later fetch blocks until cancelled.
    pub fn hang(&self) {
        self.state.lock().unwrap().hang = true;
    }

    pub fn calls(&self) -> Vec<(String, Language)> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl ArticleSource for FakeSource {
    async fn fetch(&self, topic: &str, language: Language) -> Result<Vec<RemoteArticle>, FetchError> {
        let (delay, hang, outcome) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push((topic.to_string(), language));
            let outcome = if state.failing.contains(topic) {
                Err(())
            } else {
                Ok(state.responses.get(topic).cloned().unwrap_or_default())
            };
            (state.delay, state.hang, outcome)
        };

        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        outcome.map_err(|()| FetchError::Status {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            body: "boom".to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Enqueued(String, JobSpec),
    Cancelled(String),
}

/// Records host calls and keeps the last installed job so tests can run it.
pub struct FakeHost {
    events: mpsc::UnboundedSender<HostEvent>,
    jobs: Mutex<HashMap<String, Arc<dyn PeriodicJob>>>,
}

impl FakeHost {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<HostEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let host = Arc::new(Self {
            events,
            jobs: Mutex::new(HashMap::new()),
        });
        (host, rx)
    }

    pub fn job(&self, name: &str) -> Option<Arc<dyn PeriodicJob>> {
        self.jobs.lock().unwrap().get(name).cloned()
    }
}

impl HostScheduler for FakeHost {
    fn enqueue_unique_periodic(&self, name: &str, spec: JobSpec, job: Arc<dyn PeriodicJob>) {
        self.jobs.lock().unwrap().insert(name.to_string(), job);
        let _ = self.events.send(HostEvent::Enqueued(name.to_string(), spec));
    }

    fn cancel_unique(&self, name: &str) {
        self.jobs.lock().unwrap().remove(name);
        let _ = self.events.send(HostEvent::Cancelled(name.to_string()));
    }
}

#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingSink {
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, topics: &[String]) {
        self.calls.lock().unwrap().push(topics.to_vec());
    }
}
