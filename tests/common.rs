#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use kiwia::{
    Advertisement, ChatEvent, ScanError, ScannedDevice, Scanner,
    error::{IntelError, VideoError},
    intel::{IntelRequest, IntelResponse, IntelService},
    video::{Clock, Operation, VideoRequest, VideoService},
};
use tokio::sync::mpsc;

/// What the fake chooser does on the next request.
pub enum Pick {
    Device {
        id: &'static str,
        name: Option<&'static str>,
        /// `None`: no advertisement support. `Some(None)`: supported but silent.
        rssi: Option<Option<i32>>,
    },
    Cancel,
    Fail(&'static str),
}

/// Scanner answering from a script, one entry per request.
pub struct FakeScanner {
    available: bool,
    picks: Mutex<VecDeque<Pick>>,
    /// Keeps silent advertisement channels open until the test ends.
    silent: Mutex<Vec<mpsc::Sender<Advertisement>>>,
}

impl FakeScanner {
    pub fn new(picks: Vec<Pick>) -> Self {
        Self {
            available: true,
            picks: Mutex::new(picks.into()),
            silent: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Vec::new())
        }
    }
}

#[async_trait]
impl Scanner for FakeScanner {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn request_device(&self) -> Result<ScannedDevice, ScanError> {
        let pick = self.picks.lock().unwrap().pop_front().unwrap_or(Pick::Cancel);
        match pick {
            Pick::Cancel => Err(ScanError::Cancelled),
            Pick::Fail(reason) => Err(ScanError::Failed(reason.to_string())),
            Pick::Device { id, name, rssi } => {
                let advertisements = rssi.map(|rssi| {
                    let (sender, receiver) = mpsc::channel(1);
                    match rssi {
                        Some(rssi) => sender.try_send(Advertisement { rssi }).unwrap(),
                        None => self.silent.lock().unwrap().push(sender),
                    }
                    receiver
                });
                Ok(ScannedDevice {
                    id: id.to_string(),
                    name: name.map(str::to_string),
                    advertisements,
                })
            }
        }
    }
}

/// Clock that records requested sleeps instead of waiting.
#[derive(Clone, Default)]
pub struct ManualClock {
    elapsed: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap()
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn sleep(&self, duration: Duration) {
        *self.elapsed.lock().unwrap() += duration;
    }
}

/// Video service that finishes after a fixed number of polls.
pub struct FakeVideoService {
    pub polls_needed: u32,
    pub video_uri: Option<String>,
    pub submit_error: Option<VideoError>,
    pub polls: AtomicU32,
    pub submitted: Mutex<Option<VideoRequest>>,
    pub fetched: Mutex<Vec<String>>,
}

impl FakeVideoService {
    pub fn new(polls_needed: u32, video_uri: Option<&str>) -> Self {
        Self {
            polls_needed,
            video_uri: video_uri.map(str::to_string),
            submit_error: None,
            polls: AtomicU32::new(0),
            submitted: Mutex::new(None),
            fetched: Mutex::new(Vec::new()),
        }
    }

    fn operation(&self, polls: u32) -> Operation {
        let done = polls >= self.polls_needed;
        Operation {
            name: "operations/test".to_string(),
            done,
            video_uri: if done { self.video_uri.clone() } else { None },
        }
    }
}

#[async_trait]
impl VideoService for FakeVideoService {
    async fn submit(&self, request: &VideoRequest) -> Result<Operation, VideoError> {
        if let Some(e) = &self.submit_error {
            return Err(e.clone());
        }
        *self.submitted.lock().unwrap() = Some(request.clone());
        Ok(self.operation(0))
    }

    async fn poll(&self, _operation: &Operation) -> Result<Operation, VideoError> {
        let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(self.operation(polls))
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, VideoError> {
        self.fetched.lock().unwrap().push(url.to_string());
        Ok(Bytes::from_static(b"mp4"))
    }
}

/// Intel service with a canned answer that records what it was asked.
pub struct FakeIntelService {
    pub answer: Result<IntelResponse, IntelError>,
    pub requests: Mutex<Vec<IntelRequest>>,
}

impl FakeIntelService {
    pub fn new(answer: Result<IntelResponse, IntelError>) -> Self {
        Self {
            answer,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl IntelService for FakeIntelService {
    async fn generate(&self, request: &IntelRequest) -> Result<IntelResponse, IntelError> {
        self.requests.lock().unwrap().push(request.clone());
        self.answer.clone()
    }
}

pub async fn await_event(events: &mut mpsc::Receiver<ChatEvent>) -> anyhow::Result<ChatEvent> {
    let duration = Duration::from_secs(2);
    tokio::time::timeout(duration, events.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("Event channel closed"))
}

/// Texts of the messages in a chat event.
pub fn texts(event: &ChatEvent) -> Vec<String> {
    let ChatEvent::Messages(messages) = event;
    messages.iter().map(|m| m.text.clone()).collect()
}
