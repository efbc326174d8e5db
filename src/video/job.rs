use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use super::{Clock, Operation, VideoRequest, VideoService, download_url};
use crate::{config::VideoConfig, error::VideoError};

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedVideo {
    /// Media link as reported by the service, without credentials
    pub uri: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    /// Not sent yet
    Pending,
    Submitted(Operation),
    Polling { operation: Operation, polls: u32 },
    Done(GeneratedVideo),
    Failed(VideoError),
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Done(_) | JobState::Failed(_))
    }
}

/// One generation request, advanced step by step until it finishes.
pub struct VideoJob<S: VideoService, C: Clock> {
    service: S,
    clock: C,
    request: VideoRequest,
    api_key: Option<String>,
    poll_interval: Duration,
    max_polls: Option<u32>,
    state: JobState,
}

impl<S: VideoService, C: Clock> VideoJob<S, C> {
    pub fn new(service: S, clock: C, request: VideoRequest, config: &VideoConfig) -> Self {
        Self {
            service,
            clock,
            request,
            api_key: config.api_key.clone(),
            poll_interval: config.poll_interval(),
            max_polls: config.max_polls,
            state: JobState::Pending,
        }
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Perform one transition. Does nothing once finished.
    pub async fn step(&mut self) -> &JobState {
        if self.state.is_finished() {
            return &self.state;
        }
        let state = std::mem::replace(&mut self.state, JobState::Pending);
        self.state = match state {
            JobState::Pending => match self.service.submit(&self.request).await {
                Ok(operation) => {
                    info!(operation = %operation.name, "video generation submitted");
                    JobState::Submitted(operation)
                }
                Err(e) => JobState::Failed(e),
            },
            JobState::Submitted(operation) => self.advance(operation, 0).await,
            JobState::Polling { operation, polls } => self.advance(operation, polls).await,
            finished => finished,
        };
        if let JobState::Failed(e) = &self.state {
            warn!("video generation failed: {e}");
        }
        &self.state
    }

    /// Drive the job to completion.
    pub async fn run(mut self) -> Result<GeneratedVideo, VideoError> {
        loop {
            self.step().await;
            match std::mem::replace(&mut self.state, JobState::Pending) {
                JobState::Done(video) => return Ok(video),
                JobState::Failed(e) => return Err(e),
                state => self.state = state,
            }
        }
    }

    async fn advance(&self, operation: Operation, polls: u32) -> JobState {
        if operation.done {
            return self.finish(operation).await;
        }
        if self.max_polls.is_some_and(|max| polls >= max) {
            return JobState::Failed(VideoError::TimedOut(polls));
        }
        self.clock.sleep(self.poll_interval).await;
        match self.service.poll(&operation).await {
            Ok(operation) => {
                debug!(operation = %operation.name, polls = polls + 1, done = operation.done, "polled");
                JobState::Polling {
                    operation,
                    polls: polls + 1,
                }
            }
            Err(e) => JobState::Failed(e),
        }
    }

    async fn finish(&self, operation: Operation) -> JobState {
        let Some(uri) = operation.video_uri else {
            return JobState::Failed(VideoError::NoVideo);
        };
        let url = download_url(&uri, self.api_key.as_deref());
        match self.service.fetch(&url).await {
            Ok(bytes) => {
                info!(size = bytes.len(), "video ready");
                JobState::Done(GeneratedVideo { uri, bytes })
            }
            Err(e) => JobState::Failed(e),
        }
    }
}
