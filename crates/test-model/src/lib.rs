//! A local scripted model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use baton_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: VecDeque<PresetEvent>,
    has_tool_call: bool,
    completed: bool,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if this.completed {
            // In case this method is called after completion.
            return Poll::Ready(Ok(None));
        }

        let delay = this.delay;
        let timer = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
        ready!(timer.as_mut().poll(cx));
        this.sleep = None;

        let event = match this.events.pop_front() {
            Some(PresetEvent::MessageDelta(msg)) => {
                ModelResponseEvent::MessageDelta(msg)
            }
            Some(PresetEvent::ToolCall(req)) => {
                ModelResponseEvent::ToolCall(req)
            }
            None => {
                this.completed = true;
                ModelResponseEvent::Completed(if this.has_tool_call {
                    ModelFinishReason::ToolCalls
                } else {
                    ModelFinishReason::Stop
                })
            }
        };
        Poll::Ready(Ok(Some(event)))
    }
}

struct ScriptStep {
    response: PresetResponse,
    failed: u64,
}

#[derive(Default)]
struct Script {
    steps: VecDeque<ScriptStep>,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the conversation script,
/// which is how the model should respond to each request. Responses are
/// consumed in the order they were added, one per request, regardless of
/// which agent sent it. If there are no enough steps in the script, an
/// error will be returned.
///
/// Clones share the same script, so a test can keep one clone to add
/// responses and inspect the recorded requests after handing another
/// clone to an agent.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_response(&self, preset: PresetResponse) {
        self.lock().steps.push_back(ScriptStep {
            response: preset,
            failed: 0,
        });
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, including failed attempts.
    #[inline]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    #[inline]
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Returns the number of responses not consumed yet.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.lock().steps.len()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_response(
        &self,
        req: &ModelRequest,
    ) -> Result<TestModelResponse, Error> {
        let mut script = self.lock();
        script.requests.push(req.clone());

        let Some(mut step) = script.steps.pop_front() else {
            return Err(Error {
                message: "no enough steps",
                kind: ErrorKind::Other,
            });
        };
        if let Some(failures) = step.response.failures {
            if failures == 0 || step.failed < failures {
                step.failed += 1;
                script.steps.push_front(step);
                return Err(Error {
                    message: "injected failure",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
        }

        let events: VecDeque<_> = step.response.events.into();
        let has_tool_call = events
            .iter()
            .any(|event| matches!(event, PresetEvent::ToolCall(_)));
        Ok(TestModelResponse {
            events,
            has_tool_call,
            completed: false,
            delay: self.delay.unwrap_or(Duration::from_millis(1)),
            sleep: None,
        })
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        ready(self.next_response(req))
    }
}
