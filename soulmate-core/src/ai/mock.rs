use crate::ai::{error::AiError, model::Model, provider::AiProvider, types::*};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

/// Mock behavior for the mock provider
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MockBehavior {
    /// Return successful responses
    #[default]
    Success,
    /// Return the given text verbatim
    Reply { text: String },
    /// Return an empty text response
    EmptyResponse,
    /// Return a retryable error N times, then succeed
    RetryableErrorThenSuccess { remaining_errors: usize },
    /// Always return a retryable error
    AlwaysRetryableError,
    /// Always return a non-retryable error
    AlwaysNonRetryableError,
    /// Pick a behavior by matching the request's system prompt. The first
    /// route whose needle appears in the system prompt wins.
    Routed {
        routes: Vec<MockRoute>,
        fallback: Box<MockBehavior>,
    },
    /// Enables sequential multi-turn conversation testing by orchestrating predetermined responses
    BehaviorQueue { behaviors: Vec<MockBehavior> },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MockRoute {
    pub system_prompt_contains: String,
    pub behavior: MockBehavior,
}

impl MockBehavior {
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply { text: text.into() }
    }

    pub fn route(needle: impl Into<String>, behavior: MockBehavior) -> MockRoute {
        MockRoute {
            system_prompt_contains: needle.into(),
            behavior,
        }
    }
}

/// Mock AI provider for testing
#[derive(Clone)]
pub struct MockProvider {
    behavior: Arc<Mutex<MockBehavior>>,
    call_count: Arc<Mutex<usize>>,
    captured_requests: Arc<Mutex<Vec<ConversationRequest>>>,
}

impl MockProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            call_count: Arc::new(Mutex::new(0)),
            captured_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn pop_behavior_from_queue(behavior: &mut MockBehavior) -> MockBehavior {
        if let MockBehavior::BehaviorQueue { behaviors } = behavior {
            if behaviors.is_empty() {
                return MockBehavior::Success;
            }
            return behaviors.remove(0);
        }
        behavior.clone()
    }

    /// Routes are resolved against the request, and a routed queue is popped
    /// in place so repeated calls walk through it.
    fn select_behavior(behavior: &mut MockBehavior, system_prompt: &str) -> MockBehavior {
        if let MockBehavior::Routed { routes, fallback } = behavior {
            let target = routes
                .iter_mut()
                .find(|route| system_prompt.contains(&route.system_prompt_contains))
                .map(|route| &mut route.behavior)
                .unwrap_or(fallback.as_mut());
            return Self::pop_behavior_from_queue(target);
        }
        Self::pop_behavior_from_queue(behavior)
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn get_captured_requests(&self) -> Vec<ConversationRequest> {
        self.captured_requests.lock().unwrap().clone()
    }

    pub fn get_last_captured_request(&self) -> Option<ConversationRequest> {
        self.captured_requests.lock().unwrap().last().cloned()
    }

    /// Captured requests whose system prompt contains `needle`.
    pub fn requests_matching(&self, needle: &str) -> Vec<ConversationRequest> {
        self.captured_requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.system_prompt.contains(needle))
            .cloned()
            .collect()
    }
}

fn text_response(text: impl Into<String>) -> ConversationResponse {
    ConversationResponse {
        content: Content::text_only(text.into()),
        usage: TokenUsage::new(10, 10),
        stop_reason: StopReason::EndTurn,
    }
}

#[async_trait::async_trait]
impl AiProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn supported_models(&self) -> HashSet<Model> {
        HashSet::from([Model::None])
    }

    async fn converse(
        &self,
        request: ConversationRequest,
    ) -> Result<ConversationResponse, AiError> {
        // Capture the request
        {
            let mut requests = self.captured_requests.lock().unwrap();
            requests.push(request.clone());
        }

        // Increment call count
        {
            let mut count = self.call_count.lock().unwrap();
            *count += 1;
        }

        let effective = {
            let mut behavior = self.behavior.lock().unwrap();
            Self::select_behavior(&mut behavior, &request.system_prompt)
        };

        match effective {
            MockBehavior::Success => Ok(text_response("Mock response")),
            MockBehavior::Reply { text } => Ok(text_response(text)),
            MockBehavior::EmptyResponse => Ok(ConversationResponse {
                content: Content::empty(),
                usage: TokenUsage::new(10, 0),
                stop_reason: StopReason::EndTurn,
            }),
            MockBehavior::RetryableErrorThenSuccess {
                mut remaining_errors,
            } => {
                if remaining_errors > 0 {
                    remaining_errors -= 1;
                    self.set_behavior(MockBehavior::RetryableErrorThenSuccess { remaining_errors });
                    Err(AiError::Retryable(anyhow::anyhow!(
                        "Mock retryable error (remaining: {})",
                        remaining_errors
                    )))
                } else {
                    Ok(text_response("Success after retries"))
                }
            }
            MockBehavior::AlwaysRetryableError => Err(AiError::Retryable(anyhow::anyhow!(
                "Mock retryable error (always fails)"
            ))),
            MockBehavior::AlwaysNonRetryableError => Err(AiError::Terminal(anyhow::anyhow!(
                "Mock non-retryable error"
            ))),
            MockBehavior::Routed { .. } | MockBehavior::BehaviorQueue { .. } => {
                panic!("Bug: nested Routed/BehaviorQueue detected. Test setup error - routes and queues must resolve to a concrete behavior")
            }
        }
    }
}
