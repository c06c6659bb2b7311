//! Short-lived "pick one option" prompts with a deadline.
//!
//! A [`PromptSession`] is pending until the first answer arrives through its
//! [`PromptResponder`] or the deadline passes. Both outcomes are final: later
//! answers are rejected and a timed-out session never yields a value.

use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::core::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    Pending,
    Answered,
    TimedOut,
}

struct Inner<T> {
    state: PromptState,
    sender: Option<oneshot::Sender<T>>,
}

type Shared<T> = Arc<Mutex<Inner<T>>>;

fn lock<T>(shared: &Shared<T>) -> MutexGuard<'_, Inner<T>> {
    // A poisoned lock only means another thread panicked mid-update; the state is still usable
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Accepts the answer for one prompt. Cheap to clone.
pub struct PromptResponder<T> {
    shared: Shared<T>,
}

impl<T> Clone for PromptResponder<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> PromptResponder<T> {
    /// Delivers `value`. Returns false if the prompt already ended.
    pub fn answer(&self, value: T) -> bool {
        let mut inner = lock(&self.shared);
        if inner.state != PromptState::Pending {
            return false;
        }
        let Some(sender) = inner.sender.take() else {
            return false;
        };
        // Fails only when the waiting side is already gone
        if sender.send(value).is_err() {
            return false;
        }
        inner.state = PromptState::Answered;
        true
    }

    pub fn state(&self) -> PromptState {
        lock(&self.shared).state
    }
}

/// The waiting side of a prompt.
///
/// Dropping a session without waiting on it closes the prompt.
pub struct PromptSession<T> {
    id: String,
    receiver: oneshot::Receiver<T>,
    shared: Shared<T>,
    registry: Option<OpenPrompts<T>>,
}

impl<T> PromptSession<T> {
    /// Opens a standalone session.
    pub fn open() -> (Self, PromptResponder<T>) {
        let (sender, receiver) = oneshot::channel();
        let shared = Arc::new(Mutex::new(Inner {
            state: PromptState::Pending,
            sender: Some(sender),
        }));
        let session = Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            receiver,
            shared: Arc::clone(&shared),
            registry: None,
        };
        (session, PromptResponder { shared })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> PromptState {
        lock(&self.shared).state
    }

    /// Suspends until the prompt is answered or `timeout` elapses.
    pub async fn wait(mut self, timeout: Duration) -> AppResult<T> {
        let outcome = tokio::time::timeout(timeout, &mut self.receiver).await;
        self.unregister();

        if let Ok(Ok(value)) = outcome {
            return Ok(value);
        }

        let mut inner = lock(&self.shared);
        match inner.state {
            // Answer landed between the deadline firing and taking the lock
            PromptState::Answered => self.receiver.try_recv().map_err(|_| AppError::PromptTimedOut),
            PromptState::Pending | PromptState::TimedOut => {
                inner.state = PromptState::TimedOut;
                inner.sender = None;
                log::debug!("Prompt {} timed out after {:?}", self.id, timeout);
                Err(AppError::PromptTimedOut)
            }
        }
    }

    fn unregister(&self) {
        if let Some(registry) = &self.registry {
            registry.remove(&self.id);
        }
    }
}

impl<T> Drop for PromptSession<T> {
    fn drop(&mut self) {
        self.unregister();
    }
}

/// Result of routing an answer through a [`PromptRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    Accepted,
    /// Someone other than the prompt owner tried to answer
    NotOwner,
    /// Unknown id, already answered, or timed out
    Closed,
}

struct OpenPrompt<T> {
    owner: Option<u64>,
    responder: PromptResponder<T>,
}

type OpenPrompts<T> = Arc<DashMap<String, OpenPrompt<T>>>;

/// Open prompts addressable by id, for routing button presses.
pub struct PromptRegistry<T> {
    open: OpenPrompts<T>,
}

impl<T> Clone for PromptRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            open: Arc::clone(&self.open),
        }
    }
}

impl<T> Default for PromptRegistry<T> {
    fn default() -> Self {
        Self {
            open: Arc::new(DashMap::new()),
        }
    }
}

impl<T> PromptRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session reachable through [`PromptRegistry::answer`] until it ends.
    ///
    /// With an `owner`, only answers from that user id are accepted.
    pub fn open(&self, owner: Option<u64>) -> PromptSession<T> {
        let (mut session, responder) = PromptSession::open();
        self.open.insert(session.id.clone(), OpenPrompt { owner, responder });
        session.registry = Some(Arc::clone(&self.open));
        session
    }

    /// Answers prompt `id` on behalf of user `from`.
    pub fn answer(&self, id: &str, from: u64, value: T) -> AnswerOutcome {
        let Some((_, prompt)) = self
            .open
            .remove_if(id, |_, prompt| prompt.owner.map_or(true, |owner| owner == from))
        else {
            return if self.open.contains_key(id) {
                AnswerOutcome::NotOwner
            } else {
                AnswerOutcome::Closed
            };
        };
        if prompt.responder.answer(value) {
            AnswerOutcome::Accepted
        } else {
            AnswerOutcome::Closed
        }
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_answer_before_deadline() {
        let (session, responder) = PromptSession::<&str>::open();
        assert_eq!(session.state(), PromptState::Pending);
        assert!(responder.answer("video"));
        assert_eq!(responder.state(), PromptState::Answered);
        assert_eq!(session.wait(Duration::from_secs(5)).await.unwrap(), "video");
    }

    #[tokio::test]
    async fn test_first_answer_wins() {
        let (session, responder) = PromptSession::<u8>::open();
        let other = responder.clone();
        assert!(responder.answer(1));
        assert!(!other.answer(2));
        assert!(!responder.answer(3));
        assert_eq!(session.wait(Duration::from_secs(5)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_final() {
        let (session, responder) = PromptSession::<u8>::open();
        let err = session.wait(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, AppError::PromptTimedOut));
        assert_eq!(responder.state(), PromptState::TimedOut);
        assert!(!responder.answer(1));
        assert_eq!(responder.state(), PromptState::TimedOut);
    }

    #[tokio::test]
    async fn test_answer_from_another_task() {
        let (session, responder) = PromptSession::<String>::open();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            responder.answer("audio".to_string());
        });
        assert_eq!(session.wait(Duration::from_secs(5)).await.unwrap(), "audio");
    }

    #[tokio::test]
    async fn test_registry_routes_and_cleans_up() {
        let registry = PromptRegistry::<String>::new();
        let session = registry.open(None);
        let id = session.id().to_string();
        assert_eq!(registry.open_count(), 1);

        assert_eq!(registry.answer(&id, 7, "hd".into()), AnswerOutcome::Accepted);
        assert_eq!(registry.answer(&id, 7, "low".into()), AnswerOutcome::Closed);
        assert_eq!(session.wait(Duration::from_secs(5)).await.unwrap(), "hd");
        assert_eq!(registry.open_count(), 0);
    }

    #[tokio::test]
    async fn test_registry_rejects_other_users() {
        let registry = PromptRegistry::<String>::new();
        let session = registry.open(Some(42));
        let id = session.id().to_string();

        assert_eq!(registry.answer(&id, 13, "audio".into()), AnswerOutcome::NotOwner);
        assert_eq!(session.state(), PromptState::Pending);
        assert_eq!(registry.answer(&id, 42, "video".into()), AnswerOutcome::Accepted);
        assert_eq!(session.wait(Duration::from_secs(5)).await.unwrap(), "video");
    }

    #[tokio::test]
    async fn test_registry_forgets_timed_out_prompts() {
        let registry = PromptRegistry::<String>::new();
        let session = registry.open(None);
        let id = session.id().to_string();
        assert!(session.wait(Duration::from_millis(20)).await.is_err());
        assert_eq!(registry.open_count(), 0);
        assert_eq!(registry.answer(&id, 1, "hd".into()), AnswerOutcome::Closed);
        assert_eq!(registry.answer("unknown", 1, "hd".into()), AnswerOutcome::Closed);
    }

    #[test]
    fn test_registry_forgets_abandoned_sessions() {
        let registry = PromptRegistry::<String>::new();
        let id = {
            let session = registry.open(Some(1));
            assert_eq!(registry.open_count(), 1);
            session.id().to_string()
        };
        assert_eq!(registry.open_count(), 0);
        assert_eq!(registry.answer(&id, 1, "hd".into()), AnswerOutcome::Closed);
    }
}
