// Session router - the per-event chat protocol.
//
// **Notice the pattern:**
// 1. Take a transport-neutral event
// 2. Call the core services (presence, moderation)
// 3. Turn the result into outbound events for the transport
//
// The router is the only thing that talks to the transport. It never
// returns errors to it: every failure ends as a notice to the sender or a
// log line.

use super::chat_events::{
    ChatMessage, ConnectionId, InboundEvent, MessagePayload, OutboundEvent, ANONYMOUS_USER,
};
use crate::core::classifier::ToxicityClassifier;
use crate::core::moderation::{Disposition, ModerationService};
use crate::core::presence::PresenceRegistry;
use tokio::sync::Mutex;

pub const BLOCKED_NOTICE: &str = "⛔ You have been banned for repeated harmful messages.";

pub const CLASSIFIER_FAILURE_NOTICE: &str =
    "⚠️ Your message could not be checked right now and was not delivered. Please try again.";

/// Delivery side of a transport.
///
/// Sends are fire-and-forget: implementations queue the event and return.
/// Events queued for one connection must be delivered in the order they
/// were queued.
pub trait Transport: Send + Sync {
    /// Deliver to exactly one connection.
    fn unicast(&self, connection: ConnectionId, event: OutboundEvent);

    /// Deliver to every live connection.
    fn broadcast_all(&self, event: OutboundEvent);
}

pub struct SessionRouter<C: ToxicityClassifier, T: Transport> {
    moderation: ModerationService<C>,
    presence: Mutex<PresenceRegistry>,
    transport: T,
}

impl<C: ToxicityClassifier, T: Transport> SessionRouter<C, T> {
    pub fn new(moderation: ModerationService<C>, transport: T) -> Self {
        Self {
            moderation,
            presence: Mutex::new(PresenceRegistry::new()),
            transport,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[cfg(test)]
    pub fn moderation(&self) -> &ModerationService<C> {
        &self.moderation
    }

    /// Route one inbound event to its handler.
    pub async fn dispatch(&self, connection: ConnectionId, event: InboundEvent) {
        match event {
            InboundEvent::Connect => self.on_connect(connection),
            InboundEvent::Register { username } => self.on_register(connection, username).await,
            InboundEvent::Message(payload) => self.on_message(connection, payload).await,
            InboundEvent::Disconnect => self.on_disconnect(connection).await,
        }
    }

    fn on_connect(&self, connection: ConnectionId) {
        tracing::info!(connection = %connection, "A user connected");
    }

    async fn on_register(&self, connection: ConnectionId, username: String) {
        let username = normalize_username(Some(username));

        // Broadcast while still holding the lock so user lists go out in
        // the same order the registry changed.
        let mut presence = self.presence.lock().await;
        presence.register(connection, username.clone());
        tracing::info!(
            connection = %connection,
            user = %username,
            connections = presence.connection_count(),
            "User registered"
        );

        self.transport
            .broadcast_all(OutboundEvent::UserList(presence.snapshot()));
    }

    async fn on_disconnect(&self, connection: ConnectionId) {
        let mut presence = self.presence.lock().await;

        match presence.unregister(connection) {
            Some(username) => {
                tracing::info!(
                    connection = %connection,
                    user = %username,
                    connections = presence.connection_count(),
                    "User disconnected"
                );
                self.transport
                    .broadcast_all(OutboundEvent::UserList(presence.snapshot()));
            }
            None => {
                tracing::debug!(connection = %connection, "Unregistered connection closed");
            }
        }
    }

    async fn on_message(&self, connection: ConnectionId, payload: MessagePayload) {
        let username = normalize_username(payload.user);
        let text = payload.text.unwrap_or_default();

        match self.moderation.check_message(&username, &text).await {
            Ok(Disposition::Blocked) => {
                let standing = self.moderation.standing(&username).await;
                tracing::info!(
                    connection = %connection,
                    user = %username,
                    warnings = standing.warnings,
                    last_violation = ?standing.last_violation,
                    "Blocked message from banned user"
                );
                self.deliver(connection, Disposition::Blocked);
            }
            Ok(disposition) => self.deliver(connection, disposition),
            Err(e) => {
                tracing::warn!(
                    connection = %connection,
                    user = %username,
                    "Dropping message: {}",
                    e
                );
                self.notify(connection, CLASSIFIER_FAILURE_NOTICE.to_string());
            }
        }
    }

    /// Translate a disposition into outbound events.
    fn deliver(&self, connection: ConnectionId, disposition: Disposition) {
        match disposition {
            Disposition::Allowed { username, text } => {
                self.transport
                    .broadcast_all(OutboundEvent::Message(ChatMessage::new(username, text)));
            }
            Disposition::Warned {
                warning_count,
                ban_threshold,
                text,
            } => {
                self.notify(
                    connection,
                    format!(
                        "⚠️ WARNING {}/{}: Harmful message detected -> {}",
                        warning_count, ban_threshold, text
                    ),
                );
            }
            Disposition::Banned { username, .. } => {
                self.notify(
                    connection,
                    format!(
                        "⛔ {}, you have been banned for {} warnings.",
                        username,
                        self.moderation.config().ban_threshold
                    ),
                );
            }
            Disposition::Blocked => {
                self.notify(connection, BLOCKED_NOTICE.to_string());
            }
        }
    }

    fn notify(&self, connection: ConnectionId, text: String) {
        self.transport
            .unicast(connection, OutboundEvent::Message(ChatMessage::system(text)));
    }
}

/// Missing or blank names fall back to the anonymous user.
fn normalize_username(username: Option<String>) -> String {
    match username {
        Some(name) if !name.trim().is_empty() => name,
        _ => ANONYMOUS_USER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chat::SYSTEM_USER;
    use crate::core::classifier::{ClassifierError, LabelScore};
    use crate::core::moderation::ModerationConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        To(ConnectionId, OutboundEvent),
        All(OutboundEvent),
    }

    /// Transport that just remembers what it was asked to send.
    #[derive(Default)]
    struct RecordingTransport {
        sent: StdMutex<Vec<Sent>>,
    }

    impl RecordingTransport {
        fn take(&self) -> Vec<Sent> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    impl Transport for RecordingTransport {
        fn unicast(&self, connection: ConnectionId, event: OutboundEvent) {
            self.sent.lock().unwrap().push(Sent::To(connection, event));
        }

        fn broadcast_all(&self, event: OutboundEvent) {
            self.sent.lock().unwrap().push(Sent::All(event));
        }
    }

    /// Scores any text containing "toxic" as toxic with the score given
    /// after it ("toxic 0.7"), and fails on text containing "explode".
    struct KeywordClassifier {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ToxicityClassifier for KeywordClassifier {
        async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if text.contains("explode") {
                return Err(ClassifierError::Request("inference backend down".to_string()));
            }

            let score = text
                .split_whitespace()
                .skip_while(|w| *w != "toxic")
                .nth(1)
                .and_then(|s| s.parse::<f64>().ok());

            Ok(match score {
                Some(score) => vec![
                    LabelScore::new("toxic", score),
                    LabelScore::new("obscene", score / 3.0),
                ],
                None => vec![LabelScore::new("toxic", 0.01)],
            })
        }
    }

    struct HangingClassifier;

    #[async_trait]
    impl ToxicityClassifier for HangingClassifier {
        async fn classify(&self, _text: &str) -> Result<Vec<LabelScore>, ClassifierError> {
            std::future::pending().await
        }
    }

    fn router() -> (
        SessionRouter<KeywordClassifier, RecordingTransport>,
        Arc<AtomicUsize>,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = KeywordClassifier {
            calls: Arc::clone(&calls),
        };
        let moderation = ModerationService::new(classifier, ModerationConfig::default());
        (
            SessionRouter::new(moderation, RecordingTransport::default()),
            calls,
        )
    }

    fn message(user: &str, text: &str) -> InboundEvent {
        InboundEvent::Message(MessagePayload {
            user: Some(user.to_string()),
            text: Some(text.to_string()),
        })
    }

    fn system_to(connection: ConnectionId, text: &str) -> Sent {
        Sent::To(
            connection,
            OutboundEvent::Message(ChatMessage::new(SYSTEM_USER, text)),
        )
    }

    fn user_list(users: &[&str]) -> Sent {
        Sent::All(OutboundEvent::UserList(
            crate::core::presence::PresenceSnapshot {
                count: users.len(),
                users: users.iter().map(|u| u.to_string()).collect(),
            },
        ))
    }

    #[tokio::test]
    async fn test_connect_is_log_only() {
        let (router, _) = router();

        router.dispatch(ConnectionId::new(), InboundEvent::Connect).await;

        assert!(router.transport().take().is_empty());
    }

    #[tokio::test]
    async fn test_register_broadcasts_user_list() {
        let (router, _) = router();
        let alice = ConnectionId::new();
        let bob = ConnectionId::new();

        router
            .dispatch(alice, InboundEvent::Register { username: "alice".to_string() })
            .await;
        router
            .dispatch(bob, InboundEvent::Register { username: "bob".to_string() })
            .await;

        assert_eq!(
            router.transport().take(),
            vec![user_list(&["alice"]), user_list(&["alice", "bob"])]
        );
    }

    #[tokio::test]
    async fn test_disconnect_broadcasts_only_for_registered() {
        let (router, _) = router();
        let alice = ConnectionId::new();
        let lurker = ConnectionId::new();

        router
            .dispatch(alice, InboundEvent::Register { username: "alice".to_string() })
            .await;
        router.transport().take();

        router.dispatch(lurker, InboundEvent::Disconnect).await;
        assert!(router.transport().take().is_empty());

        router.dispatch(alice, InboundEvent::Disconnect).await;
        assert_eq!(router.transport().take(), vec![user_list(&[])]);
    }

    #[tokio::test]
    async fn test_shared_name_stays_listed_after_one_disconnect() {
        let (router, _) = router();
        let tab_one = ConnectionId::new();
        let tab_two = ConnectionId::new();

        for conn in [tab_one, tab_two] {
            router
                .dispatch(conn, InboundEvent::Register { username: "alice".to_string() })
                .await;
        }
        router.transport().take();

        router.dispatch(tab_one, InboundEvent::Disconnect).await;

        assert_eq!(router.transport().take(), vec![user_list(&["alice"])]);
    }

    #[tokio::test]
    async fn test_warns_then_allows() {
        let (router, _) = router();
        let alice = ConnectionId::new();

        router.dispatch(alice, message("alice", "toxic 0.9 T1")).await;
        router.dispatch(alice, message("alice", "toxic 0.7 T2")).await;
        router.dispatch(alice, message("alice", "T3 is fine")).await;

        assert_eq!(
            router.transport().take(),
            vec![
                system_to(
                    alice,
                    "⚠️ WARNING 1/3: Harmful message detected -> toxic 0.9 T1"
                ),
                system_to(
                    alice,
                    "⚠️ WARNING 2/3: Harmful message detected -> toxic 0.7 T2"
                ),
                Sent::All(OutboundEvent::Message(ChatMessage::new(
                    "alice",
                    "T3 is fine"
                ))),
            ]
        );
    }

    #[tokio::test]
    async fn test_ban_then_block_without_classifier() {
        let (router, calls) = router();
        let bob = ConnectionId::new();

        for _ in 0..3 {
            router.dispatch(bob, message("bob", "toxic 0.8")).await;
        }
        router.dispatch(bob, message("bob", "hello again")).await;

        let sent = router.transport().take();
        assert_eq!(sent.len(), 4);
        assert_eq!(
            sent[2],
            system_to(bob, "⛔ bob, you have been banned for 3 warnings.")
        );
        assert_eq!(sent[3], system_to(bob, BLOCKED_NOTICE));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(router.moderation().is_banned("bob").await);
    }

    #[tokio::test]
    async fn test_ban_follows_the_name_not_the_connection() {
        let (router, _) = router();
        let first = ConnectionId::new();
        let second = ConnectionId::new();

        for _ in 0..3 {
            router.dispatch(first, message("mallory", "toxic 0.99")).await;
        }
        router.transport().take();

        router.dispatch(second, message("mallory", "new tab, who dis")).await;

        assert_eq!(router.transport().take(), vec![system_to(second, BLOCKED_NOTICE)]);
    }

    #[tokio::test]
    async fn test_classifier_failure_notifies_sender_only() {
        let (router, _) = router();
        let carol = ConnectionId::new();

        router.dispatch(carol, message("carol", "this will explode")).await;

        assert_eq!(
            router.transport().take(),
            vec![system_to(carol, CLASSIFIER_FAILURE_NOTICE)]
        );
        assert_eq!(router.moderation().standing("carol").await.warnings, 0);
    }

    #[tokio::test]
    async fn test_classifier_timeout_notifies_sender_only() {
        let config = ModerationConfig {
            classifier_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let moderation = ModerationService::new(HangingClassifier, config);
        let router = SessionRouter::new(moderation, RecordingTransport::default());
        let dave = ConnectionId::new();
        let erin = ConnectionId::new();

        router
            .dispatch(erin, InboundEvent::Register { username: "erin".to_string() })
            .await;
        router.transport().take();

        router.dispatch(dave, message("dave", "are you there?")).await;

        assert_eq!(
            router.transport().take(),
            vec![system_to(dave, CLASSIFIER_FAILURE_NOTICE)]
        );
        assert_eq!(router.moderation().standing("dave").await.warnings, 0);
    }

    #[tokio::test]
    async fn test_missing_fields_are_defaulted() {
        let (router, _) = router();
        let conn = ConnectionId::new();

        router
            .dispatch(
                conn,
                InboundEvent::Message(MessagePayload {
                    user: Some("   ".to_string()),
                    text: Some("hi all".to_string()),
                }),
            )
            .await;
        router
            .dispatch(conn, InboundEvent::Message(MessagePayload::default()))
            .await;

        assert_eq!(
            router.transport().take(),
            vec![
                Sent::All(OutboundEvent::Message(ChatMessage::new(
                    ANONYMOUS_USER,
                    "hi all"
                ))),
                Sent::All(OutboundEvent::Message(ChatMessage::new(ANONYMOUS_USER, ""))),
            ]
        );
    }
}
