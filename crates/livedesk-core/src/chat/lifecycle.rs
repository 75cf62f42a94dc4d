//! Session lifecycle manager and watermark polling contract.
//!
//! `ChatLifecycle` owns every transition of a session's `status`,
//! `admin_user_id`, and `ended_at`: open, claim, close. The state machine is
//! `waiting -> active -> closed` with `waiting -> closed` allowed for
//! sessions that were never claimed; nothing ever leaves `closed`.
//!
//! Claiming is the only operation with a real race (two staff members
//! opening the same waiting session): it is delegated to the repository's
//! single conditional update, so exactly one caller wins and the loser gets
//! the current session state back instead of an error.

use livedesk_types::chat::{ChatMessage, ChatSession, SenderType, SessionStatus};
use livedesk_types::error::ChatError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chat::repository::ChatRepository;
use crate::directory::{CapabilityCheck, MANAGE_CHATS};

/// Result of a claim attempt.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// This caller performed the `waiting -> active` transition.
    Claimed(ChatSession),
    /// Another staff member won the race; the session carries the winner's
    /// `admin_user_id` so the caller's UI can show the actual owner.
    AlreadyClaimed(ChatSession),
}

impl ClaimOutcome {
    pub fn session(&self) -> &ChatSession {
        match self {
            ClaimOutcome::Claimed(s) | ClaimOutcome::AlreadyClaimed(s) => s,
        }
    }
}

/// Result of a close call.
#[derive(Debug, Clone)]
pub struct CloseOutcome {
    pub session: ChatSession,
    /// True when the session was closed before this call (double-submit
    /// tolerated as idempotent success; `ended_at` is unchanged).
    pub already_closed: bool,
}

/// Orchestrates the session state machine and message flow.
///
/// Generic over the storage port and the external capability check so the
/// core stays free of infrastructure (livedesk-core never depends on
/// livedesk-infra).
pub struct ChatLifecycle<R: ChatRepository, P: CapabilityCheck> {
    repo: R,
    authz: P,
}

impl<R: ChatRepository, P: CapabilityCheck> ChatLifecycle<R, P> {
    pub fn new(repo: R, authz: P) -> Self {
        Self { repo, authz }
    }

    /// Access the chat repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    // --- Session lifecycle ---

    /// Open a new session for a customer. Always starts in `Waiting`.
    pub async fn create_session(
        &self,
        customer_user_id: Uuid,
        account_id: Option<Uuid>,
        subject: Option<String>,
    ) -> Result<ChatSession, ChatError> {
        let subject = subject
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let session = ChatSession::new(customer_user_id, account_id, subject);
        let session = self.repo.create_session(&session).await?;
        info!(session_id = %session.id, customer = %customer_user_id, "Chat session opened");
        Ok(session)
    }

    /// Get a session by id.
    pub async fn get_session(&self, session_id: &Uuid) -> Result<ChatSession, ChatError> {
        self.repo
            .get_session(session_id)
            .await?
            .ok_or(ChatError::NotFound)
    }

    /// Claim a waiting session for a staff member.
    ///
    /// First writer wins. The loser receives `AlreadyClaimed` with the
    /// now-current state rather than an error; claiming a closed session is
    /// an `InvalidTransition`.
    pub async fn claim(
        &self,
        session_id: &Uuid,
        staff_user_id: &Uuid,
    ) -> Result<ClaimOutcome, ChatError> {
        if self.repo.claim_session(session_id, staff_user_id).await? {
            let session = self.get_session(session_id).await?;
            info!(session_id = %session_id, staff = %staff_user_id, "Session claimed");
            return Ok(ClaimOutcome::Claimed(session));
        }

        match self.repo.get_session(session_id).await? {
            None => Err(ChatError::NotFound),
            Some(session) => match session.status {
                SessionStatus::Closed => Err(ChatError::InvalidTransition(
                    "cannot claim a closed session".to_string(),
                )),
                SessionStatus::Active => {
                    info!(
                        session_id = %session_id,
                        staff = %staff_user_id,
                        owner = ?session.admin_user_id,
                        "Claim lost; session already assigned"
                    );
                    Ok(ClaimOutcome::AlreadyClaimed(session))
                }
                // The conditional update saw a non-waiting row, but the row
                // is waiting again: closed sessions never reopen, so this
                // cannot occur outside of storage corruption.
                SessionStatus::Waiting => Err(ChatError::Storage(
                    "claim lost but session is still waiting".to_string(),
                )),
            },
        }
    }

    /// Append a message from either party to an open session.
    ///
    /// Rejected with `SessionClosed` once the close transition has
    /// committed; a message racing the close is accepted up to that point.
    /// An admin message into a still-waiting session is accepted without
    /// claiming it -- ownership is taken only by the explicit claim call.
    pub async fn post_message(
        &self,
        session_id: &Uuid,
        sender_type: SenderType,
        sender_user_id: &Uuid,
        body: &str,
    ) -> Result<ChatMessage, ChatError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(ChatError::Validation("message body is empty".to_string()));
        }

        match self
            .repo
            .append_message(session_id, sender_type, sender_user_id, body)
            .await?
        {
            Some(message) => Ok(message),
            None => Err(ChatError::SessionClosed),
        }
    }

    /// Close a session from `waiting` or `active`.
    ///
    /// Idempotent: closing an already-closed session returns its current
    /// state (with the original `ended_at`) instead of an error, tolerating
    /// double-submits from a slow UI.
    pub async fn close(
        &self,
        session_id: &Uuid,
        staff_user_id: &Uuid,
    ) -> Result<CloseOutcome, ChatError> {
        let transitioned = self
            .repo
            .close_session(session_id, chrono::Utc::now())
            .await?;
        let session = self.get_session(session_id).await?;

        if transitioned {
            info!(session_id = %session_id, staff = %staff_user_id, "Session closed");
        } else {
            warn!(session_id = %session_id, staff = %staff_user_id, "Close repeated on closed session");
        }

        Ok(CloseOutcome {
            session,
            already_closed: !transitioned,
        })
    }

    // --- Visibility ---

    /// Sessions visible to a staff member, newest first.
    ///
    /// Own sessions are always visible; everything else (including
    /// unassigned waiting sessions) requires the `manage_chats` capability.
    /// Enforced here because visibility is part of the access contract, not
    /// a presentation concern.
    pub async fn list_for_staff(
        &self,
        staff_user_id: &Uuid,
        status_filter: Option<SessionStatus>,
    ) -> Result<Vec<ChatSession>, ChatError> {
        if self
            .authz
            .has_permission(staff_user_id, MANAGE_CHATS)
            .await?
        {
            Ok(self.repo.list_all_sessions(status_filter).await?)
        } else {
            Ok(self
                .repo
                .list_sessions_for_admin(staff_user_id, status_filter)
                .await?)
        }
    }

    /// A single session, subject to the same visibility rule as listing.
    pub async fn get_for_staff(
        &self,
        staff_user_id: &Uuid,
        session_id: &Uuid,
    ) -> Result<ChatSession, ChatError> {
        let session = self.get_session(session_id).await?;
        if session.admin_user_id == Some(*staff_user_id)
            || self
                .authz
                .has_permission(staff_user_id, MANAGE_CHATS)
                .await?
        {
            Ok(session)
        } else {
            Err(ChatError::Unauthorized(
                "session is assigned to another staff member".to_string(),
            ))
        }
    }

    /// Resolve a caller's role in a session, gating message access.
    ///
    /// The session's customer participates as `Customer`; the assigned
    /// staff member and `manage_chats` holders participate as `Admin`.
    /// Anyone else is `Unauthorized` -- the message stream follows the same
    /// access contract as session detail, and the role (not a
    /// client-asserted field) decides which side a message lands on.
    pub async fn participant_role(
        &self,
        session_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<(ChatSession, SenderType), ChatError> {
        let session = self.get_session(session_id).await?;
        if session.customer_user_id == *user_id {
            return Ok((session, SenderType::Customer));
        }
        if session.admin_user_id == Some(*user_id)
            || self.authz.has_permission(user_id, MANAGE_CHATS).await?
        {
            return Ok((session, SenderType::Admin));
        }
        Err(ChatError::Unauthorized(
            "not a participant in this session".to_string(),
        ))
    }

    // --- Polling contract ---

    /// Messages with id strictly greater than the caller's watermark,
    /// ascending. An empty result is the normal "nothing new" case.
    /// Repeated calls with the same watermark are idempotent.
    pub async fn fetch_since(
        &self,
        session_id: &Uuid,
        since_id: i64,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        // Distinguish "no new messages" from "no such session".
        self.get_session(session_id).await?;
        Ok(self.repo.fetch_since(session_id, since_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testutil::{MemoryChatRepository, StaticCaps};
    use std::sync::Arc;

    fn lifecycle() -> ChatLifecycle<MemoryChatRepository, StaticCaps> {
        ChatLifecycle::new(MemoryChatRepository::new(), StaticCaps::default())
    }

    fn lifecycle_with_manager(
        manager: Uuid,
    ) -> ChatLifecycle<MemoryChatRepository, StaticCaps> {
        ChatLifecycle::new(
            MemoryChatRepository::new(),
            StaticCaps {
                managers: vec![manager],
            },
        )
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let staff_a = Uuid::now_v7();
        let staff_b = Uuid::now_v7();
        let customer = Uuid::now_v7();
        let lc = lifecycle();

        // Customer opens a session.
        let session = lc
            .create_session(customer, None, Some("Printer on fire".to_string()))
            .await
            .unwrap();
        assert_eq!(session.status, SessionStatus::Waiting);

        // Staff A claims it.
        let outcome = lc.claim(&session.id, &staff_a).await.unwrap();
        let ClaimOutcome::Claimed(claimed) = outcome else {
            panic!("staff A should win the claim");
        };
        assert_eq!(claimed.status, SessionStatus::Active);
        assert_eq!(claimed.admin_user_id, Some(staff_a));

        // Staff B loses and sees A as owner.
        let outcome = lc.claim(&session.id, &staff_b).await.unwrap();
        let ClaimOutcome::AlreadyClaimed(current) = outcome else {
            panic!("staff B should lose the claim");
        };
        assert_eq!(current.admin_user_id, Some(staff_a));

        // Customer posts; staff polls from watermark 0.
        let hello = lc
            .post_message(&session.id, SenderType::Customer, &customer, "hello")
            .await
            .unwrap();
        let batch = lc.fetch_since(&session.id, 0).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, hello.id);
        assert_eq!(batch[0].body, "hello");

        // Staff replies; customer polls past the watermark.
        let hi = lc
            .post_message(&session.id, SenderType::Admin, &staff_a, "hi")
            .await
            .unwrap();
        assert!(hi.id > hello.id);
        let batch = lc.fetch_since(&session.id, hello.id).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body, "hi");

        // Close, then a late customer message is rejected.
        let outcome = lc.close(&session.id, &staff_a).await.unwrap();
        assert_eq!(outcome.session.status, SessionStatus::Closed);
        assert!(!outcome.already_closed);
        assert!(outcome.session.ended_at.is_some());

        let err = lc
            .post_message(&session.id, SenderType::Customer, &customer, "thanks")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::SessionClosed));

        // Nothing was appended after the close.
        let all = lc.fetch_since(&session.id, 0).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_claims_single_winner() {
        let customer = Uuid::now_v7();
        let lc = Arc::new(lifecycle());
        let session = lc.create_session(customer, None, None).await.unwrap();

        let mut handles = Vec::new();
        let staff_ids: Vec<Uuid> = (0..8).map(|_| Uuid::now_v7()).collect();
        for staff in &staff_ids {
            let lc = Arc::clone(&lc);
            let staff = *staff;
            let sid = session.id;
            handles.push(tokio::spawn(async move { lc.claim(&sid, &staff).await }));
        }

        let mut winners = 0;
        let mut observed_owner = None;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                ClaimOutcome::Claimed(s) => {
                    winners += 1;
                    observed_owner = s.admin_user_id;
                }
                ClaimOutcome::AlreadyClaimed(s) => {
                    // Every loser sees the final owner.
                    assert!(s.admin_user_id.is_some());
                }
            }
        }
        assert_eq!(winners, 1);

        let current = lc.get_session(&session.id).await.unwrap();
        assert_eq!(current.admin_user_id, observed_owner);
        assert!(staff_ids.contains(&current.admin_user_id.unwrap()));
    }

    #[tokio::test]
    async fn test_claim_closed_session_is_invalid_transition() {
        let staff = Uuid::now_v7();
        let lc = lifecycle();
        let session = lc.create_session(Uuid::now_v7(), None, None).await.unwrap();
        lc.close(&session.id, &staff).await.unwrap();

        let err = lc.claim(&session.id, &staff).await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_claim_unknown_session_is_not_found() {
        let lc = lifecycle();
        let err = lc.claim(&Uuid::now_v7(), &Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, ChatError::NotFound));
    }

    #[tokio::test]
    async fn test_admin_post_into_waiting_does_not_claim() {
        let staff = Uuid::now_v7();
        let lc = lifecycle();
        let session = lc.create_session(Uuid::now_v7(), None, None).await.unwrap();

        lc.post_message(&session.id, SenderType::Admin, &staff, "anyone there?")
            .await
            .unwrap();

        let current = lc.get_session(&session.id).await.unwrap();
        assert_eq!(current.status, SessionStatus::Waiting);
        assert!(current.admin_user_id.is_none());
    }

    #[tokio::test]
    async fn test_post_empty_body_rejected() {
        let customer = Uuid::now_v7();
        let lc = lifecycle();
        let session = lc.create_session(customer, None, None).await.unwrap();

        let err = lc
            .post_message(&session.id, SenderType::Customer, &customer, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
    }

    #[tokio::test]
    async fn test_post_bumps_last_message_at() {
        let customer = Uuid::now_v7();
        let lc = lifecycle();
        let session = lc.create_session(customer, None, None).await.unwrap();

        lc.post_message(&session.id, SenderType::Customer, &customer, "ping")
            .await
            .unwrap();

        let current = lc.get_session(&session.id).await.unwrap();
        assert!(current.last_message_at >= session.last_message_at);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let staff = Uuid::now_v7();
        let lc = lifecycle();
        let session = lc.create_session(Uuid::now_v7(), None, None).await.unwrap();

        let first = lc.close(&session.id, &staff).await.unwrap();
        assert!(!first.already_closed);
        let first_ended = first.session.ended_at.unwrap();

        let second = lc.close(&session.id, &staff).await.unwrap();
        assert!(second.already_closed);
        assert_eq!(second.session.ended_at.unwrap(), first_ended);
    }

    #[tokio::test]
    async fn test_close_from_waiting_leaves_admin_unset() {
        let staff = Uuid::now_v7();
        let lc = lifecycle();
        let session = lc.create_session(Uuid::now_v7(), None, None).await.unwrap();

        let outcome = lc.close(&session.id, &staff).await.unwrap();
        assert_eq!(outcome.session.status, SessionStatus::Closed);
        assert!(outcome.session.admin_user_id.is_none());
    }

    #[tokio::test]
    async fn test_fetch_since_exact_and_idempotent() {
        let customer = Uuid::now_v7();
        let lc = lifecycle();
        let session = lc.create_session(customer, None, None).await.unwrap();
        let other = lc.create_session(customer, None, None).await.unwrap();

        let mut ids = Vec::new();
        for i in 0..5 {
            let msg = lc
                .post_message(&session.id, SenderType::Customer, &customer, &format!("m{i}"))
                .await
                .unwrap();
            ids.push(msg.id);
        }
        // A message in another session must never leak into this one.
        lc.post_message(&other.id, SenderType::Customer, &customer, "other")
            .await
            .unwrap();

        let watermark = ids[1];
        let batch = lc.fetch_since(&session.id, watermark).await.unwrap();
        let got: Vec<i64> = batch.iter().map(|m| m.id).collect();
        assert_eq!(got, ids[2..].to_vec());
        assert!(batch.windows(2).all(|w| w[0].id < w[1].id));

        // Same watermark, same answer.
        let again = lc.fetch_since(&session.id, watermark).await.unwrap();
        assert_eq!(
            again.iter().map(|m| m.id).collect::<Vec<_>>(),
            got
        );

        // Caught-up watermark yields the empty sequence, not an error.
        let empty = lc.fetch_since(&session.id, *ids.last().unwrap()).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_since_unknown_session() {
        let lc = lifecycle();
        let err = lc.fetch_since(&Uuid::now_v7(), 0).await.unwrap_err();
        assert!(matches!(err, ChatError::NotFound));
    }

    #[tokio::test]
    async fn test_visibility_without_capability() {
        let staff_a = Uuid::now_v7();
        let staff_b = Uuid::now_v7();
        let lc = lifecycle();

        let mine = lc.create_session(Uuid::now_v7(), None, None).await.unwrap();
        lc.claim(&mine.id, &staff_a).await.unwrap();
        let theirs = lc.create_session(Uuid::now_v7(), None, None).await.unwrap();
        lc.claim(&theirs.id, &staff_b).await.unwrap();
        // Unassigned session, invisible without the capability.
        lc.create_session(Uuid::now_v7(), None, None).await.unwrap();

        let visible = lc.list_for_staff(&staff_a, None).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, mine.id);

        let err = lc.get_for_staff(&staff_a, &theirs.id).await.unwrap_err();
        assert!(matches!(err, ChatError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_visibility_with_manage_capability() {
        let manager = Uuid::now_v7();
        let staff = Uuid::now_v7();
        let lc = lifecycle_with_manager(manager);

        let waiting = lc.create_session(Uuid::now_v7(), None, None).await.unwrap();
        let claimed = lc.create_session(Uuid::now_v7(), None, None).await.unwrap();
        lc.claim(&claimed.id, &staff).await.unwrap();

        let visible = lc.list_for_staff(&manager, None).await.unwrap();
        assert_eq!(visible.len(), 2);

        let only_waiting = lc
            .list_for_staff(&manager, Some(SessionStatus::Waiting))
            .await
            .unwrap();
        assert_eq!(only_waiting.len(), 1);
        assert_eq!(only_waiting[0].id, waiting.id);

        // Manager can open another staff member's session.
        lc.get_for_staff(&manager, &claimed.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_participant_role_gates_message_access() {
        let customer = Uuid::now_v7();
        let staff = Uuid::now_v7();
        let stranger = Uuid::now_v7();
        let lc = lifecycle();

        let session = lc.create_session(customer, None, None).await.unwrap();
        lc.claim(&session.id, &staff).await.unwrap();

        // The customer participates on the customer side.
        let (_, role) = lc.participant_role(&session.id, &customer).await.unwrap();
        assert_eq!(role, SenderType::Customer);

        // The assigned staff member participates on the admin side.
        let (_, role) = lc.participant_role(&session.id, &staff).await.unwrap();
        assert_eq!(role, SenderType::Admin);

        // An unrelated authenticated user cannot read or post.
        let err = lc
            .participant_role(&session.id, &stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Unauthorized(_)));

        let err = lc.participant_role(&Uuid::now_v7(), &customer).await.unwrap_err();
        assert!(matches!(err, ChatError::NotFound));
    }

    #[tokio::test]
    async fn test_participant_role_with_manage_capability() {
        let manager = Uuid::now_v7();
        let lc = lifecycle_with_manager(manager);
        let session = lc.create_session(Uuid::now_v7(), None, None).await.unwrap();

        // Managers join any session's stream on the admin side, even before
        // a claim.
        let (_, role) = lc.participant_role(&session.id, &manager).await.unwrap();
        assert_eq!(role, SenderType::Admin);
    }

    /// Small xorshift generator so the random-operation test is deterministic.
    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            x
        }
    }

    #[tokio::test]
    async fn test_random_operations_respect_state_machine() {
        let customer = Uuid::now_v7();
        let staff = Uuid::now_v7();
        let lc = lifecycle();
        let mut rng = XorShift(0x9E3779B97F4A7C15);

        for _ in 0..20 {
            let session = lc.create_session(customer, None, None).await.unwrap();
            let mut prev = session.status;

            for _ in 0..30 {
                match rng.next() % 4 {
                    0 => {
                        let _ = lc.claim(&session.id, &staff).await;
                    }
                    1 => {
                        let _ = lc
                            .post_message(&session.id, SenderType::Customer, &customer, "x")
                            .await;
                    }
                    2 => {
                        let _ = lc.close(&session.id, &staff).await;
                    }
                    _ => {
                        let _ = lc.fetch_since(&session.id, 0).await;
                    }
                }

                let now = lc.get_session(&session.id).await.unwrap().status;
                assert!(
                    now == prev || prev.can_transition_to(now),
                    "illegal transition {prev} -> {now}"
                );
                prev = now;
            }
        }
    }
}
