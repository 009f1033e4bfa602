//! Coach: runs conversation turns against the generator and the engine.

use serde::Serialize;

use super::conversation::{Conversation, TurnAction};
use super::generator::{ContentGenerator, DraftFactory};
use super::Draft;
use crate::records::{Category, CategoryPayload};
use crate::session::SessionContext;
use crate::sync::{ReconciliationEngine, RecordStore, RetryQueue, SaveReport, SyncError};

/// What a turn produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplyKind {
    DraftOffered,
    Committed,
    Discarded,
    CollectingRestrictions,
    PendingRejected,
    /// Confirmed, but the current plan could not be read; still pending
    CommitHeld,
    Chat,
}

/// Reply for one chat turn.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub kind: ReplyKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<Draft>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<SaveReport>,
    /// Degraded-mode notice, if the save could not reach the store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl ChatReply {
    fn text(kind: ReplyKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            draft: None,
            saved: None,
            notice: None,
        }
    }
}

/// Coach bound to an engine and a draft factory.
pub struct Coach<'a, S, Q, G> {
    engine: &'a ReconciliationEngine<S, Q>,
    factory: &'a DraftFactory<G>,
}

impl<'a, S, Q, G> Coach<'a, S, Q, G>
where
    S: RecordStore,
    Q: RetryQueue,
    G: ContentGenerator,
{
    pub fn new(engine: &'a ReconciliationEngine<S, Q>, factory: &'a DraftFactory<G>) -> Self {
        Self { engine, factory }
    }

    /// Handle one user message.
    pub async fn respond(
        &self,
        ctx: &SessionContext,
        conversation: &mut Conversation,
        text: &str,
    ) -> Result<ChatReply, SyncError> {
        match conversation.handle(text) {
            TurnAction::Generate(request) => {
                let request = match self.engine.cache().load_payload(ctx, Category::Preferences)? {
                    Some(CategoryPayload::Preferences(prefs)) => request.with_preferences(&prefs),
                    _ => request,
                };
                let draft = self.factory.draft(&request).await;
                let message = draft.content.summary();
                if let Err(draft) = conversation.offer(draft.clone(), request) {
                    return Ok(ChatReply::text(
                        ReplyKind::PendingRejected,
                        format!("Resolve pending suggestion first: \"{}\"", draft.title()),
                    ));
                }
                Ok(ChatReply {
                    draft: Some(draft),
                    ..ChatReply::text(ReplyKind::DraftOffered, message)
                })
            }

            TurnAction::Commit { draft, request } => {
                if !self.refresh_plan(ctx).await? {
                    let message = format!(
                        "I can't reach your saved plans right now, so \"{}\" is still waiting. \
                         Say yes to try again or no to drop it.",
                        draft.title()
                    );
                    conversation.hold(draft, request);
                    return Ok(ChatReply::text(ReplyKind::CommitHeld, message));
                }
                let report = self.commit(ctx, &draft).await?;
                let notice = report.remote.notice().map(str::to_string);
                Ok(ChatReply {
                    saved: Some(report),
                    notice,
                    ..ChatReply::text(
                        ReplyKind::Committed,
                        format!("Added \"{}\" to your collection. Anything else?", draft.title()),
                    )
                })
            }

            TurnAction::Discarded { title } => {
                tracing::debug!("Discarded draft {}", title);
                Ok(ChatReply::text(ReplyKind::Discarded, "No problem. Need anything else?"))
            }

            TurnAction::CollectRestrictions {
                class,
                restrictions,
            } => Ok(ChatReply::text(
                ReplyKind::CollectingRestrictions,
                format!(
                    "Got it, I'll avoid {}. Anything else to keep in mind before I make a new {}?",
                    restrictions.join(", "),
                    class
                ),
            )),

            TurnAction::RejectPending { title } => Ok(ChatReply::text(
                ReplyKind::PendingRejected,
                format!(
                    "Resolve pending suggestion first: add \"{}\" or decline it.",
                    title
                ),
            )),

            TurnAction::Chat => Ok(ChatReply::text(
                ReplyKind::Chat,
                "I can build workouts and diet plans. Ask for a workout or a meal plan.",
            )),
        }
    }

    /// Reload the owner's data so a commit starts from the full plan.
    ///
    /// `false` when the remote state is unknown: appending to a cache that
    /// may be missing items would overwrite them remotely.
    async fn refresh_plan(&self, ctx: &SessionContext) -> Result<bool, SyncError> {
        let Some(owner) = ctx.owner() else {
            return Ok(true);
        };
        let load = self.engine.load(ctx).await?;
        if !load.remote.is_known() {
            tracing::warn!(
                "Holding commit for {}: current plan unreadable ({})",
                owner,
                load.source.description()
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Append the draft to its plan collection and save the full set.
    async fn commit(&self, ctx: &SessionContext, draft: &Draft) -> Result<SaveReport, SyncError> {
        let category = draft.class().category();
        let current = self.engine.cache().load_payload(ctx, category)?;
        let payload = draft.content.clone().appended_to(current);
        tracing::info!("Committing {} \"{}\"", draft.class(), draft.title());
        self.engine.save(ctx, payload).await
    }
}
