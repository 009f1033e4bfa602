//! Draft/commit state machine for one conversation.
//!
//! The machine is pure: it decides what should happen next and leaves
//! generation and persistence to the caller.

use std::collections::HashMap;

use super::generator::GenerationRequest;
use super::intent;
use super::{Draft, DraftClass};

/// Where the conversation stands.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    /// One draft is waiting for a yes or no
    AwaitingConfirmation {
        draft: Draft,
        request: GenerationRequest,
    },
    /// The user declined with restrictions; the next turn regenerates
    CollectingRestriction { request: GenerationRequest },
}

impl ConversationState {
    pub fn name(&self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::AwaitingConfirmation { .. } => "awaitingConfirmation",
            ConversationState::CollectingRestriction { .. } => "collectingRestriction",
        }
    }
}

/// What the caller must do for a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnAction {
    /// Produce a draft for this request and hand it to [`Conversation::offer`]
    Generate(GenerationRequest),
    /// Persist this draft; `request` lets the caller [`Conversation::hold`] it
    Commit {
        draft: Draft,
        request: GenerationRequest,
    },
    /// The pending draft was dropped; nothing is written
    Discarded { title: String },
    /// Restrictions recorded; a new draft follows on the next turn
    CollectRestrictions {
        class: DraftClass,
        restrictions: Vec<String>,
    },
    /// A new generation request arrived while a draft is pending
    RejectPending { title: String },
    /// Not a draft request
    Chat,
}

/// Conversation state plus restrictions remembered for this session.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    state: ConversationState,
    restrictions: HashMap<DraftClass, Vec<String>>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn pending_draft(&self) -> Option<&Draft> {
        match &self.state {
            ConversationState::AwaitingConfirmation { draft, .. } => Some(draft),
            _ => None,
        }
    }

    /// Restrictions accumulated for `class`.
    pub fn restrictions(&self, class: DraftClass) -> &[String] {
        self.restrictions
            .get(&class)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn remember(&mut self, class: DraftClass, found: Vec<String>) -> Vec<String> {
        let known = self.restrictions.entry(class).or_default();
        for r in found {
            if !known.contains(&r) {
                known.push(r);
            }
        }
        known.clone()
    }

    /// Advance the machine with one user message.
    pub fn handle(&mut self, text: &str) -> TurnAction {
        match std::mem::take(&mut self.state) {
            ConversationState::Idle => match intent::classify(text) {
                Some(class) => {
                    let restrictions = self.remember(class, intent::extract_restrictions(text));
                    TurnAction::Generate(
                        GenerationRequest::new(class, text).with_restrictions(restrictions),
                    )
                }
                None => TurnAction::Chat,
            },

            ConversationState::AwaitingConfirmation { draft, request } => {
                if intent::is_affirmative(text) && !intent::asks_for_other(text, draft.class()) {
                    return TurnAction::Commit { draft, request };
                }

                let found = intent::extract_restrictions(text);
                if !found.is_empty() {
                    let class = draft.class();
                    let restrictions = self.remember(class, found);
                    self.state = ConversationState::CollectingRestriction { request };
                    return TurnAction::CollectRestrictions {
                        class,
                        restrictions,
                    };
                }

                if intent::classify(text).is_some() && !intent::has_negation(text) {
                    let title = draft.title().to_string();
                    self.state = ConversationState::AwaitingConfirmation { draft, request };
                    return TurnAction::RejectPending { title };
                }

                TurnAction::Discarded {
                    title: draft.title().to_string(),
                }
            }

            ConversationState::CollectingRestriction { request } => {
                let restrictions = self.remember(request.class, intent::extract_restrictions(text));
                TurnAction::Generate(request.with_restrictions(restrictions))
            }
        }
    }

    /// Make `draft` the pending suggestion.
    ///
    /// Refused while another draft is pending, so at most one exists.
    pub fn offer(&mut self, draft: Draft, request: GenerationRequest) -> Result<(), Draft> {
        if matches!(self.state, ConversationState::AwaitingConfirmation { .. }) {
            return Err(draft);
        }
        self.state = ConversationState::AwaitingConfirmation { draft, request };
        Ok(())
    }

    /// Put a confirmed draft back up for confirmation when it could not be
    /// committed.
    pub fn hold(&mut self, draft: Draft, request: GenerationRequest) {
        self.state = ConversationState::AwaitingConfirmation { draft, request };
    }

    /// Drop any pending draft and forget restrictions.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
