//! Draft/commit state machine driven by chat text.

use fitcoach::coach::fallback::fallback_for;
use fitcoach::coach::{Conversation, ConversationState, DraftClass, GenerationRequest, TurnAction};
use fitcoach::coach::{Draft, DraftSource};

fn offer(conversation: &mut Conversation, text: &str) -> Draft {
    let TurnAction::Generate(request) = conversation.handle(text) else {
        panic!("'{}' should request a draft", text);
    };
    let draft = Draft::new(
        fallback_for(&request),
        DraftSource::Fallback,
        request.restrictions.clone(),
    );
    conversation.offer(draft.clone(), request).unwrap();
    draft
}

#[test]
fn test_yes_with_restriction_is_not_a_confirmation() {
    let mut conversation = Conversation::new();
    offer(&mut conversation, "a keto meal plan");

    let action = conversation.handle("yes but without dairy");
    assert_eq!(
        action,
        TurnAction::CollectRestrictions {
            class: DraftClass::Diet,
            restrictions: vec!["no dairy".to_string()],
        }
    );
    assert!(conversation.pending_draft().is_none());
}

#[test]
fn test_confirmed_draft_leaves_conversation_idle() {
    let mut conversation = Conversation::new();
    let draft = offer(&mut conversation, "a core workout");
    assert!(matches!(
        conversation.state(),
        ConversationState::AwaitingConfirmation { .. }
    ));

    assert!(matches!(
        conversation.handle("sounds good"),
        TurnAction::Commit { draft: committed, .. } if committed == draft
    ));
    assert_eq!(conversation.state(), &ConversationState::Idle);
    // Nothing left to confirm.
    assert_eq!(conversation.handle("yes"), TurnAction::Chat);
}

#[test]
fn test_held_draft_can_be_confirmed_again() {
    let mut conversation = Conversation::new();
    let draft = offer(&mut conversation, "a core workout");

    let TurnAction::Commit { draft: committed, request } = conversation.handle("yes") else {
        panic!("expected a commit");
    };
    conversation.hold(committed, request);
    assert_eq!(conversation.pending_draft(), Some(&draft));

    assert!(matches!(
        conversation.handle("yes"),
        TurnAction::Commit { draft: again, .. } if again == draft
    ));
}

#[test]
fn test_only_one_pending_draft() {
    let mut conversation = Conversation::new();
    let first = offer(&mut conversation, "a hiit workout");

    // Same class and other class are both rejected while one is pending.
    for text in ["another workout", "a paleo diet"] {
        assert_eq!(
            conversation.handle(text),
            TurnAction::RejectPending {
                title: first.title().to_string()
            }
        );
    }
    let request = GenerationRequest::new(DraftClass::Workout, "yoga");
    let second = Draft::new(fallback_for(&request), DraftSource::Fallback, vec![]);
    assert_eq!(conversation.offer(second.clone(), request), Err(second));
    assert_eq!(conversation.pending_draft(), Some(&first));
}

#[test]
fn test_decline_then_new_request() {
    let mut conversation = Conversation::new();
    offer(&mut conversation, "a strength workout");
    assert!(matches!(
        conversation.handle("no"),
        TurnAction::Discarded { .. }
    ));
    let next = offer(&mut conversation, "a yoga workout");
    assert_eq!(next.class(), DraftClass::Workout);
}

#[test]
fn test_fresh_item_ids() {
    let request = GenerationRequest::new(DraftClass::Workout, "core");
    let a = fallback_for(&request).with_new_id();
    let b = fallback_for(&request).with_new_id();
    assert_ne!(a.item_id(), b.item_id());
}

#[test]
fn test_reset_forgets_restrictions() {
    let mut conversation = Conversation::new();
    let TurnAction::Generate(request) = conversation.handle("a diet without gluten") else {
        panic!("expected generation");
    };
    assert_eq!(request.restrictions, vec!["no gluten"]);
    conversation.reset();
    assert!(conversation.restrictions(DraftClass::Diet).is_empty());
}
