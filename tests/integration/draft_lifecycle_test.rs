//! Drafts reach the store only after confirmation.

use std::sync::Arc;

use fitcoach::coach::{Coach, Conversation, DraftFactory, ReplyKind, TemplateGenerator};
use fitcoach::records::{CategoryPayload, ItemId};
use fitcoach::sync::{MemoryRecordStore, RetryQueue};

use crate::harness::{ctx, device, engine, workout};

#[tokio::test]
async fn test_confirm_adds_exactly_one_new_record() {
    let engine = engine();
    let factory = DraftFactory::new(TemplateGenerator);
    let coach = Coach::new(&engine, &factory);
    let ctx = ctx("u1");
    let owner = ctx.owner().unwrap().clone();

    engine
        .save(&ctx, CategoryPayload::WorkoutPlan(vec![workout("w1", "Full Body Strength")]))
        .await
        .unwrap();
    let before = engine.store().records(&owner);

    let mut conversation = Conversation::new();
    let offered = coach
        .respond(&ctx, &mut conversation, "give me an ab workout")
        .await
        .unwrap();
    assert_eq!(offered.kind, ReplyKind::DraftOffered);
    assert_eq!(engine.store().records(&owner), before);

    let committed = coach
        .respond(&ctx, &mut conversation, "yes, add it")
        .await
        .unwrap();
    assert_eq!(committed.kind, ReplyKind::Committed);

    let after = engine.store().records(&owner);
    assert_eq!(after.len(), before.len() + 1);
    let new: Vec<_> = after
        .iter()
        .filter(|r| !before.iter().any(|b| b.item_id == r.item_id))
        .collect();
    assert_eq!(new.len(), 1);

    let plan = engine.cache().snapshot(&ctx).unwrap().workout_plan;
    assert_eq!(plan.len(), 2);
    assert_eq!(plan[0].title, "Full Body Strength");
}

#[tokio::test]
async fn test_decline_adds_nothing() {
    let engine = engine();
    let factory = DraftFactory::new(TemplateGenerator);
    let coach = Coach::new(&engine, &factory);
    let ctx = ctx("u1");
    let mut conversation = Conversation::new();

    coach
        .respond(&ctx, &mut conversation, "a keto diet plan")
        .await
        .unwrap();
    let reply = coach
        .respond(&ctx, &mut conversation, "nah")
        .await
        .unwrap();
    assert_eq!(reply.kind, ReplyKind::Discarded);
    assert_eq!(engine.store().call_count(), 0);
    assert!(engine.cache().snapshot(&ctx).unwrap().diet_plan.is_empty());
}

#[tokio::test]
async fn test_second_draft_rejected_while_pending() {
    let engine = engine();
    let factory = DraftFactory::new(TemplateGenerator);
    let coach = Coach::new(&engine, &factory);
    let ctx = ctx("u1");
    let mut conversation = Conversation::new();

    let first = coach
        .respond(&ctx, &mut conversation, "a yoga routine")
        .await
        .unwrap();
    let second = coach
        .respond(&ctx, &mut conversation, "another workout")
        .await
        .unwrap();
    assert_eq!(second.kind, ReplyKind::PendingRejected);
    assert!(second.draft.is_none());

    let pending = conversation.pending_draft().unwrap();
    assert_eq!(Some(pending), first.draft.as_ref());
}

#[tokio::test]
async fn test_restriction_loop_regenerates() {
    let engine = engine();
    let factory = DraftFactory::new(TemplateGenerator);
    let coach = Coach::new(&engine, &factory);
    let ctx = ctx("u1");
    let mut conversation = Conversation::new();

    coach
        .respond(&ctx, &mut conversation, "a balanced meal plan")
        .await
        .unwrap();
    let reply = coach
        .respond(&ctx, &mut conversation, "no, I'm allergic to shellfish")
        .await
        .unwrap();
    assert_eq!(reply.kind, ReplyKind::CollectingRestrictions);

    let reply = coach
        .respond(&ctx, &mut conversation, "that's all")
        .await
        .unwrap();
    assert_eq!(reply.kind, ReplyKind::DraftOffered);
    let draft = reply.draft.unwrap();
    assert_eq!(draft.restrictions, vec!["no shellfish"]);
    assert_eq!(engine.store().call_count(), 0);
}

#[tokio::test]
async fn test_commit_on_fresh_device_keeps_existing_plan() {
    let store = Arc::new(MemoryRecordStore::new());
    let ctx = ctx("u1");
    let owner = ctx.owner().unwrap().clone();

    let laptop = device(&store);
    laptop
        .save(
            &ctx,
            CategoryPayload::WorkoutPlan(vec![workout("w1", "Push Day"), workout("w2", "Pull Day")]),
        )
        .await
        .unwrap();

    // Never loaded on this device: its cache knows nothing of w1 or w2.
    let phone = device(&store);
    let factory = DraftFactory::new(TemplateGenerator);
    let coach = Coach::new(&phone, &factory);
    let mut conversation = Conversation::new();
    coach
        .respond(&ctx, &mut conversation, "a leg workout")
        .await
        .unwrap();
    let reply = coach.respond(&ctx, &mut conversation, "yes").await.unwrap();
    assert_eq!(reply.kind, ReplyKind::Committed);

    let ids: Vec<ItemId> = store.records(&owner).into_iter().map(|r| r.item_id).collect();
    assert_eq!(ids.len(), 3);
    assert!(ids.contains(&ItemId::from("w1")));
    assert!(ids.contains(&ItemId::from("w2")));
}

#[tokio::test]
async fn test_commit_waits_while_plan_unreadable() {
    let store = Arc::new(MemoryRecordStore::new());
    let ctx = ctx("u1");
    let owner = ctx.owner().unwrap().clone();

    device(&store)
        .save(&ctx, CategoryPayload::WorkoutPlan(vec![workout("w1", "Push Day")]))
        .await
        .unwrap();

    let phone = device(&store);
    let factory = DraftFactory::new(TemplateGenerator);
    let coach = Coach::new(&phone, &factory);
    let mut conversation = Conversation::new();
    coach
        .respond(&ctx, &mut conversation, "a stretching routine")
        .await
        .unwrap();

    store.set_online(false);
    let held = coach.respond(&ctx, &mut conversation, "yes").await.unwrap();
    assert_eq!(held.kind, ReplyKind::CommitHeld);
    assert!(conversation.pending_draft().is_some());
    assert!(phone.queue().pending(&owner).unwrap().is_empty());

    store.set_online(true);
    let committed = coach.respond(&ctx, &mut conversation, "yes").await.unwrap();
    assert_eq!(committed.kind, ReplyKind::Committed);
    assert_eq!(store.records(&owner).len(), 2);
}
