//! Line-protocol requests through `Api::dispatch`.

use std::sync::Arc;

use fitcoach::api::{Api, ApiRequest, DataResponse, StaticTokenIdentity};
use fitcoach::coach::{DraftFactory, TemplateGenerator};
use fitcoach::records::OwnerId;
use fitcoach::sync::{MemoryRecordStore, MemoryRetryQueue};
use serde_json::Value;

use crate::harness::device;

type LineApi = Api<MemoryRecordStore, MemoryRetryQueue, TemplateGenerator>;

fn api(store: &Arc<MemoryRecordStore>) -> LineApi {
    let identity = StaticTokenIdentity::new()
        .with_token("alice-token", OwnerId::new("alice").unwrap())
        .with_token("bob-token", OwnerId::new("bob").unwrap());
    Api::new(
        Arc::new(device(store)),
        DraftFactory::new(TemplateGenerator),
        identity,
    )
}

async fn send(api: &LineApi, line: &str) -> DataResponse {
    let request = ApiRequest::parse(line).unwrap();
    api.dispatch(request).await
}

fn data(response: &DataResponse) -> &Value {
    response.data.as_ref().unwrap()
}

#[tokio::test]
async fn test_save_and_fetch_plan() {
    let store = Arc::new(MemoryRecordStore::new());
    let api = api(&store);

    let saved = send(
        &api,
        r#"{"token":"alice-token","action":"save","userId":"alice","dataType":"workout",
            "data":[{"id":"w1","title":"Leg Day","workoutType":"strength","exercises":["Squats"]}]}"#,
    )
    .await;
    assert!(saved.success, "{:?}", saved.error);
    assert_eq!(data(&saved)["remote"]["status"], "synced");

    let fetched = send(&api, r#"{"token":"alice-token","action":"fetch","dataType":"workout"}"#).await;
    assert!(fetched.success);
    assert!(fetched.notice.is_none());
    assert_eq!(data(&fetched)[0]["title"], "Leg Day");

    let all = send(&api, r#"{"token":"alice-token","action":"fetch"}"#).await;
    assert_eq!(data(&all)["workoutPlan"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_rejects_other_owner_and_missing_token() {
    let store = Arc::new(MemoryRecordStore::new());
    let api = api(&store);

    let mismatch = send(
        &api,
        r#"{"token":"alice-token","action":"fetch","userId":"bob"}"#,
    )
    .await;
    assert!(!mismatch.success);
    assert_eq!(mismatch.status, 401);

    let anonymous = send(&api, r#"{"action":"fetch"}"#).await;
    assert_eq!(anonymous.status, 401);

    let questionnaire = send(&api, r#"{"action":"questionnaire"}"#).await;
    assert!(questionnaire.success);
    assert!(data(&questionnaire).as_array().is_some_and(|steps| !steps.is_empty()));
}

#[tokio::test]
async fn test_unknown_category_is_bad_request() {
    let store = Arc::new(MemoryRecordStore::new());
    let api = api(&store);

    let response = send(
        &api,
        r#"{"token":"alice-token","action":"save","dataType":"sleep","data":[]}"#,
    )
    .await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_onboarding_then_chat_commit() {
    let store = Arc::new(MemoryRecordStore::new());
    let api = api(&store);

    let gate = send(&api, r#"{"token":"bob-token","action":"gate"}"#).await;
    assert_eq!(data(&gate)["decision"]["outcome"], "redirectToOnboarding");

    let onboarded = send(
        &api,
        r#"{"token":"bob-token","action":"completeOnboarding","preferences":{
            "fitnessGoal":"build-muscle","experienceLevel":"intermediate",
            "workoutFrequency":"3-4","workoutDuration":"45-60",
            "preferredWorkoutTypes":["strength","hiit"],"limitations":["none"]}}"#,
    )
    .await;
    assert!(onboarded.success, "{:?}", onboarded.error);
    assert_eq!(data(&onboarded)["workoutsCreated"], 2);

    let gate = send(&api, r#"{"token":"bob-token","action":"gate"}"#).await;
    assert_eq!(data(&gate)["decision"]["outcome"], "allow");
    assert_eq!(data(&gate)["decision"]["rule"], "remoteData");

    let offered = send(
        &api,
        r#"{"token":"bob-token","action":"chat","text":"make me a yoga workout"}"#,
    )
    .await;
    assert_eq!(data(&offered)["kind"], "draftOffered");

    // Alice's conversation is separate and has nothing pending.
    let other = send(&api, r#"{"token":"alice-token","action":"chat","text":"yes"}"#).await;
    assert_eq!(data(&other)["kind"], "chat");

    let committed = send(&api, r#"{"token":"bob-token","action":"chat","text":"yes please"}"#).await;
    assert_eq!(data(&committed)["kind"], "committed");

    let plan = send(&api, r#"{"token":"bob-token","action":"fetch","dataType":"workout"}"#).await;
    assert_eq!(data(&plan).as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_outage_notice_and_sync() {
    let store = Arc::new(MemoryRecordStore::new());
    let api = api(&store);

    store.set_online(false);
    let saved = send(
        &api,
        r#"{"token":"alice-token","action":"save","dataType":"workoutHistory",
            "data":[{"id":"h1","date":"2024-05-01","workout":"Yoga","completed":true}]}"#,
    )
    .await;
    assert!(saved.success);
    assert!(saved.notice.is_some());

    let fetched = send(&api, r#"{"token":"alice-token","action":"fetch","dataType":"workoutHistory"}"#).await;
    assert!(fetched.success);
    assert!(fetched.notice.is_some());
    assert_eq!(data(&fetched)[0]["id"], "h1");

    store.set_online(true);
    let synced = send(&api, r#"{"token":"alice-token","action":"sync"}"#).await;
    assert_eq!(data(&synced)["synced"], 1);
    assert_eq!(store.records(&OwnerId::new("alice").unwrap()).len(), 1);
}
