use super::*;
use crate::tests_support::{memory_store, RecordingStore};
use serde_json::json;
use shared::{
    domain::FeedbackRecord,
    protocol::{literal_fields, WriteMode},
};
use std::time::Duration;

const SCOPE: &str = "conf";

struct AlwaysYes;

impl Prompter for AlwaysYes {
    fn confirm(&self, _message: &str) -> bool {
        true
    }

    fn prompt(&self, _message: &str, default: &str) -> Option<String> {
        Some(default.to_string())
    }
}

async fn pump_until(controller: &mut ViewController, done: impl Fn(&HubState) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done(controller.state()) {
            controller.pump().await;
        }
    })
    .await
    .expect("state never reached");
}

async fn signed_in(store: Arc<dyn DocumentStore>, user: &str) -> ViewController {
    let mut controller = ViewController::new(store, DeploymentScope::new(SCOPE));
    controller.set_user(Some(UserId::new(user)));
    tokio::time::timeout(Duration::from_secs(5), controller.wait_ready())
        .await
        .expect("ready");
    controller
}

async fn grant_admin(store: &dyn DocumentStore, user: &str) {
    store
        .set(
            &DeploymentScope::new(SCOPE).admin_marker(&UserId::new(user)),
            literal_fields(&json!({})).expect("fields"),
            WriteMode::Merge,
        )
        .await
        .expect("grant");
}

async fn revoke_admin(store: &dyn DocumentStore, user: &str) {
    store
        .delete(&DeploymentScope::new(SCOPE).admin_marker(&UserId::new(user)))
        .await
        .expect("revoke");
}

async fn add_keynote(store: &dyn DocumentStore) {
    let fields = literal_fields(&json!({
        "title": "Opening Keynote",
        "room": "Main Hall A",
        "speaker": "Dr. Jamie Rhodes",
        "startISO": "2025-11-15T09:00:00",
        "endISO": "2025-11-15T10:00:00",
        "summary": "Keynote",
    }))
    .expect("fields");
    store
        .set(
            &DeploymentScope::new(SCOPE).session_document(&SessionId::new("s-101")),
            fields,
            WriteMode::Overwrite,
        )
        .await
        .expect("session");
}

#[tokio::test]
async fn readiness_follows_sign_in_and_first_snapshot() {
    let store = memory_store().await;
    let mut controller = ViewController::new(store, DeploymentScope::new(SCOPE));
    assert_eq!(controller.readiness(), Readiness::Initializing);
    assert_eq!(controller.wait_ready().await, Readiness::Initializing);

    controller.set_user(Some(UserId::new("u-1")));
    assert_eq!(controller.readiness(), Readiness::LoadingSchedule);
    assert_eq!(controller.wait_ready().await, Readiness::Ready);
    assert_eq!(controller.header().role, Role::Attendee);
}

#[tokio::test]
async fn admin_tab_tracks_the_marker() {
    let store = memory_store().await;
    let mut controller = signed_in(store.clone(), "u-1").await;
    assert_eq!(controller.visible_tabs(), View::ATTENDEE_TABS.to_vec());
    assert_eq!(controller.navigate(View::Admin), Err(HubError::AdminRequired));
    assert_eq!(controller.state().view, View::Schedule);

    grant_admin(store.as_ref(), "u-1").await;
    pump_until(&mut controller, |state| state.is_admin).await;
    assert!(controller.visible_tabs().contains(&View::Admin));
    assert_eq!(controller.header().role, Role::Admin);
    controller.navigate(View::Admin).expect("admin view");

    revoke_admin(store.as_ref(), "u-1").await;
    pump_until(&mut controller, |state| !state.is_admin).await;
    assert_eq!(controller.state().view, View::Schedule);
    assert!(!controller.visible_tabs().contains(&View::Admin));
}

#[tokio::test]
async fn attend_adds_the_session_to_the_rsvp_set() {
    let store = memory_store().await;
    add_keynote(store.as_ref()).await;
    let mut controller = signed_in(store, "u-1").await;
    let keynote = SessionId::new("s-101");
    assert_eq!(controller.state().sessions.len(), 1);

    let change = controller.toggle_rsvp(&keynote).await.expect("attend");
    assert_eq!(change, RsvpChange::Added);
    pump_until(&mut controller, |state| state.is_attending(&keynote)).await;

    let change = controller.toggle_rsvp(&keynote).await.expect("leave");
    assert_eq!(change, RsvpChange::Removed);
    pump_until(&mut controller, |state| state.attending.is_empty()).await;
    assert!(controller.state().rsvp_error.is_none());
}

#[tokio::test]
async fn feedback_modal_submits_and_resets() {
    let store = memory_store().await;
    add_keynote(store.as_ref()).await;
    let mut controller = signed_in(store.clone(), "u-1").await;
    controller.open_feedback(SessionId::new("s-101")).expect("open");
    controller.set_rating(4);
    controller.set_comment("Great session!");

    let path = controller.submit_feedback().await.expect("submit");
    assert!(controller.state().feedback.is_none());

    let record: FeedbackRecord = store
        .get(&path)
        .await
        .expect("read")
        .expect("exists")
        .decode()
        .expect("decode");
    assert_eq!(record.session_id.as_str(), "s-101");
    assert_eq!(record.rating, 4);
    assert_eq!(record.comment, "Great session!");

    // Reopening starts from an empty draft.
    controller.open_feedback(SessionId::new("s-101")).expect("open");
    let draft = controller.state().feedback.as_ref().expect("open");
    assert_eq!((draft.rating, draft.comment.as_str()), (0, ""));
}

#[tokio::test]
async fn unrated_feedback_stays_open_without_a_write() {
    let store = RecordingStore::new().await;
    add_keynote(store.as_ref()).await;
    let mut controller = signed_in(store.clone(), "u-1").await;
    let writes = store.writes();
    controller.open_feedback(SessionId::new("s-101")).expect("open");

    let err = controller.submit_feedback().await.expect_err("no rating");
    assert_eq!(err, HubError::Validation(ValidationError::RatingOutOfRange));
    let draft = controller.state().feedback.as_ref().expect("still open");
    assert_eq!(draft.error, Some(err));
    assert_eq!(store.writes(), writes);
}

#[tokio::test]
async fn second_submit_while_in_flight_is_rejected() {
    let store = memory_store().await;
    add_keynote(store.as_ref()).await;
    let mut controller = signed_in(store, "u-1").await;
    controller.open_feedback(SessionId::new("s-101")).expect("open");
    controller.set_rating(5);

    let pending = controller.begin_feedback().expect("first");
    assert!(controller.state().feedback.as_ref().expect("open").submitting);
    assert!(matches!(
        controller.begin_feedback(),
        Err(HubError::SubmissionInFlight)
    ));

    let outcome = pending.send().await;
    controller.finish_feedback(outcome).expect("submitted");
    assert!(controller.state().feedback.is_none());
}

#[tokio::test]
async fn reopening_the_modal_while_in_flight_cannot_submit_twice() {
    let store = RecordingStore::new().await;
    add_keynote(store.as_ref()).await;
    let mut controller = signed_in(store.clone(), "u-1").await;
    let writes = store.writes();
    let keynote = SessionId::new("s-101");

    controller.open_feedback(keynote.clone()).expect("open");
    controller.set_rating(5);
    let pending = controller.begin_feedback().expect("first");

    assert_eq!(
        controller.open_feedback(keynote.clone()),
        Err(HubError::SubmissionInFlight)
    );
    controller.cancel_feedback();
    assert_eq!(
        controller.open_feedback(keynote.clone()),
        Err(HubError::SubmissionInFlight)
    );
    assert!(matches!(
        controller.begin_feedback(),
        Err(HubError::Validation(ValidationError::NoSessionSelected))
    ));

    let outcome = pending.send().await;
    controller.finish_feedback(outcome).expect("submitted");
    assert_eq!(store.writes(), writes + 1);

    // Once the write lands a fresh modal opens normally.
    controller.open_feedback(keynote).expect("reopen");
    let draft = controller.state().feedback.as_ref().expect("open");
    assert!(!draft.submitting);
}

#[tokio::test]
async fn finishing_after_cancel_clears_the_in_flight_guard() {
    let store = memory_store().await;
    add_keynote(store.as_ref()).await;
    let mut controller = signed_in(store, "u-1").await;
    let keynote = SessionId::new("s-101");

    controller.open_feedback(keynote.clone()).expect("open");
    controller.set_rating(3);
    let pending = controller.begin_feedback().expect("begin");
    let outcome = pending.send().await;
    controller.cancel_feedback();

    controller.finish_feedback(outcome).expect("submitted");
    assert!(controller.state().feedback.is_none());
    controller.open_feedback(keynote).expect("open again");
    controller.set_comment("second thoughts");
    assert_eq!(
        controller.state().feedback.as_ref().map(|d| d.comment.as_str()),
        Some("second thoughts")
    );
}

#[tokio::test]
async fn feedback_for_an_unknown_session_is_refused() {
    let store = RecordingStore::new().await;
    let mut controller = signed_in(store.clone(), "u-1").await;
    let writes = store.writes();

    assert_eq!(
        controller.open_feedback(SessionId::new("no-such-session")),
        Err(HubError::Validation(ValidationError::NoSessionSelected))
    );
    assert!(controller.state().feedback.is_none());
    controller.set_rating(3);
    assert!(controller.submit_feedback().await.is_err());
    assert_eq!(store.writes(), writes);
}

#[tokio::test]
async fn events_from_a_previous_user_are_dropped() {
    let store = memory_store().await;
    grant_admin(store.as_ref(), "admin-user").await;
    let mut controller = signed_in(store.clone(), "admin-user").await;
    assert!(controller.state().is_admin);
    let stale_generation = controller.generation;

    controller.set_user(Some(UserId::new("attendee")));
    assert!(!controller.state().is_admin);
    controller
        .events_tx
        .send(Envelope::Store {
            generation: stale_generation,
            event: HubEvent::AdminChanged(true),
        })
        .expect("send");
    controller.wait_ready().await;
    controller.drain();

    assert!(!controller.state().is_admin);
    assert_eq!(
        controller.state().user_id.as_ref().map(UserId::as_str),
        Some("attendee")
    );
}

#[tokio::test]
async fn auth_changes_restart_the_listeners() {
    let store = memory_store().await;
    let mut controller = signed_in(store, "u-1").await;
    let (tx, rx) = watch::channel(Some(UserId::new("u-1")));
    controller.watch_auth(rx);

    tx.send_replace(Some(UserId::new("u-2")));
    pump_until(&mut controller, |state| {
        state.user_id.as_ref().map(UserId::as_str) == Some("u-2")
    })
    .await;
    assert_eq!(controller.wait_ready().await, Readiness::Ready);

    tx.send_replace(None);
    pump_until(&mut controller, |state| state.user_id.is_none()).await;
    assert_eq!(controller.readiness(), Readiness::Initializing);
    assert!(controller.subscriptions.is_empty());
}

#[tokio::test]
async fn admin_actions_require_the_marker() {
    let store = RecordingStore::new().await;
    let mut controller = signed_in(store.clone(), "u-1").await;
    let writes = store.writes();

    assert_eq!(controller.seed().await, Err(HubError::AdminRequired));
    assert_eq!(controller.open_create(), Err(HubError::AdminRequired));
    assert_eq!(controller.state().admin_error, Some(HubError::AdminRequired));
    assert_eq!(store.writes(), writes);
}

#[tokio::test]
async fn admin_manages_the_schedule() {
    let store = memory_store().await;
    grant_admin(store.as_ref(), "admin").await;
    let mut controller = signed_in(store, "admin").await;

    assert_eq!(controller.seed().await.expect("seed"), 3);
    pump_until(&mut controller, |state| state.sessions.len() == 3).await;

    controller.open_create().expect("form");
    let form = controller.form_mut().expect("open");
    form.set_id("s-104");
    form.title = "Lightning Talks".into();
    form.room = "Room 204".into();
    form.speaker = "Various".into();
    form.start_iso = "2025-11-15T13:00".into();
    form.end_iso = "2025-11-15T12:00".into();
    form.summary = "Five minutes each.".into();

    let err = controller.save_form().await.expect_err("end before start");
    assert_eq!(err, HubError::Validation(ValidationError::StartAfterEnd));
    assert_eq!(controller.state().form_error, Some(err));

    controller.form_mut().expect("still open").end_iso = "2025-11-15T14:00".into();
    controller.save_form().await.expect("save");
    assert!(controller.state().session_form.is_none());
    pump_until(&mut controller, |state| state.sessions.len() == 4).await;

    let copy = controller
        .duplicate_session(&SessionId::new("s-104"), &AlwaysYes)
        .await
        .expect("duplicate")
        .expect("copied");
    assert_eq!(copy.id.as_str(), "s-104-copy");
    pump_until(&mut controller, |state| state.sessions.len() == 5).await;

    assert!(controller
        .delete_session(&SessionId::new("s-104-copy"), &AlwaysYes)
        .await
        .expect("delete"));
    pump_until(&mut controller, |state| state.sessions.len() == 4).await;

    let (name, json) = controller.export().expect("export");
    assert_eq!(name, "schedule-conf.json");
    let order: Vec<String> = serde_json::from_str::<Vec<Session>>(&json)
        .expect("json")
        .into_iter()
        .map(|session| session.id.to_string())
        .collect();
    assert_eq!(order, ["s-101", "s-102", "s-103", "s-104"]);
}

#[tokio::test]
async fn invalid_import_reports_the_record_and_writes_nothing() {
    let store = RecordingStore::new().await;
    grant_admin(store.as_ref(), "admin").await;
    let mut controller = signed_in(store.clone(), "admin").await;
    let writes = store.writes();

    let text = r#"[{"id":"s-200","title":"X","room":"R","speaker":"Sp","startISO":"bad","endISO":"2025-11-15T10:00:00","summary":"s"}]"#;
    let err = controller.import(text).await.expect_err("invalid");
    assert_eq!(err.to_string(), "Invalid session: s-200");
    assert_eq!(controller.state().admin_error, Some(err));
    assert_eq!(store.writes(), writes);
}
