use super::*;
use crate::tests_support::RecordingStore;
use shared::domain::FeedbackRecord;

fn sink(store: Arc<dyn DocumentStore>) -> FeedbackSink {
    FeedbackSink::new(store, &DeploymentScope::new("conf"), &UserId::new("u-1"))
}

#[test]
fn every_rating_in_range_is_accepted() {
    let id = SessionId::new("s-101");
    for rating in MIN_RATING..=MAX_RATING {
        let feedback = validate_feedback(Some(&id), rating, "").expect("valid");
        assert_eq!(feedback.rating, rating);
    }
}

#[test]
fn comment_is_trimmed() {
    let feedback = validate_feedback(Some(&SessionId::new("s-101")), 3, "  fine  \n")
        .expect("valid");
    assert_eq!(feedback.comment, "fine");
}

#[test]
fn missing_session_is_rejected() {
    assert_eq!(
        validate_feedback(None, 3, ""),
        Err(ValidationError::NoSessionSelected)
    );
}

#[tokio::test]
async fn out_of_range_ratings_never_reach_the_store() {
    let store = RecordingStore::new().await;
    let sink = sink(store.clone());
    let id = SessionId::new("s-101");
    for rating in [0, 6] {
        let err = sink.submit(Some(&id), rating, "").await.expect_err("invalid");
        assert_eq!(err, HubError::Validation(ValidationError::RatingOutOfRange));
    }
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn submitted_record_carries_store_timestamp() {
    let store = RecordingStore::new().await;
    let sink = sink(store.clone());
    let path = sink
        .submit(Some(&SessionId::new("s-101")), 4, "Great session!")
        .await
        .expect("submit");

    let doc = store.get(&path).await.expect("read").expect("exists");
    let record: FeedbackRecord = doc.decode().expect("decode");
    assert_eq!(record.session_id.as_str(), "s-101");
    assert_eq!(record.rating, 4);
    assert_eq!(record.comment, "Great session!");
    assert_eq!(store.writes(), 1);
}

#[tokio::test]
async fn each_submission_is_a_new_record() {
    let store = RecordingStore::new().await;
    let sink = sink(store.clone());
    let id = SessionId::new("s-101");
    let first = sink.submit(Some(&id), 5, "").await.expect("first");
    let second = sink.submit(Some(&id), 2, "").await.expect("second");
    assert_ne!(first, second);

    let records = store.list(first.collection()).await.expect("list");
    assert_eq!(records.len(), 2);
}

#[test]
fn fields_leave_creation_time_to_the_store() {
    let fields = validate_feedback(Some(&SessionId::new("s-101")), 4, "Great session!")
        .expect("valid")
        .into_fields();
    assert_eq!(fields.get("createdAt"), Some(&FieldValue::ServerTimestamp));
    assert_eq!(fields.get("rating"), Some(&FieldValue::Value(Value::from(4u8))));
}
