//! View controller: composes the stores into tab-based hub state and routes
//! user actions to store mutations.
//!
//! Store listeners never touch [`HubState`] directly. They post events tagged
//! with the generation they were started under; the controller applies them
//! one at a time and drops any event from a generation that has since been
//! torn down, so a previous user's listener can never write into the current
//! user's state.

use std::sync::Arc;

use shared::{
    domain::{DeploymentScope, Role, Session, SessionId, UserId, View},
    protocol::DocumentPath,
};
use storage::{DocumentStore, Storage};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::{
    admin::AdminFlag,
    auth::{sign_in, AuthProvider},
    config::HubConfig,
    error::{HubError, ValidationError},
    feedback::{validate_feedback, FeedbackSink},
    profile::{ProfileStore, RsvpChange},
    schedule::SessionStore,
    schedule_admin::{export_filename, export_json, Prompter, ScheduleAdmin, SessionForm},
    subscription::Subscription,
};

#[derive(Debug)]
pub enum HubEvent {
    ScheduleUpdated(Vec<Session>),
    ScheduleFailed(HubError),
    ProfileUpdated(Vec<SessionId>),
    ProfileFailed(HubError),
    AdminChanged(bool),
}

#[derive(Debug)]
enum Envelope {
    Auth(Option<UserId>),
    Store { generation: u64, event: HubEvent },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// No user is signed in yet.
    Initializing,
    /// Signed in, waiting for the first schedule snapshot.
    LoadingSchedule,
    Ready,
}

/// Open feedback modal for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackDraft {
    pub session_id: SessionId,
    /// `0` until a rating is chosen.
    pub rating: u8,
    pub comment: String,
    pub submitting: bool,
    pub error: Option<HubError>,
    token: u64,
}

impl FeedbackDraft {
    fn new(session_id: SessionId, token: u64) -> Self {
        Self {
            token,
            session_id,
            rating: 0,
            comment: String::new(),
            submitting: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub deployment_scope: DeploymentScope,
    pub user_id: Option<UserId>,
    pub role: Role,
}

#[derive(Debug, Default)]
pub struct HubState {
    pub user_id: Option<UserId>,
    pub view: View,
    pub sessions: Vec<Session>,
    pub attending: Vec<SessionId>,
    pub is_admin: bool,
    pub schedule_loaded: bool,
    pub profile_loaded: bool,
    pub admin_resolved: bool,
    pub schedule_error: Option<HubError>,
    pub profile_error: Option<HubError>,
    pub rsvp_error: Option<HubError>,
    pub admin_error: Option<HubError>,
    pub feedback: Option<FeedbackDraft>,
    pub session_form: Option<SessionForm>,
    pub form_error: Option<HubError>,
}

impl HubState {
    fn for_user(user_id: Option<UserId>) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    pub fn is_attending(&self, session_id: &SessionId) -> bool {
        self.attending.contains(session_id)
    }

    pub fn session(&self, session_id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|session| &session.id == session_id)
    }

    /// Non-fatal listener failures; the last-known data stays visible.
    pub fn banners(&self) -> impl Iterator<Item = &HubError> {
        self.schedule_error.iter().chain(self.profile_error.iter())
    }
}

/// A feedback write that has left the modal but not yet completed.
pub struct PendingFeedback {
    sink: FeedbackSink,
    generation: u64,
    draft: u64,
    session_id: SessionId,
    rating: u8,
    comment: String,
}

pub struct FeedbackOutcome {
    generation: u64,
    draft: u64,
    result: Result<DocumentPath, HubError>,
}

impl PendingFeedback {
    pub async fn send(self) -> FeedbackOutcome {
        let result = self
            .sink
            .submit(Some(&self.session_id), self.rating, &self.comment)
            .await;
        FeedbackOutcome {
            generation: self.generation,
            draft: self.draft,
            result,
        }
    }
}

pub struct ViewController {
    store: Arc<dyn DocumentStore>,
    scope: DeploymentScope,
    generation: u64,
    events_tx: mpsc::UnboundedSender<Envelope>,
    events_rx: mpsc::UnboundedReceiver<Envelope>,
    subscriptions: Vec<Subscription>,
    auth_watch: Option<Subscription>,
    state: HubState,
    next_draft: u64,
    /// Draft whose submission has not finished yet.
    feedback_in_flight: Option<u64>,
}

/// Opens the configured store, signs in and starts the listeners for the
/// signed-in user.
pub async fn bootstrap(
    config: &HubConfig,
    auth: &dyn AuthProvider,
) -> Result<ViewController, HubError> {
    let storage = Storage::new(&config.store.database_url)
        .await
        .map_err(|err| HubError::Configuration(format!("{err:#}")))?;
    let user_id = sign_in(auth, config.auth_token.as_deref()).await?;

    let mut controller = ViewController::new(Arc::new(storage), config.deployment_scope.clone());
    controller.set_user(Some(user_id));
    controller.watch_auth(auth.current_user());
    Ok(controller)
}

impl ViewController {
    pub fn new(store: Arc<dyn DocumentStore>, scope: DeploymentScope) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            store,
            scope,
            generation: 0,
            events_tx,
            events_rx,
            subscriptions: Vec::new(),
            auth_watch: None,
            state: HubState::default(),
            next_draft: 0,
            feedback_in_flight: None,
        }
    }

    pub fn state(&self) -> &HubState {
        &self.state
    }

    pub fn scope(&self) -> &DeploymentScope {
        &self.scope
    }

    pub fn readiness(&self) -> Readiness {
        if self.state.user_id.is_none() {
            Readiness::Initializing
        } else if !self.state.schedule_loaded {
            Readiness::LoadingSchedule
        } else {
            Readiness::Ready
        }
    }

    pub fn header(&self) -> Header {
        Header {
            deployment_scope: self.scope.clone(),
            user_id: self.state.user_id.clone(),
            role: Role::from_admin_flag(self.state.is_admin),
        }
    }

    pub fn visible_tabs(&self) -> Vec<View> {
        let mut tabs = View::ATTENDEE_TABS.to_vec();
        if self.state.is_admin {
            tabs.push(View::Admin);
        }
        tabs
    }

    /// Tears down every listener of the previous user before starting the
    /// listeners of the new one.
    pub fn set_user(&mut self, user_id: Option<UserId>) {
        if self.state.user_id == user_id && !self.subscriptions.is_empty() {
            return;
        }
        for mut subscription in self.subscriptions.drain(..) {
            subscription.cancel();
        }
        self.generation += 1;
        self.state = HubState::for_user(user_id.clone());
        self.feedback_in_flight = None;

        let Some(user_id) = user_id else {
            info!(generation = self.generation, "signed out; listeners stopped");
            return;
        };
        info!(user_id = %user_id, generation = self.generation, "starting listeners");

        let sessions = SessionStore::new(Arc::clone(&self.store), self.scope.clone());
        let tx = self.sender();
        self.subscriptions.push(sessions.subscribe(move |update| {
            tx(match update {
                Ok(sessions) => HubEvent::ScheduleUpdated(sessions),
                Err(err) => HubEvent::ScheduleFailed(err),
            })
        }));

        let profile = ProfileStore::new(Arc::clone(&self.store), &self.scope, &user_id);
        let tx = self.sender();
        self.subscriptions.push(profile.subscribe(move |update| {
            tx(match update {
                Ok(attending) => HubEvent::ProfileUpdated(attending),
                Err(err) => HubEvent::ProfileFailed(err),
            })
        }));

        let admin = AdminFlag::new(Arc::clone(&self.store), self.scope.clone(), user_id);
        let tx = self.sender();
        self.subscriptions
            .push(admin.subscribe(move |is_admin| tx(HubEvent::AdminChanged(is_admin))));
    }

    fn sender(&self) -> impl Fn(HubEvent) + Send + 'static {
        let events_tx = self.events_tx.clone();
        let generation = self.generation;
        move |event| {
            let _ = events_tx.send(Envelope::Store { generation, event });
        }
    }

    /// Follows the auth collaborator's "current user" feed.
    pub fn watch_auth(&mut self, mut current_user: watch::Receiver<Option<UserId>>) {
        let events_tx = self.events_tx.clone();
        self.auth_watch = Some(Subscription::spawn("auth", async move {
            while current_user.changed().await.is_ok() {
                let user_id = current_user.borrow_and_update().clone();
                if events_tx.send(Envelope::Auth(user_id)).is_err() {
                    return;
                }
            }
        }));
    }

    /// Waits for the next listener event and applies it. Returns `false` when
    /// the event was stale and dropped.
    pub async fn pump(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(envelope) => self.apply(envelope),
            None => false,
        }
    }

    /// Applies every event that is already queued.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(envelope) = self.events_rx.try_recv() {
            if self.apply(envelope) {
                applied += 1;
            }
        }
        applied
    }

    /// Pumps until the schedule, the profile and the admin flag have each
    /// reported once. Returns immediately while nobody is signed in.
    pub async fn wait_ready(&mut self) -> Readiness {
        while self.readiness() != Readiness::Initializing
            && !(self.state.schedule_loaded && self.state.profile_loaded && self.state.admin_resolved)
        {
            self.pump().await;
        }
        self.readiness()
    }

    fn apply(&mut self, envelope: Envelope) -> bool {
        let (generation, event) = match envelope {
            Envelope::Auth(user_id) => {
                self.set_user(user_id);
                return true;
            }
            Envelope::Store { generation, event } => (generation, event),
        };
        if generation != self.generation {
            debug!(generation, current = self.generation, ?event, "dropping stale event");
            return false;
        }

        match event {
            HubEvent::ScheduleUpdated(sessions) => {
                self.state.sessions = sessions;
                self.state.schedule_loaded = true;
            }
            HubEvent::ScheduleFailed(err) => {
                warn!(%err, "schedule listener failed");
                self.state.schedule_error = Some(err);
                self.state.schedule_loaded = true;
            }
            HubEvent::ProfileUpdated(attending) => {
                self.state.attending = attending;
                self.state.profile_loaded = true;
            }
            HubEvent::ProfileFailed(err) => {
                warn!(%err, "profile failed");
                self.state.profile_error = Some(err);
                self.state.profile_loaded = true;
            }
            HubEvent::AdminChanged(is_admin) => self.set_admin(is_admin),
        }
        true
    }

    fn set_admin(&mut self, is_admin: bool) {
        if self.state.is_admin != is_admin {
            info!(is_admin, "admin privilege changed");
        }
        self.state.is_admin = is_admin;
        self.state.admin_resolved = true;
        if !is_admin {
            self.state.session_form = None;
            self.state.form_error = None;
            if self.state.view.requires_admin() {
                self.state.view = View::Schedule;
            }
        }
    }

    pub fn navigate(&mut self, view: View) -> Result<(), HubError> {
        if view.requires_admin() && !self.state.is_admin {
            return Err(HubError::AdminRequired);
        }
        self.state.view = view;
        Ok(())
    }

    fn user_id(&self) -> Result<&UserId, HubError> {
        self.state.user_id.as_ref().ok_or(HubError::NotSignedIn)
    }

    pub async fn toggle_rsvp(&mut self, session_id: &SessionId) -> Result<RsvpChange, HubError> {
        let profile = ProfileStore::new(Arc::clone(&self.store), &self.scope, self.user_id()?);
        let result = profile.toggle(session_id, &self.state.attending).await;
        self.state.rsvp_error = result.as_ref().err().cloned();
        result
    }

    /// Opens the modal for a session on the schedule. Refused while an
    /// earlier submission is still in flight.
    pub fn open_feedback(&mut self, session_id: SessionId) -> Result<(), HubError> {
        if self.feedback_in_flight.is_some() {
            return Err(HubError::SubmissionInFlight);
        }
        if self.state.session(&session_id).is_none() {
            return Err(HubError::Validation(ValidationError::NoSessionSelected));
        }
        self.next_draft += 1;
        self.state.feedback = Some(FeedbackDraft::new(session_id, self.next_draft));
        Ok(())
    }

    pub fn set_rating(&mut self, rating: u8) {
        if let Some(draft) = self.state.feedback.as_mut() {
            draft.rating = rating;
        }
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        if let Some(draft) = self.state.feedback.as_mut() {
            draft.comment = comment.into();
        }
    }

    pub fn cancel_feedback(&mut self) {
        self.state.feedback = None;
    }

    /// Validates the open modal and marks it as submitting. A second call
    /// before [`Self::finish_feedback`] is rejected.
    pub fn begin_feedback(&mut self) -> Result<PendingFeedback, HubError> {
        let sink = FeedbackSink::new(Arc::clone(&self.store), &self.scope, self.user_id()?);
        let generation = self.generation;
        let draft = self
            .state
            .feedback
            .as_mut()
            .ok_or(HubError::Validation(ValidationError::NoSessionSelected))?;
        if draft.submitting || self.feedback_in_flight.is_some() {
            return Err(HubError::SubmissionInFlight);
        }
        if let Err(err) = validate_feedback(Some(&draft.session_id), draft.rating, &draft.comment) {
            let err = HubError::from(err);
            draft.error = Some(err.clone());
            return Err(err);
        }
        draft.submitting = true;
        draft.error = None;
        self.feedback_in_flight = Some(draft.token);
        Ok(PendingFeedback {
            sink,
            generation,
            draft: draft.token,
            session_id: draft.session_id.clone(),
            rating: draft.rating,
            comment: draft.comment.clone(),
        })
    }

    /// Closes the modal on success; keeps it open with the error otherwise.
    pub fn finish_feedback(&mut self, outcome: FeedbackOutcome) -> Result<DocumentPath, HubError> {
        if outcome.generation != self.generation {
            return outcome.result;
        }
        if self.feedback_in_flight == Some(outcome.draft) {
            self.feedback_in_flight = None;
        }
        let open_draft = self
            .state
            .feedback
            .as_ref()
            .is_some_and(|draft| draft.token == outcome.draft);
        if open_draft {
            match &outcome.result {
                Ok(_) => self.state.feedback = None,
                Err(err) => {
                    if let Some(draft) = self.state.feedback.as_mut() {
                        draft.submitting = false;
                        draft.error = Some(err.clone());
                    }
                }
            }
        }
        outcome.result
    }

    pub async fn submit_feedback(&mut self) -> Result<DocumentPath, HubError> {
        let pending = self.begin_feedback()?;
        let outcome = pending.send().await;
        self.finish_feedback(outcome)
    }

    fn schedule_admin(&mut self) -> Result<ScheduleAdmin, HubError> {
        if !self.state.is_admin {
            self.state.admin_error = Some(HubError::AdminRequired);
            return Err(HubError::AdminRequired);
        }
        Ok(ScheduleAdmin::new(Arc::clone(&self.store), self.scope.clone()))
    }

    fn record_admin<T>(&mut self, result: Result<T, HubError>) -> Result<T, HubError> {
        self.state.admin_error = result.as_ref().err().cloned();
        result
    }

    pub fn open_create(&mut self) -> Result<(), HubError> {
        self.schedule_admin()?;
        self.state.session_form = Some(SessionForm::blank());
        self.state.form_error = None;
        Ok(())
    }

    pub fn open_edit(&mut self, session_id: &SessionId) -> Result<(), HubError> {
        self.schedule_admin()?;
        let session = self
            .state
            .session(session_id)
            .ok_or(HubError::Validation(ValidationError::NoSessionSelected))?;
        self.state.session_form = Some(SessionForm::edit(session));
        self.state.form_error = None;
        Ok(())
    }

    pub fn form_mut(&mut self) -> Option<&mut SessionForm> {
        self.state.session_form.as_mut()
    }

    pub fn cancel_form(&mut self) {
        self.state.session_form = None;
        self.state.form_error = None;
    }

    /// Saves the open form. The form stays open with its error on failure.
    pub async fn save_form(&mut self) -> Result<Session, HubError> {
        let admin = self.schedule_admin()?;
        let form = self
            .state
            .session_form
            .clone()
            .ok_or(HubError::Validation(ValidationError::NoSessionSelected))?;
        match admin.save(&form).await {
            Ok(session) => {
                self.cancel_form();
                Ok(session)
            }
            Err(err) => {
                self.state.form_error = Some(err.clone());
                Err(err)
            }
        }
    }

    pub async fn delete_session(
        &mut self,
        session_id: &SessionId,
        prompter: &dyn Prompter,
    ) -> Result<bool, HubError> {
        let admin = self.schedule_admin()?;
        let result = admin.delete(session_id, prompter).await;
        self.record_admin(result)
    }

    pub async fn duplicate_session(
        &mut self,
        session_id: &SessionId,
        prompter: &dyn Prompter,
    ) -> Result<Option<Session>, HubError> {
        let admin = self.schedule_admin()?;
        let source = self
            .state
            .session(session_id)
            .cloned()
            .ok_or(HubError::Validation(ValidationError::NoSessionSelected))?;
        let result = admin.duplicate(&source, prompter).await;
        self.record_admin(result)
    }

    pub async fn seed(&mut self) -> Result<usize, HubError> {
        let admin = self.schedule_admin()?;
        let result = admin.seed().await;
        self.record_admin(result)
    }

    /// File name and pretty-printed content of the in-memory schedule.
    pub fn export(&mut self) -> Result<(String, String), HubError> {
        self.schedule_admin()?;
        let result = export_json(&self.state.sessions)
            .map(|json| (export_filename(&self.scope), json));
        self.record_admin(result)
    }

    pub async fn import(&mut self, text: &str) -> Result<usize, HubError> {
        let admin = self.schedule_admin()?;
        let result = admin.import(text).await;
        self.record_admin(result)
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
