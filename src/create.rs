//! Ad-creation submission.
//!
//! Each submission walks `Idle -> Uploading? -> Dispatching -> Success|Failed`.
//! Uploading is skipped when the draft already names a media URL or has
//! nothing to upload. An upload failure never fails the submission; it only
//! leaves `image_url` empty in the payload.
use crate::draft as draft_store;
use crate::error::{StudioError, StudioResult};
use crate::model::CreateAdDraft;
use crate::store::Pool;
use crate::upload::{UploadGateway, UploadOutcome, UploadSource};
use crate::webhook::{WebhookAction, WebhookDispatcher};
use serde_json::{json, Value};
use tracing::{error, info, instrument};

pub const REQUEST_TYPE: &str = "create_ad";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Uploading,
    Dispatching,
    Success,
    Failed(String),
}

#[derive(Debug)]
pub struct Submission {
    /// States visited, in order.
    pub trace: Vec<SubmissionState>,
    pub media_url: Option<String>,
    /// Set when an upload was attempted and degraded.
    pub upload_warning: Option<String>,
    /// Whether the stored draft was removed after a successful dispatch.
    pub draft_cleared: bool,
    pub outcome: StudioResult<Value>,
}

impl Submission {
    fn start() -> Self {
        Self {
            trace: vec![SubmissionState::Idle],
            media_url: None,
            upload_warning: None,
            draft_cleared: false,
            outcome: Ok(Value::Null),
        }
    }

    fn enter(&mut self, state: SubmissionState) {
        info!(state = ?state, "submission state");
        self.trace.push(state);
    }

    fn fail(mut self, err: StudioError) -> Self {
        self.enter(SubmissionState::Failed(err.to_string()));
        self.outcome = Err(err);
        self
    }

    /// Terminal state of this submission (`Idle` after a success).
    pub fn state(&self) -> &SubmissionState {
        self.trace.last().unwrap_or(&SubmissionState::Idle)
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn into_result(self) -> StudioResult<Value> {
        self.outcome
    }
}

/// Canonical generation payload.
pub fn generate_payload(draft: &CreateAdDraft, image_url: Option<&str>) -> Value {
    json!({
        "type": REQUEST_TYPE,
        "prompt": draft.prompt.trim(),
        "aspect_ratio": draft.aspect_ratio.as_str(),
        "image_url": image_url,
        "product_name": draft.product_name.trim(),
        "product_description": draft.product_description.trim(),
    })
}

fn upload_source(draft: &CreateAdDraft) -> Option<UploadSource> {
    if let Some(path) = &draft.file {
        return Some(UploadSource::File(path.clone()));
    }
    draft
        .preview
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(|p| UploadSource::Preview(p.to_string()))
}

pub struct AdCreation {
    uploads: UploadGateway,
    dispatcher: WebhookDispatcher,
    category: String,
}

impl AdCreation {
    pub fn new(
        uploads: UploadGateway,
        dispatcher: WebhookDispatcher,
        category: impl Into<String>,
    ) -> Self {
        Self {
            uploads,
            dispatcher,
            category: category.into(),
        }
    }

    /// Submit `draft`. On success the stored draft is cleared.
    #[instrument(skip_all)]
    pub async fn submit(&self, pool: &Pool, draft: &CreateAdDraft) -> Submission {
        let mut submission = Submission::start();

        if draft.prompt.trim().is_empty() {
            return submission.fail(StudioError::InvalidDraft("prompt must be non-empty"));
        }
        // Resolved before any upload: a missing endpoint costs no network call.
        if let Err(err) = self.dispatcher.endpoint(WebhookAction::Generate) {
            return submission.fail(err);
        }

        submission.media_url = match (draft.direct_image_url(), upload_source(draft)) {
            (Some(url), _) => Some(url.to_string()),
            (None, Some(source)) => {
                submission.enter(SubmissionState::Uploading);
                match self.uploads.upload_or_degrade(&source, &self.category).await {
                    UploadOutcome::Uploaded { url } => Some(url),
                    UploadOutcome::Degraded { reason } => {
                        submission.upload_warning = Some(reason);
                        None
                    }
                }
            }
            (None, None) => None,
        };

        submission.enter(SubmissionState::Dispatching);
        let payload = generate_payload(draft, submission.media_url.as_deref());
        let response = match self.dispatcher.send(WebhookAction::Generate, &payload).await {
            Ok(response) => response,
            Err(err) => {
                error!(%err, "ad request failed");
                return submission.fail(err);
            }
        };

        submission.enter(SubmissionState::Success);
        match draft_store::clear(pool).await {
            Ok(()) => submission.draft_cleared = true,
            Err(err) => error!(%err, "failed to clear draft after submission"),
        }
        submission.enter(SubmissionState::Idle);
        submission.outcome = Ok(response);
        submission
    }
}
