//! Bot action API.
//!
//! Endpoints:
//!
//! - `POST /bots/{bot}/actions` Submit an action; acknowledged at once,
//!   processed in the background
//! - `GET  /bots`               List the bots this gateway serves
//! - `GET  /sessions/{id}`      Current representations of a session

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::SharedState;
use crate::notifier::{ActionResponse, ActionSink};
use docforge_core::message::ChatTurn;
use docforge_core::representation::Representation;
use docforge_engine::{Action, FileRef};

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/bots", get(list_bots_handler))
        .route("/bots/{bot}/actions", post(action_handler))
        .route("/sessions/{id}", get(session_handler))
}

// ── Actions ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// An instruction that may change representations.
    Utterance,
    /// A question answered from the representations.
    Output,
    /// Alias of `output`.
    Query,
    RepresentationEdit,
    Ingest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedRepresentation {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: ActionKind,
    pub session_id: String,
    #[serde(default)]
    pub correlation_id: String,
    #[serde(default)]
    pub response_url: Option<String>,
    #[serde(default)]
    pub utterance: Option<String>,
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,
    #[serde(default)]
    pub files: Vec<FileRef>,
    #[serde(default)]
    pub changed_representation: Option<ChangedRepresentation>,
}

impl ActionRequest {
    /// The engine action this request asks for. Files must carry their
    /// content inline: the gateway never reads server paths.
    pub fn to_action(&self) -> Result<Action, String> {
        let utterance = || {
            self.utterance
                .clone()
                .ok_or_else(|| format!("'{}' requires an utterance", self.kind_name()))
        };

        match self.action {
            ActionKind::Utterance => Ok(Action::Command {
                utterance: utterance()?,
                history: self.chat_history.clone(),
            }),
            ActionKind::Output | ActionKind::Query => Ok(Action::Query {
                utterance: utterance()?,
                history: self.chat_history.clone(),
            }),
            ActionKind::RepresentationEdit => {
                let changed = self
                    .changed_representation
                    .clone()
                    .ok_or("'representation_edit' requires changed_representation")?;
                Ok(Action::Edit {
                    name: changed.name,
                    text: changed.text,
                })
            }
            ActionKind::Ingest => {
                if let Some(file) = self.files.iter().find(|f| f.content.is_none()) {
                    return Err(format!("file '{}' has no inline content", file.name));
                }
                Ok(Action::Ingest {
                    files: self
                        .files
                        .iter()
                        .map(|f| FileRef {
                            path: None,
                            ..f.clone()
                        })
                        .collect(),
                })
            }
        }
    }

    fn kind_name(&self) -> &'static str {
        match self.action {
            ActionKind::Utterance => "utterance",
            ActionKind::Output => "output",
            ActionKind::Query => "query",
            ActionKind::RepresentationEdit => "representation_edit",
            ActionKind::Ingest => "ingest",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

async fn action_handler(
    State(state): State<SharedState>,
    Path(bot): Path<String>,
    Json(req): Json<ActionRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let engine = state
        .engines
        .get(&bot)
        .cloned()
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("unknown bot '{bot}'")))?;

    let action = req
        .to_action()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    let session = state
        .sessions
        .get_or_create(&req.session_id, engine.variant())
        .await
        .map_err(|e| api_error(StatusCode::CONFLICT, e.to_string()))?;

    info!(
        bot = %bot,
        session = %req.session_id,
        correlation = %req.correlation_id,
        action = action.kind(),
        "Action accepted"
    );

    let sink = ActionSink {
        correlation_id: req.correlation_id.clone(),
        session_id: req.session_id.clone(),
        response_url: req.response_url.clone(),
        notifier: state.notifier.clone(),
        events: state.events.clone(),
    };

    tokio::spawn(async move {
        if let Err(e) = engine.handle(&session, action, &sink).await {
            warn!(session = %sink.session_id, error = %e, "Background action failed");
        }
    });

    Ok(Json(ActionResponse::acknowledgement(
        &req.correlation_id,
        &req.session_id,
    )))
}

// ── Bots & sessions ───────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct BotDto {
    pub name: String,
    pub description: String,
    pub representations: Vec<String>,
}

async fn list_bots_handler(State(state): State<SharedState>) -> Json<Vec<BotDto>> {
    let mut bots: Vec<BotDto> = state
        .engines
        .values()
        .map(|engine| {
            let variant = engine.variant();
            BotDto {
                name: variant.name.clone(),
                description: variant.description.clone(),
                representations: variant.schema.names().map(String::from).collect(),
            }
        })
        .collect();
    bots.sort_by(|a, b| a.name.cmp(&b.name));
    Json(bots)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub bot: String,
    pub created_at: String,
    pub representations: Vec<Representation>,
}

async fn session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("unknown session '{id}'")))?;

    Ok(Json(SessionResponse {
        session_id: session.id().to_string(),
        bot: session.bot().to_string(),
        created_at: session.created_at().to_rfc3339(),
        representations: session.snapshot().await,
    }))
}
