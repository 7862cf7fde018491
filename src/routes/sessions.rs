use super::{error_response, session_error_response, AppState};
use crate::models::{ProcessTurnRequest, TurnResponse, Utterance};
use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use validator::Validate;

/// Configure all session routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/sessions", web::post().to(create_session))
        .route("/sessions/{id}", web::get().to(get_session))
        .route("/sessions/{id}/turns", web::post().to(process_turn))
        .route("/sessions/{id}/reset", web::post().to(reset_session));
}

/// POST /api/v1/sessions
async fn create_session(state: web::Data<AppState>) -> impl Responder {
    match state.pipeline.open_session().await {
        Ok(session) => {
            tracing::info!("Opened session {}", session.session_id);
            HttpResponse::Created().json(session)
        }
        Err(e) => session_error_response(e),
    }
}

/// GET /api/v1/sessions/{id}
async fn get_session(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match state.pipeline.get_state(&path).await {
        Ok(session) => HttpResponse::Ok().json(session),
        Err(e) => session_error_response(e),
    }
}

/// Process one utterance
///
/// POST /api/v1/sessions/{id}/turns
///
/// Request body:
/// ```json
/// {
///   "text": "I need 3000 sqft downtown under $5000 a month",
///   "turnIndex": 0,
///   "acousticFeatures": {"pitchVariance": 4.2, "energy": 0.6, "speechRate": 5.1, "pauseRatio": 0.1}
/// }
/// ```
async fn process_turn(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<ProcessTurnRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for turn request: {:?}", errors);
        return error_response(StatusCode::BAD_REQUEST, "Validation failed", errors);
    }

    let session_id = path.into_inner();
    let req = req.into_inner();

    let turn_index = match req.turn_index {
        Some(index) => index,
        None => match state.pipeline.get_state(&session_id).await {
            Ok(session) => session.turn_count,
            Err(e) => return session_error_response(e),
        },
    };
    let mut utterance = Utterance::new(session_id.clone(), turn_index, req.text);
    if let Some(timestamp) = req.timestamp {
        utterance.timestamp = timestamp;
    }

    match state
        .pipeline
        .process_turn(&session_id, &utterance, req.acoustic_features.as_ref())
        .await
    {
        Ok(outcome) => HttpResponse::Ok().json(TurnResponse::from(outcome)),
        Err(e) => session_error_response(e),
    }
}

/// POST /api/v1/sessions/{id}/reset
async fn reset_session(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match state.pipeline.reset_session(&path).await {
        Ok(session) => HttpResponse::Ok().json(session),
        Err(e) => session_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::models::{ConversationState, SessionStatus};
    use crate::services::{CatalogStore, MatchPipeline, UnknownSessionPolicy};
    use actix_web::{test, App};
    use std::sync::Arc;

    fn app_state(settings: &Settings) -> AppState {
        AppState {
            pipeline: MatchPipeline::from_settings(settings, Arc::new(CatalogStore::empty())).unwrap(),
        }
    }

    #[actix_web::test]
    async fn test_turns_update_session() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(&Settings::default())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post().uri("/sessions").to_request();
        let created: ConversationState = test::call_and_read_body_json(&app, req).await;
        assert_eq!(created.status, SessionStatus::New);

        let uri = format!("/sessions/{}/turns", created.session_id);
        let req = test::TestRequest::post()
            .uri(&uri)
            .set_json(serde_json::json!({"text": "somewhere downtown"}))
            .to_request();
        let turn: TurnResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(turn.state.status, SessionStatus::Collecting);

        let req = test::TestRequest::post()
            .uri(&uri)
            .set_json(serde_json::json!({"text": "budget is $4,000 a month"}))
            .to_request();
        let turn: TurnResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(turn.state.status, SessionStatus::Ready);

        let req = test::TestRequest::post()
            .uri(&format!("/sessions/{}/reset", created.session_id))
            .to_request();
        let reset: ConversationState = test::call_and_read_body_json(&app, req).await;
        assert_eq!(reset.status, SessionStatus::New);
    }

    #[actix_web::test]
    async fn test_strict_mode_returns_404() {
        let mut settings = Settings::default();
        settings.sessions.unknown_session = UnknownSessionPolicy::Strict;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(&settings)))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/sessions/unknown").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_full_store_returns_503() {
        let mut settings = Settings::default();
        settings.sessions.max_sessions = 1;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(&settings)))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post().uri("/sessions").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

        let req = test::TestRequest::post().uri("/sessions").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
