use super::{error_response, session_error_response, AppState};
use crate::models::{HealthResponse, MatchRequest, MatchResponse};
use crate::services::MatchTarget;
use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use validator::Validate;

/// Configure matching and catalog routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/matches", web::post().to(match_properties))
        .route("/catalog/reload", web::post().to(reload_catalog));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let snapshot = state.pipeline.catalog().snapshot();
    let status = if snapshot.records.is_empty() { "degraded" } else { "healthy" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        catalog_version: snapshot.version,
        catalog_rows: snapshot.records.len(),
        active_sessions: state.pipeline.sessions().len(),
    })
}

/// Rank the catalog
///
/// POST /api/v1/matches
///
/// Request body, one of:
/// ```json
/// {"sessionId": "string", "topN": 3}
/// {"requirements": {"location": {"value": "downtown", "confidence": 0.9}}, "topN": 3}
/// ```
async fn match_properties(state: web::Data<AppState>, req: web::Json<MatchRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for match request: {:?}", errors);
        return error_response(StatusCode::BAD_REQUEST, "Validation failed", errors);
    }

    let req = req.into_inner();
    let target = match (req.session_id, req.requirements) {
        (Some(session_id), _) => MatchTarget::Session(session_id),
        (None, Some(requirements)) => MatchTarget::Requirements { requirements, emotion: req.emotion },
        (None, None) => {
            return error_response(StatusCode::BAD_REQUEST, "Validation failed", "sessionId or requirements is required")
        }
    };

    match state.pipeline.match_properties(target, req.top_n).await {
        Ok(outcome) => {
            tracing::info!(
                "Returning {} matches (from {} listings, catalog version {})",
                outcome.matches.len(),
                outcome.total_candidates,
                outcome.catalog_version
            );
            HttpResponse::Ok().json(MatchResponse::from(outcome))
        }
        Err(e) => session_error_response(e),
    }
}

/// Re-read the catalog file and swap it in; the old snapshot stays on failure
async fn reload_catalog(state: web::Data<AppState>) -> impl Responder {
    let catalog = state.pipeline.catalog().clone();

    match web::block(move || catalog.reload()).await {
        Ok(Ok(report)) => HttpResponse::Ok().json(report),
        Ok(Err(e)) => {
            tracing::warn!("Catalog reload failed, keeping version {}: {}", state.pipeline.catalog().version(), e);
            error_response(StatusCode::UNPROCESSABLE_ENTITY, "Catalog reload failed", e)
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "Catalog reload failed", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::models::PropertyRecord;
    use crate::services::{CatalogStore, MatchPipeline};
    use actix_web::{test, App};
    use std::sync::Arc;

    fn property(id: &str, location: &str, sqft: u32, price: f64) -> PropertyRecord {
        PropertyRecord {
            id: id.to_string(),
            location: location.to_string(),
            sqft,
            price,
            ..Default::default()
        }
    }

    fn app_state(records: Vec<PropertyRecord>) -> AppState {
        AppState {
            pipeline: MatchPipeline::from_settings(&Settings::default(), Arc::new(CatalogStore::new(records))).unwrap(),
        }
    }

    #[actix_web::test]
    async fn test_health() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(vec![property("a", "Downtown", 1000, 1000.0)])))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let health: HealthResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.catalog_rows, 1);
    }

    #[actix_web::test]
    async fn test_match_explicit_requirements() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(vec![
                    property("a", "Downtown", 3200, 4800.0),
                    property("b", "Uptown", 3000, 4700.0),
                ])))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/matches")
            .set_json(serde_json::json!({
                "requirements": {
                    "location": {"value": "downtown", "confidence": 0.9},
                    "sqftMin": {"value": 3000, "confidence": 0.9}
                },
                "topN": 1
            }))
            .to_request();
        let body: MatchResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.matches.len(), 1);
        assert_eq!(body.matches[0].property_id, "a");
        assert_eq!(body.total_candidates, 2);
    }

    #[actix_web::test]
    async fn test_match_without_target_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(Vec::new())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/matches")
            .set_json(serde_json::json!({"topN": 3}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_reload_without_source_fails() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(Vec::new())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post().uri("/catalog/reload").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
