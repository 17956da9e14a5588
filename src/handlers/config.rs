use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": {
            "server": {
                "host": config.server.host,
                "port": config.server.port
            },
            "worker": {
                "command": config.worker.command,
                "args": config.worker.args,
                "request_timeout_ms": config.worker.request_timeout_ms
            },
            "session": {
                "heartbeat_interval_secs": config.session.heartbeat_interval_secs,
                "max_sessions": config.session.max_sessions
            },
            "scoring": {
                "smoothing_alpha": config.scoring.smoothing_alpha,
                "presence_miss_frames": config.scoring.presence_miss_frames
            },
            "spelling": {
                "score_threshold": config.spelling.score_threshold,
                "stable_frames": config.spelling.stable_frames
            }
        }
    })))
}

pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config
        .update_from_json(&json_str)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    state
        .update_config(current_config.clone())
        .map_err(AppError::ValidationError)?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": {
            "server": {
                "host": current_config.server.host,
                "port": current_config.server.port
            },
            "worker": {
                "command": current_config.worker.command,
                "request_timeout_ms": current_config.worker.request_timeout_ms
            },
            "session": {
                "heartbeat_interval_secs": current_config.session.heartbeat_interval_secs,
                "max_sessions": current_config.session.max_sessions
            },
            "spelling": {
                "score_threshold": current_config.spelling.score_threshold,
                "stable_frames": current_config.spelling.stable_frames
            }
        }
    })))
}
