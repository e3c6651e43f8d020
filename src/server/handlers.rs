//! HTTP request handlers

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::data::Observation;
use crate::system::Prediction;

use super::error::{Result, ServerError};
use super::state::AppState;

// ============================================================================
// Service Handlers
// ============================================================================

pub async fn root() -> Json<Value> {
    Json(json!({
        "status": "online",
        "message": "Exoplanet transit classification API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/": "GET - service information",
            "/health": "GET - health check",
            "/predict": "POST - classify one transit observation",
            "/analyze": "POST - alias of /predict",
            "/predict/batch": "POST - classify a list of observations",
        },
    }))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "model_loaded": state.model_loaded(),
    }))
}

// ============================================================================
// Prediction Handlers
// ============================================================================

/// Serialize a served prediction into the public response shape
fn prediction_body(prediction: &Prediction) -> Value {
    let result = &prediction.result;
    let mut body = json!({
        "status": "success",
        "classification": result.label.as_str(),
        "confidence": result.confidence,
        "class_probabilities": result.class_probabilities(),
        "uncertainty": {
            "entropy": result.uncertainty,
            "model_agreement": result.model_agreement,
        },
        "correction_applied": prediction.correction_applied,
    });

    if let Some(obj) = body.as_object_mut() {
        if let Some(properties) = &prediction.properties {
            obj.insert("properties".to_string(), json!(properties));
        }
        if let Some(uncertainties) = &prediction.property_uncertainties {
            obj.insert("property_uncertainties".to_string(), json!(uncertainties));
        }
        if let Some(original) = prediction.original_classification {
            obj.insert("original_classification".to_string(), json!(original.as_str()));
        }
    }
    body
}

/// Classify one observation; also served as `/analyze`
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(body) = payload?;
    let observation = Observation::from_json(&body)?;

    let prediction = state.system.predict(&observation)?;
    info!(
        classification = %prediction.result.label,
        confidence = prediction.result.confidence,
        correction_applied = prediction.correction_applied,
        "Prediction served"
    );

    Ok(Json(prediction_body(&prediction)))
}

#[derive(Debug, Deserialize)]
pub struct BatchPredictRequest {
    observations: Vec<Value>,
}

fn batch_error(index: usize, message: String) -> Value {
    json!({
        "index": index,
        "status": "error",
        "error": message,
    })
}

fn batch_success(index: usize, prediction: &Prediction) -> Value {
    let mut item = Map::new();
    item.insert("index".to_string(), json!(index));
    item.insert("status".to_string(), json!("success"));
    item.insert("classification".to_string(), json!(prediction.result.label.as_str()));
    item.insert("confidence".to_string(), json!(prediction.result.confidence));
    if let Some(properties) = &prediction.properties {
        item.insert("properties".to_string(), json!(properties));
    }
    Value::Object(item)
}

/// Classify a list of observations; invalid items fail individually
pub async fn predict_batch(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<BatchPredictRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = payload?;
    let total = request.observations.len();

    let parsed: Vec<std::result::Result<Observation, String>> = request
        .observations
        .iter()
        .map(|item| Observation::from_json(item).map_err(|e| e.to_string()))
        .collect();
    let valid: Vec<Observation> = parsed.iter().filter_map(|p| p.as_ref().ok().copied()).collect();

    let predictions = if valid.is_empty() {
        Ok(Vec::new())
    } else {
        state.system.predict_batch(&valid)
    };
    let mut predictions = match predictions {
        Ok(predictions) => Some(predictions.into_iter()),
        Err(e) => {
            error!(error = %e, rows = valid.len(), "Batch prediction failed");
            None
        }
    };

    let results: Vec<Value> = parsed
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Err(message) => batch_error(index, message),
            Ok(_) => match predictions.as_mut().and_then(|it| it.next()) {
                Some(prediction) => batch_success(index, &prediction),
                None => batch_error(index, "Prediction failed".to_string()),
            },
        })
        .collect();

    debug!(total, valid = valid.len(), "Batch processed");
    Ok(Json(json!({
        "status": "success",
        "total": total,
        "results": results,
    })))
}
