//! # Gesture Catalog Endpoints
//!
//! Static instructional content for the practice alphabet, plus the worker
//! liveness probe. These sit outside the real-time path: the frontend loads
//! the catalog once and shows per-letter guidance next to the camera view.

use crate::error::AppError;
use crate::relay::registry::SessionRegistry;
use crate::worker::WorkerBridge;
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::sync::Arc;

/// Per-letter catalog entry: (letter, hand shape, difficulty, instruction,
/// practice tip).
const GESTURES: [(char, &str, &str, &str, &str); 26] = [
    ('A', "closed fist", "easy",
     "Make a fist with the thumb resting against the side of the index finger",
     "Keep the knuckles facing forward and the hand steady"),
    ('B', "flat palm", "easy",
     "Hold the fingers straight and together, thumb folded across the palm",
     "Keep the fingers pressed together and the palm facing out"),
    ('C', "curved hand", "medium",
     "Curve all fingers and the thumb into a C shape",
     "Imagine holding a small cup; keep the curve visible to the camera"),
    ('D', "pointing finger", "easy",
     "Point the index finger up while the other fingertips touch the thumb",
     "Keep the index finger vertical and the circle closed"),
    ('E', "folded fingers", "easy",
     "Fold the fingertips down to meet the thumb tucked across the palm",
     "Curl the fingers evenly; no fingertip should stick out"),
    ('F', "ok circle", "medium",
     "Touch the index fingertip to the thumb, keeping the other fingers up",
     "Spread the three raised fingers slightly apart"),
    ('G', "flat pointer", "medium",
     "Hold the index finger and thumb parallel, pointing sideways",
     "Keep the hand horizontal with the palm facing in"),
    ('H', "two flat fingers", "easy",
     "Extend the index and middle fingers together, pointing sideways",
     "Keep both fingers level and the remaining fingers tucked"),
    ('I', "little finger", "easy",
     "Raise only the little finger from a closed fist",
     "Hold the fist firm so the little finger stands out clearly"),
    ('J', "little finger sweep", "medium",
     "Raise the little finger and trace a J in the air",
     "Make the sweep small and smooth, ending toward the body"),
    ('K', "split fingers up", "easy",
     "Raise the index and middle fingers with the thumb between them",
     "Keep the thumb touching the middle finger's base"),
    ('L', "right angle", "easy",
     "Extend the index finger up and the thumb out to form an L",
     "Keep the angle square and the other fingers folded"),
    ('M', "three over thumb", "medium",
     "Fold three fingers over the thumb tucked against the palm",
     "Let the three fingertips hang just over the thumb"),
    ('N', "two over thumb", "easy",
     "Fold the index and middle fingers over the tucked thumb",
     "Keep the fold shallow so two fingers stay distinct"),
    ('O', "round hand", "medium",
     "Curve all fingers to meet the thumb in an O shape",
     "Keep the circle round; check it faces the camera"),
    ('P', "downward K", "medium",
     "Form a K and tip the hand to point the middle finger down",
     "Relax the wrist; the palm faces down"),
    ('Q', "downward G", "medium",
     "Form a G and point the index finger and thumb toward the floor",
     "Keep the hand low and the two fingers parallel"),
    ('R', "crossed fingers", "hard",
     "Cross the index and middle fingers, other fingers folded",
     "Press the crossed fingers together so the cross reads clearly"),
    ('S', "locked fist", "easy",
     "Make a fist with the thumb locked across the front of the fingers",
     "Squeeze the thumb tight over the middle of the fingers"),
    ('T', "thumb between", "easy",
     "Make a fist with the thumb tucked between the index and middle fingers",
     "Let just the tip of the thumb peek out"),
    ('U', "two fingers together", "easy",
     "Raise the index and middle fingers together, pointing up",
     "Keep the two fingers touching along their length"),
    ('V', "two fingers apart", "easy",
     "Raise the index and middle fingers in a V shape",
     "Spread only those two fingers; keep the rest folded"),
    ('W', "three fingers", "medium",
     "Raise the index, middle, and ring fingers spread apart",
     "Tuck the little finger under the thumb"),
    ('X', "hooked finger", "medium",
     "Bend the index finger into a hook from a closed fist",
     "Make the hook sharp; the fingertip points at yourself"),
    ('Y', "wide span", "easy",
     "Extend the thumb and little finger, folding the middle fingers",
     "Stretch the span wide like a phone shape"),
    ('Z', "index trace", "hard",
     "Trace a Z in the air with the index finger",
     "Keep the strokes crisp: across, diagonal, across"),
];

/// GET /api/gestures — the full practice catalog.
pub async fn list_gestures() -> HttpResponse {
    let gestures: Vec<_> = GESTURES
        .iter()
        .map(|(letter, name, difficulty, _, _)| {
            json!({
                "letter": letter,
                "name": name,
                "difficulty": difficulty
            })
        })
        .collect();

    HttpResponse::Ok().json(json!({
        "gestures": gestures,
        "total": GESTURES.len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// GET /api/gestures/{letter}/instructions — guidance for one letter.
pub async fn gesture_instructions(path: web::Path<String>) -> Result<HttpResponse, AppError> {
    let raw = path.into_inner();
    let letter = match raw.to_uppercase().chars().next() {
        Some(letter) if raw.chars().count() == 1 => letter,
        _ => {
            return Err(AppError::BadRequest(format!(
                "'{}' is not a single letter",
                raw
            )))
        }
    };

    let entry = GESTURES
        .iter()
        .find(|entry| entry.0 == letter)
        .ok_or_else(|| AppError::NotFound(format!("No instructions for '{}'", letter)))?;

    let (letter, name, difficulty, instruction, practice_tip) = *entry;
    Ok(HttpResponse::Ok().json(json!({
        "gesture": letter,
        "name": name,
        "difficulty": difficulty,
        "instruction": instruction,
        "practice_tip": practice_tip
    })))
}

/// GET /api/status — worker liveness and session counts.
pub async fn service_status(
    registry: web::Data<Arc<SessionRegistry>>,
    bridge: web::Data<Arc<WorkerBridge>>,
) -> HttpResponse {
    let sessions = registry.stats();
    let alive = bridge.is_alive().await;

    HttpResponse::Ok().json(json!({
        "worker": {
            "alive": alive,
            "busy": bridge.is_busy().await,
            "health": if alive { "healthy" } else { "unhealthy" }
        },
        "sessions": {
            "total": sessions.total_sessions,
            "recognizing": sessions.recognizing_sessions
        },
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coach::LETTERS;

    #[test]
    fn test_catalog_covers_alphabet() {
        assert_eq!(GESTURES.len(), LETTERS.len());
        for (i, (letter, name, difficulty, instruction, tip)) in GESTURES.iter().enumerate() {
            assert_eq!(*letter, LETTERS[i]);
            assert!(!name.is_empty());
            assert!(["easy", "medium", "hard"].contains(difficulty));
            assert!(!instruction.is_empty());
            assert!(!tip.is_empty());
        }
    }
}
