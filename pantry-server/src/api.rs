//! HTTP content API.
//!
//! | Method   | Path        | Auth   | Effect                         |
//! |----------|-------------|--------|--------------------------------|
//! | `GET`    | `/`         | none   | JSON array of stored paths     |
//! | `GET`    | `/{*path}`  | none   | raw object body                |
//! | `PUT`    | `/{*path}`  | signed | store body (201 new, 200 else) |
//! | `DELETE` | `/{*path}`  | signed | remove object                  |

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use pantry_core::auth::{
    canonical_request, content_hash, HEADER_CONTENT_HASH, HEADER_PUBLIC_KEY, HEADER_SIGNATURE,
    HEADER_USER_ID,
};

use crate::store::{DataStore, PutOutcome};

type Rejection = (StatusCode, String);

/// Build the axum router with all endpoints.
pub(crate) fn build_router(store: Arc<dyn DataStore>) -> Router {
    Router::new()
        .route("/", get(list_handler))
        .route(
            "/{*path}",
            get(fetch_handler).put(store_handler).delete(delete_handler),
        )
        .with_state(store)
}

async fn list_handler(State(store): State<Arc<dyn DataStore>>) -> Json<Vec<String>> {
    Json(store.list())
}

async fn fetch_handler(
    State(store): State<Arc<dyn DataStore>>,
    Path(path): Path<String>,
) -> Result<Vec<u8>, Rejection> {
    store
        .get(&path)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("no object at /{path}")))
}

async fn store_handler(
    State(store): State<Arc<dyn DataStore>>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, Rejection> {
    let user = verify_signed(&headers, "PUT", &path, &body)?;
    let outcome = store.put(&path, body.to_vec());
    tracing::debug!(path = %path, user = %user, outcome = ?outcome, "stored object");
    Ok(match outcome {
        PutOutcome::Created => StatusCode::CREATED,
        PutOutcome::Updated | PutOutcome::Unchanged => StatusCode::OK,
    })
}

async fn delete_handler(
    State(store): State<Arc<dyn DataStore>>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, Rejection> {
    verify_signed(&headers, "DELETE", &path, &[])?;
    if store.delete(&path) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("no object at /{path}")))
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, Rejection> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized(format!("missing {name} header")))
}

fn unauthorized(message: String) -> Rejection {
    (StatusCode::UNAUTHORIZED, message)
}

/// Check identity, body hash and signature; returns the caller identity.
fn verify_signed(
    headers: &HeaderMap,
    method: &str,
    path: &str,
    body: &[u8],
) -> Result<String, Rejection> {
    let user = header(headers, HEADER_USER_ID)?;
    let claimed_hash = header(headers, HEADER_CONTENT_HASH)?;
    let actual_hash = content_hash(body);
    if claimed_hash != actual_hash {
        return Err((
            StatusCode::BAD_REQUEST,
            "content hash does not match body".to_string(),
        ));
    }

    let key_bytes: [u8; 32] = hex::decode(header(headers, HEADER_PUBLIC_KEY)?)
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| unauthorized("malformed public key".to_string()))?;
    let key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|_| unauthorized("malformed public key".to_string()))?;

    let sig_bytes: [u8; 64] = hex::decode(header(headers, HEADER_SIGNATURE)?)
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| unauthorized("malformed signature".to_string()))?;
    let signature = Signature::from_bytes(&sig_bytes);

    let canonical = canonical_request(method, &format!("/{path}"), &actual_hash);
    key.verify(canonical.as_bytes(), &signature)
        .map_err(|_| unauthorized(format!("bad signature for {user}")))?;
    Ok(user.to_string())
}
