use axum::{extract::Extension, Json};
use serde_json::{json, Value};

use crate::middleware::{CurrentUser, Identity, MaybeUser};

pub async fn me(Extension(CurrentUser(identity)): Extension<CurrentUser>) -> Json<Identity> {
    Json(identity)
}

pub async fn whoami(Extension(MaybeUser(identity)): Extension<MaybeUser>) -> Json<Value> {
    match identity {
        Some(identity) => Json(json!({ "authenticated": true, "user": identity })),
        None => Json(json!({ "authenticated": false })),
    }
}
