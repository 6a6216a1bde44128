// SPDX-License-Identifier: Apache-2.0

//! Read/write access to the ten boolean control flags and two integer
//! control variables.
//!
//! - GET/PUT `/swap/flags/:name`
//! - GET/PUT `/swap/vars/:name`

use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use rswap_config::{ControlFlag, ControlVar};
use serde::{Deserialize, Serialize};

/// All the routes for flag/variable access.
pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/swap/flags/{name}", get(get_flag).put(put_flag))
        .route("/swap/vars/{name}", get(get_var).put(put_var))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FlagResponse {
    name: &'static str,
    value: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VarResponse {
    name: &'static str,
    value: u32,
}

#[derive(Deserialize)]
struct FlagUpdate {
    value: bool,
}

#[derive(Deserialize)]
struct VarUpdate {
    value: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotFoundResponse {
    error: String,
}

fn not_found(name: &str) -> (StatusCode, Json<NotFoundResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            error: format!("unknown control entry '{name}'"),
        }),
    )
}

async fn get_flag(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<FlagResponse>, (StatusCode, Json<NotFoundResponse>)> {
    let flag = ControlFlag::by_name(&name).ok_or_else(|| not_found(&name))?;
    Ok(Json(FlagResponse {
        name: flag.name(),
        value: state.control.flag(flag),
    }))
}

async fn put_flag(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(update): Json<FlagUpdate>,
) -> Result<Json<FlagResponse>, (StatusCode, Json<NotFoundResponse>)> {
    let flag = ControlFlag::by_name(&name).ok_or_else(|| not_found(&name))?;
    state.control.set_flag(flag, update.value);
    Ok(Json(FlagResponse {
        name: flag.name(),
        value: update.value,
    }))
}

async fn get_var(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<VarResponse>, (StatusCode, Json<NotFoundResponse>)> {
    let var = ControlVar::by_name(&name).ok_or_else(|| not_found(&name))?;
    Ok(Json(VarResponse {
        name: var.name(),
        value: state.control.var(var),
    }))
}

async fn put_var(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(update): Json<VarUpdate>,
) -> Result<Json<VarResponse>, (StatusCode, Json<NotFoundResponse>)> {
    let var = ControlVar::by_name(&name).ok_or_else(|| not_found(&name))?;
    state.control.set_var(var, update.value);
    Ok(Json(VarResponse {
        name: var.name(),
        value: state.control.var(var),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ReadinessProbe;

    struct AlwaysReady;
    impl ReadinessProbe for AlwaysReady {
        fn is_ready(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn round_trips_a_known_flag() {
        let state = AppState::for_test(std::sync::Arc::new(AlwaysReady));
        let Json(resp) = get_flag(State(state.clone()), Path("apt_reclaim".into()))
            .await
            .unwrap();
        assert!(!resp.value);

        let Json(resp) = put_flag(
            State(state.clone()),
            Path("apt_reclaim".into()),
            Json(FlagUpdate { value: true }),
        )
        .await
        .unwrap();
        assert!(resp.value);

        let Json(resp) = get_flag(State(state), Path("apt_reclaim".into()))
            .await
            .unwrap();
        assert!(resp.value);
    }

    #[tokio::test]
    async fn unknown_flag_name_is_not_found() {
        let state = AppState::for_test(std::sync::Arc::new(AlwaysReady));
        let err = get_flag(State(state), Path("not_a_flag".into()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn variable_updates_are_clamped() {
        let state = AppState::for_test(std::sync::Arc::new(AlwaysReady));
        let Json(resp) = put_var(
            State(state),
            Path("sthd_cnt".into()),
            Json(VarUpdate { value: 9999 }),
        )
        .await
        .unwrap();
        assert_eq!(resp.value, 32);
    }
}
