//! Preview, confirmation and rejection of a pending merge request.

use crate::db::Database;
use crate::error::{MergeError, ServiceError};
use crate::pending_controller::state::PendingState;
use crate::services::merge::engine::{merge_persons, preview_merge};
use crate::services::merge::lifecycle::transition;
use actix_web::{web, HttpResponse, Responder};
use common::model::merge::{MergeApplied, MergeOutcome, MergeRequest, MergeReview, MergeState};
use log::{info, warn};

async fn load(pending: &PendingState, token: &str) -> Result<MergeRequest, ServiceError> {
    pending
        .merges
        .get(token)
        .await
        .ok_or_else(|| ServiceError::UnknownToken(token.to_string()))
}

/// Stores the request back, or drops it once it has reached a final state.
async fn settle(pending: &PendingState, token: &str, request: &MergeRequest) {
    if request.state.is_terminal() {
        pending.merges.remove(token).await;
    } else {
        pending.merges.replace(token, request.clone()).await;
    }
}

pub(crate) async fn preview(
    token: web::Path<String>,
    pending: web::Data<PendingState>,
    db: web::Data<Database>,
) -> impl Responder {
    match review_merge(&token, &pending, &db).await {
        Ok(review) => HttpResponse::Ok().json(review),
        Err(e) => e.to_response(),
    }
}

async fn review_merge(
    token: &str,
    pending: &PendingState,
    db: &Database,
) -> Result<MergeReview, ServiceError> {
    let request = load(pending, token).await?;
    let (source, target) = (request.source, request.target);
    let db = db.clone();

    let result = tokio::task::spawn_blocking(move || {
        let conn = db.open()?;
        Ok::<_, ServiceError>(preview_merge(&conn, source, target))
    })
    .await??;

    match result {
        Ok(preview) => {
            let request = pending
                .merges
                .update(token, |request| {
                    request.previewed = true;
                    request.clone()
                })
                .await
                .ok_or_else(|| ServiceError::UnknownToken(token.to_string()))?;
            Ok(MergeReview { request, preview })
        }
        Err(MergeError::SelfMerge) => {
            warn!("Dropping merge request {}: person {} with themselves", token, source);
            pending.merges.remove(token).await;
            Err(MergeError::SelfMerge.into())
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) async fn apply(
    token: web::Path<String>,
    pending: web::Data<PendingState>,
    db: web::Data<Database>,
) -> impl Responder {
    match apply_merge(&token, &pending, &db).await {
        Ok(applied) => HttpResponse::Ok().json(applied),
        Err(e) => e.to_response(),
    }
}

/// Confirms the request and runs the merge.
///
/// On success the request is `Applied` and leaves the pending store. A
/// self-merge rejects it. Any other failure returns it to `Proposed`.
async fn apply_merge(
    token: &str,
    pending: &PendingState,
    db: &Database,
) -> Result<MergeApplied, ServiceError> {
    // Claim the request: a concurrent confirmation finds it already confirmed.
    let mut request = pending
        .merges
        .update(token, |request| {
            transition(request, MergeState::Confirmed)?;
            Ok::<_, MergeError>(request.clone())
        })
        .await
        .ok_or_else(|| ServiceError::UnknownToken(token.to_string()))??;

    let (source, target) = (request.source, request.target);
    let db = db.clone();
    let result: Result<MergeOutcome, ServiceError> = match tokio::task::spawn_blocking(move || {
        let mut conn = db.open()?;
        Ok::<_, ServiceError>(merge_persons(&mut conn, source, target)?)
    })
    .await
    {
        Ok(result) => result,
        Err(join_err) => Err(join_err.into()),
    };

    match result {
        Ok(outcome) => {
            transition(&mut request, MergeState::Applied)?;
            settle(pending, token, &request).await;
            info!("Merge {} applied", token);
            Ok(MergeApplied { request, outcome })
        }
        Err(ServiceError::Merge(MergeError::SelfMerge)) => {
            transition(&mut request, MergeState::Rejected)?;
            settle(pending, token, &request).await;
            Err(MergeError::SelfMerge.into())
        }
        Err(e) => {
            warn!("Merge {} failed: {}", token, e);
            transition(&mut request, MergeState::Proposed)?;
            settle(pending, token, &request).await;
            Err(e)
        }
    }
}

pub(crate) async fn reject(
    token: web::Path<String>,
    pending: web::Data<PendingState>,
) -> impl Responder {
    match reject_merge(&token, &pending).await {
        Ok(request) => HttpResponse::Ok().json(request),
        Err(e) => e.to_response(),
    }
}

async fn reject_merge(token: &str, pending: &PendingState) -> Result<MergeRequest, ServiceError> {
    let request = pending
        .merges
        .update(token, |request| -> Result<MergeRequest, MergeError> {
            // a confirmed request is being applied right now
            if request.state == MergeState::Confirmed {
                return Err(MergeError::InvalidTransition {
                    from: request.state,
                    to: MergeState::Rejected,
                });
            }
            transition(request, MergeState::Rejected)?;
            Ok(request.clone())
        })
        .await
        .ok_or_else(|| ServiceError::UnknownToken(token.to_string()))??;
    settle(pending, token, &request).await;
    info!("Merge {} rejected", token);
    Ok(request)
}
