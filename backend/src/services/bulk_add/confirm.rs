//! Preview, commit and cancellation of a pending upload.

use crate::db::Database;
use crate::error::ServiceError;
use crate::pending_controller::state::{PendingState, PendingUpload};
use crate::services::bulk_add::committer::{commit_candidates, preview_commit};
use crate::services::bulk_add::review::revalidate;
use crate::services::bulk_add::validate::{verify_candidates, ValidationRules};
use actix_web::{web, HttpResponse, Responder};
use common::model::bulk::{BulkBatch, CommitPreview, CommitResult};
use common::model::candidate::CandidateRecord;
use log::{info, warn};
use std::collections::HashSet;

pub(crate) async fn preview(
    token: web::Path<String>,
    pending: web::Data<PendingState>,
    db: web::Data<Database>,
    rules: web::Data<ValidationRules>,
) -> impl Responder {
    match preview_upload(token.into_inner(), &pending, &db, &rules).await {
        Ok(preview) => HttpResponse::Ok().json(preview),
        Err(e) => e.to_response(),
    }
}

async fn preview_upload(
    token: String,
    pending: &PendingState,
    db: &Database,
    rules: &ValidationRules,
) -> Result<CommitPreview, ServiceError> {
    let upload = pending
        .uploads
        .get(&token)
        .await
        .ok_or_else(|| ServiceError::UnknownToken(token.clone()))?;
    let batch = revalidate(pending, db, rules, token, upload).await?;
    Ok(preview_commit(&batch.records))
}

pub(crate) async fn commit(
    token: web::Path<String>,
    pending: web::Data<PendingState>,
    db: web::Data<Database>,
    rules: web::Data<ValidationRules>,
) -> impl Responder {
    match commit_upload(token.into_inner(), &pending, &db, &rules).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => e.to_response(),
    }
}

/// Re-validates and commits the batch, then keeps only the uncommitted
/// records pending, validated again against the updated store.
///
/// The batch leaves the pending store for the duration of the commit, so a
/// second confirmation or an edit arriving meanwhile sees an unknown token.
async fn commit_upload(
    token: String,
    pending: &PendingState,
    db: &Database,
    rules: &ValidationRules,
) -> Result<CommitResult, ServiceError> {
    let claimed = pending
        .uploads
        .remove(&token)
        .await
        .ok_or_else(|| ServiceError::UnknownToken(token.clone()))?;
    let records = claimed.records.clone();
    let db = db.clone();
    let rules = rules.clone();

    let committed = tokio::task::spawn_blocking(move || {
        let mut conn = db.open()?;
        let mut records = records;
        verify_candidates(&conn, &rules, &mut records)?;
        let outcome = commit_candidates(&mut conn, &records);

        let report = match &outcome {
            Ok(report) => report,
            Err(aborted) => &aborted.report,
        };
        let committed: HashSet<usize> = report.committed.iter().copied().collect();
        let mut remaining: Vec<CandidateRecord> = records
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !committed.contains(index))
            .map(|(_, record)| record)
            .collect();
        if let Err(e) = verify_candidates(&conn, &rules, &mut remaining) {
            warn!(
                "Could not re-validate {} uncommitted record(s): {}",
                remaining.len(),
                e
            );
        }
        Ok::<_, ServiceError>((remaining, outcome))
    })
    .await;

    let (remaining, outcome) = match committed {
        Ok(Ok(done)) => done,
        Ok(Err(e)) => {
            // failed before the first insert, the batch is still whole
            pending.uploads.insert(token, claimed).await;
            return Err(e);
        }
        Err(join_err) => return Err(join_err.into()),
    };

    if !remaining.is_empty() {
        let upload = PendingUpload {
            digest: claimed.digest,
            records: remaining.clone(),
            revision: claimed.revision + 1,
        };
        pending.uploads.insert(token.clone(), upload).await;
    }

    let report = outcome?;
    let remaining = if remaining.is_empty() {
        None
    } else {
        Some(BulkBatch {
            token,
            any_errors: remaining.iter().any(CandidateRecord::has_errors),
            records: remaining,
        })
    };
    Ok(CommitResult { report, remaining })
}

pub(crate) async fn cancel(
    token: web::Path<String>,
    pending: web::Data<PendingState>,
) -> impl Responder {
    let token = token.into_inner();
    match pending.uploads.remove(&token).await {
        Some(upload) => {
            info!(
                "Cancelled pending batch {} with {} record(s)",
                token,
                upload.records.len()
            );
            HttpResponse::NoContent().finish()
        }
        None => ServiceError::UnknownToken(token).to_response(),
    }
}
