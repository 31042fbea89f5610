//! Shows a pending upload and applies the operator's edits.
//!
//! Both handlers re-run validation against the current store contents, so the
//! operator always sees errors as they stand now rather than as they stood at
//! upload time.

use crate::db::Database;
use crate::error::ServiceError;
use crate::pending_controller::state::{PendingState, PendingUpload};
use crate::services::bulk_add::validate::{verify_candidates, ValidationRules};
use actix_web::{web, HttpResponse, Responder};
use common::model::bulk::BulkBatch;
use common::model::candidate::CandidateRecord;
use common::requests::UpdateRecordsRequest;

/// Validates `upload` on the blocking pool, stores the result under `token`
/// and returns it as a batch.
///
/// The store is only written if it still holds the revision `upload` was read
/// at. Otherwise the batch changed meanwhile (committed or edited) and the
/// result is discarded as stale.
pub(super) async fn revalidate(
    pending: &PendingState,
    db: &Database,
    rules: &ValidationRules,
    token: String,
    upload: PendingUpload,
) -> Result<BulkBatch, ServiceError> {
    let db = db.clone();
    let rules = rules.clone();
    let PendingUpload {
        mut records,
        revision,
        ..
    } = upload;

    let (records, any_errors) = tokio::task::spawn_blocking(move || {
        let conn = db.open()?;
        let any_errors = verify_candidates(&conn, &rules, &mut records)?;
        Ok::<_, ServiceError>((records, any_errors))
    })
    .await??;

    let stored = pending
        .uploads
        .update(&token, |current| {
            if current.revision != revision {
                return false;
            }
            current.records = records.clone();
            current.revision += 1;
            true
        })
        .await;
    match stored {
        Some(true) => Ok(BulkBatch {
            token,
            records,
            any_errors,
        }),
        Some(false) => Err(ServiceError::StaleBatch(token)),
        None => Err(ServiceError::UnknownToken(token)),
    }
}

pub(crate) async fn show(
    token: web::Path<String>,
    pending: web::Data<PendingState>,
    db: web::Data<Database>,
    rules: web::Data<ValidationRules>,
) -> impl Responder {
    let token = token.into_inner();
    let result = match pending.uploads.get(&token).await {
        Some(upload) => revalidate(&pending, &db, &rules, token, upload).await,
        None => Err(ServiceError::UnknownToken(token)),
    };
    match result {
        Ok(batch) => HttpResponse::Ok().json(batch),
        Err(e) => e.to_response(),
    }
}

pub(crate) async fn update(
    token: web::Path<String>,
    payload: web::Json<UpdateRecordsRequest>,
    pending: web::Data<PendingState>,
    db: web::Data<Database>,
    rules: web::Data<ValidationRules>,
) -> impl Responder {
    match update_records(token.into_inner(), payload.into_inner(), &pending, &db, &rules).await {
        Ok(batch) => HttpResponse::Ok().json(batch),
        Err(e) => e.to_response(),
    }
}

async fn update_records(
    token: String,
    payload: UpdateRecordsRequest,
    pending: &PendingState,
    db: &Database,
    rules: &ValidationRules,
) -> Result<BulkBatch, ServiceError> {
    let existing = pending
        .uploads
        .get(&token)
        .await
        .ok_or_else(|| ServiceError::UnknownToken(token.clone()))?;
    if payload.records.is_empty() {
        return Err(ServiceError::BadRequest(
            "An upload must keep at least one record; cancel it instead".to_string(),
        ));
    }

    let records: Vec<CandidateRecord> = payload.records.into_iter().map(Into::into).collect();
    let upload = PendingUpload {
        records,
        ..existing
    };
    revalidate(pending, db, rules, token, upload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestContext;

    fn candidate(personal: &str, email: &str) -> CandidateRecord {
        CandidateRecord {
            personal: personal.to_string(),
            family: "Doe".to_string(),
            email: Some(email.to_string()),
            ..Default::default()
        }
    }

    #[actix_web::test]
    async fn stale_validation_does_not_overwrite_newer_records() {
        let ctx = TestContext::new();
        let rules = ValidationRules::new().unwrap();
        let upload = PendingUpload {
            digest: "d".to_string(),
            records: vec![candidate("Jane", "jane@x.org"), candidate("John", "john@x.org")],
            revision: 0,
        };
        ctx.pending.uploads.insert("t".to_string(), upload).await;
        let stale = ctx.pending.uploads.get("t").await.unwrap();

        // a commit lands meanwhile and leaves only John pending
        ctx.pending
            .uploads
            .update("t", |current| {
                current.records.remove(0);
                current.revision += 1;
            })
            .await;

        let result = revalidate(&ctx.pending, &ctx.database, &rules, "t".to_string(), stale).await;
        assert!(matches!(result, Err(ServiceError::StaleBatch(_))));
        assert_eq!(ctx.pending.uploads.get("t").await.unwrap().records.len(), 1);

        let fresh = ctx.pending.uploads.get("t").await.unwrap();
        let batch = revalidate(&ctx.pending, &ctx.database, &rules, "t".to_string(), fresh)
            .await
            .unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].personal, "John");
        assert_eq!(ctx.pending.uploads.get("t").await.unwrap().revision, 2);
    }
}
