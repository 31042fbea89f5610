use crate::config::Config;
use crate::db::Database;
use crate::error::ServiceError;
use crate::pending_controller::state::{new_token, PendingState, PendingUpload};
use crate::services::bulk_add::parse::{parse_upload, DEFAULT_CHARSET};
use crate::services::bulk_add::review::revalidate;
use crate::services::bulk_add::validate::{verify_candidates, ValidationRules};
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use common::model::bulk::BulkBatch;
use futures_util::StreamExt;
use log::info;
use md5::Context;

/// Raw upload as read from the multipart body.
struct Upload {
    bytes: Vec<u8>,
    charset: String,
    digest: String,
}

/// HTTP handler wrapper that converts the internal result to an `HttpResponse`.
///
/// - On success: returns `200 OK` with the validated batch.
/// - On failure: `400 Bad Request` for unreadable uploads, `500` for store errors.
pub async fn process(
    payload: Multipart,
    pending: web::Data<PendingState>,
    db: web::Data<Database>,
    rules: web::Data<ValidationRules>,
    config: web::Data<Config>,
) -> impl Responder {
    match upload_candidates(payload, &pending, &db, &rules, config.max_upload_bytes).await {
        Ok(batch) => HttpResponse::Ok().json(batch),
        Err(e) => e.to_response(),
    }
}

fn bad_request(msg: impl ToString) -> ServiceError {
    ServiceError::BadRequest(msg.to_string())
}

/// Reads the `file` and optional `charset` parts, hashing the file as it streams.
async fn read_upload(mut payload: Multipart, limit: usize) -> Result<Upload, ServiceError> {
    let mut bytes: Option<Vec<u8>> = None;
    let mut charset: Option<String> = None;
    let mut md5_hasher = Context::new();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(bad_request)?;
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));

        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename().map(|f| f.to_string()))
                    .unwrap_or_default();
                if !filename.to_ascii_lowercase().ends_with(".csv") {
                    return Err(bad_request("The file must end with .csv"));
                }

                let mut buf = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk = chunk.map_err(bad_request)?;
                    if buf.len() + chunk.len() > limit {
                        return Err(bad_request(format!(
                            "The file exceeds the upload limit of {} bytes",
                            limit
                        )));
                    }
                    md5_hasher.consume(&chunk);
                    buf.extend_from_slice(&chunk);
                }
                bytes = Some(buf);
            }

            Some("charset") => {
                let mut value = Vec::new();
                while let Some(chunk) = field.next().await {
                    value.extend_from_slice(&chunk.map_err(bad_request)?);
                }
                let value = String::from_utf8_lossy(&value).trim().to_string();
                if !value.is_empty() {
                    charset = Some(value);
                }
            }

            _ => {}
        }
    }

    let bytes = bytes.ok_or_else(|| bad_request("Missing file"))?;
    Ok(Upload {
        bytes,
        charset: charset.unwrap_or_else(|| DEFAULT_CHARSET.to_string()),
        digest: format!("{:x}", md5_hasher.finalize()),
    })
}

/// Parses and validates an uploaded CSV and parks it as a pending batch.
async fn upload_candidates(
    payload: Multipart,
    pending: &PendingState,
    db: &Database,
    rules: &ValidationRules,
    limit: usize,
) -> Result<BulkBatch, ServiceError> {
    let upload = read_upload(payload, limit).await?;

    if let Some((token, existing)) = pending
        .uploads
        .find(|u| u.digest == upload.digest)
        .await
    {
        info!("Upload {} matches pending batch {}", upload.digest, token);
        return revalidate(pending, db, rules, token, existing).await;
    }

    let Upload {
        bytes,
        charset,
        digest,
    } = upload;
    let db = db.clone();
    let rules = rules.clone();
    let (records, any_errors) = tokio::task::spawn_blocking(move || {
        let mut records = parse_upload(&bytes, &charset)?;
        let conn = db.open()?;
        let any_errors = verify_candidates(&conn, &rules, &mut records)?;
        Ok::<_, ServiceError>((records, any_errors))
    })
    .await??;

    if records.is_empty() {
        return Err(bad_request("The uploaded file contains no people"));
    }

    let token = new_token();
    info!(
        "Parsed {} candidate(s) into pending batch {} ({} with errors)",
        records.len(),
        token,
        records.iter().filter(|r| r.has_errors()).count()
    );
    pending
        .uploads
        .insert(
            token.clone(),
            PendingUpload {
                digest,
                records: records.clone(),
                revision: 0,
            },
        )
        .await;

    Ok(BulkBatch {
        token,
        records,
        any_errors,
    })
}
