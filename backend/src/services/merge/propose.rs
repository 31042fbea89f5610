use crate::pending_controller::state::{new_token, PendingState};
use actix_web::{web, HttpResponse, Responder};
use common::model::merge::{MergeRequest, MergeState};
use common::requests::ProposeMergeRequest;
use log::info;

/// Registers a merge proposal. The ids are not checked until the preview or
/// confirmation step.
pub(crate) async fn process(
    payload: web::Json<ProposeMergeRequest>,
    pending: web::Data<PendingState>,
) -> impl Responder {
    let ProposeMergeRequest { source, target } = payload.into_inner();
    let request = MergeRequest {
        token: new_token(),
        source,
        target,
        state: MergeState::Proposed,
        previewed: false,
    };
    pending
        .merges
        .insert(request.token.clone(), request.clone())
        .await;
    info!(
        "Proposed merge {} of person {} into {}",
        request.token, source, target
    );
    HttpResponse::Created().json(request)
}
