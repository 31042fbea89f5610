use crate::error::MergeError;
use common::model::merge::{MergeRequest, MergeState};

/// Moves a merge request to `to` if the lifecycle allows it.
///
/// Allowed moves: `Proposed` to `Confirmed` or `Rejected`; `Confirmed` to
/// `Applied`, `Rejected`, or back to `Proposed` when applying failed.
///
/// Confirming needs a served preview. Going back to `Proposed` clears it, since
/// the operator has to fix the data and look again.
pub fn transition(request: &mut MergeRequest, to: MergeState) -> Result<(), MergeError> {
    use MergeState::*;

    if (request.state, to) == (Proposed, Confirmed) && !request.previewed {
        return Err(MergeError::NotPreviewed);
    }

    let allowed = matches!(
        (request.state, to),
        (Proposed, Confirmed)
            | (Proposed, Rejected)
            | (Confirmed, Applied)
            | (Confirmed, Rejected)
            | (Confirmed, Proposed)
    );
    if !allowed {
        return Err(MergeError::InvalidTransition {
            from: request.state,
            to,
        });
    }
    request.state = to;
    if to == Proposed {
        request.previewed = false;
    }
    Ok(())
}
