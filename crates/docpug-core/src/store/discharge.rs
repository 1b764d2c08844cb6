//! Saving a discharge form back to the local record and the visit.

use tracing::info;

use super::{StoreResult, VisitStore};
use crate::db::Database;
use crate::export::{build_rx_combined, build_visit_note};
use crate::models::{non_blank, DischargeForm, DischargeRecord, Visit};

/// Save a discharge form.
///
/// The form becomes the local override record for the visit, then the
/// visit's note and prescription are rebuilt from it and pushed. Line
/// arrays are carried forward untouched.
pub fn save_discharge(
    visits: &mut VisitStore,
    db: &Database,
    visit_id: &str,
    form: &DischargeForm,
) -> StoreResult<(DischargeRecord, Visit)> {
    let record = DischargeRecord::from_form(visit_id, form);
    db.upsert_discharge(&record)?;

    let form = form.trimmed();
    let mut visit = visits.fetch(visit_id)?;
    visit.note = build_visit_note(&form.diagnosis, &form.complaint);
    visit.rx = build_rx_combined(&form.rx, &form.recommendations, &form.follow_up);
    visit.diagnosis = non_blank(&form.diagnosis);
    visit.complaint = non_blank(&form.complaint);

    let updated = visits.save(&visit)?;
    info!(visit_id, "discharge saved");
    Ok((record, updated))
}
