//! Odds and ends: user reports.

use crate::error::DispatchResult;
use crate::state::{ConnId, Core};
use drift_proto::{ReportUserPayload, ServerEvent};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// `report-user`: logged for operator review; no further server-side
/// state machine exists today.
pub fn report_user(core: &Arc<Core>, conn_id: ConnId, payload: ReportUserPayload) -> DispatchResult {
    let session = core.session_for(conn_id)?;
    let report_id = Uuid::new_v4().to_string();

    info!(
        report = %report_id,
        reporter = %session.session_id,
        reported = %payload.reported_user_id,
        reason = %payload.reason,
        "User report filed"
    );

    core.send_to(
        conn_id,
        ServerEvent::ReportSubmitted {
            success: true,
            report_id,
            message: "Report submitted. Thank you for keeping chats safe.".to_string(),
        },
    );
    Ok(())
}
