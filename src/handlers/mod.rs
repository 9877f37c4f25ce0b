//! Event dispatch: the single entry point for inbound client events.
//!
//! The connection reader decodes a frame and hands it here; dispatch
//! routes to the owning component. Handler errors are caught at this
//! boundary and surfaced to the originator only - they never kill the
//! dispatcher or leak to the partner.

mod join;
mod misc;
mod queue;

use crate::error::DispatchResult;
use crate::heartbeat;
use crate::relay::{chat, signaling};
use crate::state::{ConnId, Core};
use drift_proto::ClientEvent;
use std::sync::Arc;
use tracing::debug;

/// Route one inbound event to its handler.
pub async fn dispatch(core: &Arc<Core>, conn_id: ConnId, event: ClientEvent) -> DispatchResult {
    match event {
        ClientEvent::UserJoin(payload) => join::user_join(core, conn_id, payload).await,
        ClientEvent::JoinQueue(payload) => queue::join_queue(core, conn_id, payload).await,
        ClientEvent::LeaveQueue => queue::leave_queue(core, conn_id),
        ClientEvent::SkipUser => queue::skip_user(core, conn_id).await,
        ClientEvent::SendMessage(payload) => chat::send_message(core, conn_id, payload).await,
        ClientEvent::GetMessages(payload) => chat::load_messages(core, conn_id, payload).await,
        ClientEvent::Typing => chat::set_typing(core, conn_id, true).await,
        ClientEvent::StopTyping => chat::set_typing(core, conn_id, false).await,
        ClientEvent::MarkMessagesRead => chat::mark_read(core, conn_id).await,
        ClientEvent::ReportUser(payload) => misc::report_user(core, conn_id, payload),
        ClientEvent::DisconnectChat => chat::leave_chat(core, conn_id).await,
        ClientEvent::WebrtcOffer { offer } => signaling::relay_offer(core, conn_id, offer),
        ClientEvent::WebrtcAnswer { answer } => signaling::relay_answer(core, conn_id, answer),
        ClientEvent::WebrtcIceCandidate { candidate } => {
            signaling::relay_ice_candidate(core, conn_id, candidate)
        }
        ClientEvent::Pong => {
            heartbeat::on_pong(core, conn_id);
            Ok(())
        }
    }
}

/// Handle a dispatch failure: log it and reply to the originator when the
/// error kind has a client-visible form.
pub fn report_error(core: &Arc<Core>, conn_id: ConnId, event_name: &str, error: &crate::error::DispatchError) {
    debug!(
        conn = %conn_id,
        event = event_name,
        code = error.error_code(),
        error = %error,
        "Handler error"
    );
    if let Some(reply) = error.to_event() {
        core.send_to(conn_id, reply);
    }
}
