use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};

use super::ProtocolGateway;
use crate::network::{AckResponse, ActionKind};

/// `POST /{action}` for the six provider-side protocol actions.
pub fn protocol_router(gateway: Arc<ProtocolGateway>) -> Router {
    let mut router = Router::new();
    for kind in ActionKind::ALL {
        let path = format!("/{}", kind.as_str());
        router = router.route(
            &path,
            post(move |state: State<Arc<ProtocolGateway>>, body: Bytes| {
                action_handler(state, kind, body)
            }),
        );
    }
    router.with_state(gateway)
}

async fn action_handler(
    State(gateway): State<Arc<ProtocolGateway>>,
    kind: ActionKind,
    body: Bytes,
) -> Response {
    match gateway.acknowledge(kind, &body) {
        Ok(_) => AckResponse::ack().into_response(),
        Err(nack) => nack.into_response(),
    }
}
