//! One rotation cycle: new identity, then address probe

use super::events::{EventBus, RotationEvent};
use crate::error::ProbeErrorKind;
use crate::probe::{IdentityProbe, IdentityResult};
use crate::supervisor::ProcessSupervisor;
use crate::tor::IdentityRotator;
use std::sync::Arc;
use tracing::{error, info};

/// What a cycle needs; shared by every queued cycle
pub struct CycleContext {
    pub supervisor: Arc<ProcessSupervisor>,
    pub rotator: Arc<dyn IdentityRotator>,
    pub probe: Arc<IdentityProbe>,
    pub events: EventBus,
}

/// Request a new identity and publish the resulting address
///
/// A failed identity request skips the probe and publishes "unknown".
pub async fn run_cycle(ctx: Arc<CycleContext>) -> IdentityResult {
    let result = match ctx.rotator.request_new_identity().await {
        Ok(()) => {
            info!("New identity requested");
            ctx.probe.probe().await
        },
        Err(e) => {
            error!("Identity rotation failed: {}", e);
            ctx.events.publish(RotationEvent::RotationFailed {
                error: e.to_string(),
            });
            IdentityResult::not_probed(ProbeErrorKind::ControlChannel)
        },
    };

    ctx.supervisor.record_rotation(result.address.clone()).await;
    info!("Address after rotation: {}", result.display_address());
    ctx.events
        .publish(RotationEvent::AddressUpdated(result.clone()));
    result
}
