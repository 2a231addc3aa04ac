//! New-identity requests over the control port

use super::control::{ControlChannel, ControlConfig};
use crate::error::ControlChannelError;
use async_trait::async_trait;

/// Something that can ask the anonymizing network for a fresh identity
#[async_trait]
pub trait IdentityRotator: Send + Sync {
    async fn request_new_identity(&self) -> Result<(), ControlChannelError>;
}

/// Opens a fresh authenticated session per request, signals NEWNYM, quits
pub struct ControlPortRotator {
    config: ControlConfig,
}

impl ControlPortRotator {
    pub fn new(config: ControlConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl IdentityRotator for ControlPortRotator {
    async fn request_new_identity(&self) -> Result<(), ControlChannelError> {
        let mut channel = ControlChannel::connect(&self.config).await?;
        channel.signal_newnym().await?;
        channel.quit().await
    }
}
