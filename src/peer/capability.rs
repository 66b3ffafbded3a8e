//! Connectivity capability abstraction
//!
//! The session never talks to a WebRTC stack directly. It drives a
//! [`Connectivity`] handle and receives that handle's callbacks as
//! [`NegotiationEvent`](super::events::NegotiationEvent)s.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::error::CapabilityError;
use crate::peer::events::NegotiationSender;
use crate::peer::types::{Candidate, Role, SessionDescription};

/// One peer connection's worth of transport machinery.
///
/// Implementations report local candidates, channel state changes, inbound
/// messages and fatal faults through the [`NegotiationSender`] they were
/// created with.
#[async_trait]
pub trait Connectivity: Send + Sync {
    /// Generate and apply the local offer.
    async fn create_local_offer(&self) -> Result<SessionDescription, CapabilityError>;

    /// Generate and apply the local answer. The remote offer must already be set.
    async fn create_local_answer(&self) -> Result<SessionDescription, CapabilityError>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), CapabilityError>;

    /// Only valid once a remote description has been set.
    async fn add_remote_candidate(&self, candidate: Candidate) -> Result<(), CapabilityError>;

    async fn send_bytes(&self, data: Bytes) -> Result<(), CapabilityError>;

    /// Release the underlying connection. Further calls may fail.
    async fn close(&self);
}

/// Creates a fresh [`Connectivity`] handle per session.
#[async_trait]
pub trait ConnectivityFactory: Send + Sync {
    async fn create(
        &self,
        role: Role,
        events: NegotiationSender,
    ) -> Result<Arc<dyn Connectivity>, CapabilityError>;
}

#[async_trait]
impl<T: ConnectivityFactory + ?Sized> ConnectivityFactory for Arc<T> {
    async fn create(
        &self,
        role: Role,
        events: NegotiationSender,
    ) -> Result<Arc<dyn Connectivity>, CapabilityError> {
        (**self).create(role, events).await
    }
}
