//! Backchannel authentication request storage.

use async_trait::async_trait;

use crate::ciba::{BackchannelAuthenticationRequest, CibaStatus};
use crate::error::OidcError;

/// Storage for CIBA backchannel authentication requests.
#[async_trait]
pub trait CibaRequestStorage: Send + Sync {
    /// Persists a new backchannel request.
    async fn create(&self, request: &BackchannelAuthenticationRequest) -> Result<(), OidcError>;

    /// Finds a request by `auth_req_id`.
    async fn find_by_id(
        &self,
        tenant_id: &str,
        auth_req_id: &str,
    ) -> Result<Option<BackchannelAuthenticationRequest>, OidcError>;

    /// Transitions the request status.
    ///
    /// Transitions are monotonic: once `Granted`, `Denied`, or `Consumed`,
    /// a request never returns to `Pending`. Backends reject regressions by
    /// ignoring them.
    async fn update_status(
        &self,
        tenant_id: &str,
        auth_req_id: &str,
        status: CibaStatus,
    ) -> Result<(), OidcError>;

    /// Atomically consumes a granted request for token issuance.
    ///
    /// Returns the request and moves it to `Consumed` only when it is in
    /// the `Granted` state; exactly one poll observes `Some`.
    async fn consume_granted(
        &self,
        tenant_id: &str,
        auth_req_id: &str,
    ) -> Result<Option<BackchannelAuthenticationRequest>, OidcError>;

    /// Finds pending requests addressed to an authentication device.
    async fn find_pending_by_device(
        &self,
        tenant_id: &str,
        device_id: &str,
    ) -> Result<Vec<BackchannelAuthenticationRequest>, OidcError>;
}
