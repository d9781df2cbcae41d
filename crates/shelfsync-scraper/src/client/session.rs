use serde_json::json;
use shelfsync_core::RegionId;

use crate::error::SessionError;
use crate::session::Session;
use crate::transport::{Transport, TransportRequest};
use crate::types::SelectRegionResponse;

use super::RetailerClient;

impl<T: Transport> RetailerClient<T> {
    /// Selects `region_id` on a fresh server-side session and returns the
    /// resulting credentials.
    ///
    /// Performs exactly one state-changing call. Retries of that call, if
    /// any, are the transport's concern; this method never re-issues it.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Transport`] if the select-region call fails.
    /// - [`SessionError::MissingToken`] if either credential cookie is absent.
    pub async fn acquire_session(&self, region_id: RegionId) -> Result<Session, SessionError> {
        let url = self.endpoint("/api/v1/fulfilment/my/pickup-addresses");
        let request =
            Self::api_request(TransportRequest::put_json(url, json!({ "addressId": region_id.0 })));

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|source| SessionError::Transport { region_id, source })?;

        // The echoed address is informational only; an unexpected body shape
        // does not invalidate the credentials.
        let address = match response.json::<SelectRegionResponse>("select region") {
            Ok(body) => body.address(),
            Err(e) => {
                tracing::debug!(%region_id, error = %e, "select-region body not parsed");
                None
            }
        };

        let session = Session::from_response(region_id, &response, address)?;
        tracing::debug!(%region_id, address = ?session.address(), "region session acquired");
        Ok(session)
    }
}
