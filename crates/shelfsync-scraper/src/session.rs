//! Region-bound credentials.

use shelfsync_core::RegionId;

use crate::cookies::{cookie_header, find_set_cookie};
use crate::error::SessionError;
use crate::transport::TransportResponse;

/// Cookie carrying the server-side session id.
pub const SESSION_COOKIE: &str = "ASP.NET_SessionId";
/// Cookie binding the session to the selected region.
pub const REGION_COOKIE: &str = "aga";

/// An immutable credential pair bound to exactly one region.
///
/// Sessions are created per region per sync pass and dropped when that
/// region's work ends. They are deliberately not `Clone`: a session can only
/// be lent to operations for the region it was acquired for.
pub struct Session {
    region_id: RegionId,
    session_token: String,
    region_token: String,
    address: Option<String>,
}

impl Session {
    /// Extracts both tokens from a select-region response.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingToken`] naming the first absent cookie.
    pub fn from_response(
        region_id: RegionId,
        response: &TransportResponse,
        address: Option<String>,
    ) -> Result<Self, SessionError> {
        let headers = || response.set_cookies.iter().map(String::as_str);

        let session_token =
            find_set_cookie(headers(), SESSION_COOKIE).ok_or(SessionError::MissingToken {
                region_id,
                cookie: SESSION_COOKIE,
            })?;
        let region_token =
            find_set_cookie(headers(), REGION_COOKIE).ok_or(SessionError::MissingToken {
                region_id,
                cookie: REGION_COOKIE,
            })?;

        Ok(Self {
            region_id,
            session_token,
            region_token,
            address,
        })
    }

    #[must_use]
    pub fn region_id(&self) -> RegionId {
        self.region_id
    }

    /// Address the retailer echoed back when the region was selected.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// `Cookie` header value presenting this session.
    #[must_use]
    pub fn cookie_header(&self) -> String {
        cookie_header(&[
            (SESSION_COOKIE, &self.session_token),
            (REGION_COOKIE, &self.region_token),
        ])
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("region_id", &self.region_id)
            .field("session_token", &"[redacted]")
            .field("region_token", &"[redacted]")
            .field("address", &self.address)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(set_cookies: &[&str]) -> TransportResponse {
        TransportResponse {
            url: "https://retailer.test/api/v1/fulfilment/my/pickup-addresses".to_owned(),
            set_cookies: set_cookies.iter().map(|s| (*s).to_owned()).collect(),
            body: Vec::new(),
        }
    }

    #[test]
    fn both_tokens_present_yields_session() {
        let resp = response(&["ASP.NET_SessionId=s-1; path=/", "aga=r-1; path=/"]);
        let session = Session::from_response(RegionId(7), &resp, None).unwrap();
        assert_eq!(session.region_id(), RegionId(7));
        assert_eq!(session.cookie_header(), "ASP.NET_SessionId=s-1; aga=r-1");
    }

    #[test]
    fn missing_region_token_names_the_cookie() {
        let resp = response(&["ASP.NET_SessionId=s-1; path=/"]);
        let err = Session::from_response(RegionId(7), &resp, None).unwrap_err();
        assert!(matches!(
            err,
            SessionError::MissingToken {
                cookie: REGION_COOKIE,
                region_id: RegionId(7)
            }
        ));
    }

    #[test]
    fn missing_session_token_names_the_cookie() {
        let resp = response(&["aga=r-1"]);
        let err = Session::from_response(RegionId(3), &resp, None).unwrap_err();
        assert!(err.to_string().contains(SESSION_COOKIE));
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let resp = response(&["ASP.NET_SessionId=secret-s", "aga=secret-r"]);
        let session =
            Session::from_response(RegionId(1), &resp, Some("1 Queen St".into())).unwrap();
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-s"));
        assert!(!rendered.contains("secret-r"));
        assert!(rendered.contains("1 Queen St"));
    }
}
