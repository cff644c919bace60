//! HMAC-SHA256 request signing.

use crate::credentials::Credentials;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Request signer for authenticated venue calls.
///
/// The venue verifies a lowercase hex HMAC-SHA256 over the query string,
/// with parameters sorted lexicographically by key and the signature
/// itself appended as the final parameter.
pub struct Signer<'a> {
    credentials: &'a Credentials,
}

impl<'a> Signer<'a> {
    pub fn new(credentials: &'a Credentials) -> Self {
        Self { credentials }
    }

    /// Sign a message and return the hex-encoded signature.
    pub fn sign(&self, message: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.credentials.expose_secret().as_bytes())
            .expect("HMAC can take key of any size");

        mac.update(message.as_bytes());
        let result = mac.finalize();
        hex::encode(result.into_bytes())
    }

    /// Build a signed query string from parameters.
    ///
    /// Adds `timestamp` and `recvWindow`, sorts all parameters
    /// lexicographically by key, joins them as `key=value&...`, signs the
    /// result, and appends `&signature=...` last.
    pub fn signed_query(
        &self,
        params: &[(&str, &str)],
        timestamp_ms: i64,
        recv_window_ms: u64,
    ) -> String {
        let timestamp = timestamp_ms.to_string();
        let recv_window = recv_window_ms.to_string();

        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("timestamp", &timestamp));
        all_params.push(("recvWindow", &recv_window));
        all_params.sort_by(|a, b| a.0.cmp(b.0));

        let query_string = all_params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let signature = self.sign(&query_string);
        format!("{query_string}&signature={signature}")
    }
}
