use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, PercentEncode};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use uuid::Uuid;

type HmacSha1 = Hmac<Sha1>;

// https://tools.ietf.org/html/rfc5849#section-3.6
// * ALPHA, DIGIT, '-', '.', '_', '~' MUST NOT be encoded.
// * All other characters MUST be encoded.
// * The two hexadecimal characters used to represent encoded
//   characters MUST be uppercase.
const PARAM_ENCODE_SET: &AsciiSet = &percent_encoding::NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

pub(crate) fn percent_encode(input: &str) -> PercentEncode<'_> {
    utf8_percent_encode(input, PARAM_ENCODE_SET)
}

/// Permanent token pair identifying a user who completed the authorization
/// flow. Callers persist it and hand it back to
/// [`Client::authorize`](crate::Client::authorize) on later runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserToken {
    pub token: String,
    pub secret: String,
}

impl UserToken {
    pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Self {
        UserToken {
            token: token.into(),
            secret: secret.into(),
        }
    }
}

/// Outcome of the first authorization step.
///
/// Send the user to `login_url`, then carry the temporary pair into
/// [`complete_authorization`](crate::Client::complete_authorization). The
/// client holds no state between the two steps.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub token: String,
    pub token_secret: String,
    pub login_url: String,
}

/// OAuth1 request signer.
///
/// Two-legged when no token pair is attached (consumer credentials only),
/// three-legged otherwise.
pub(crate) struct Signer<'a> {
    consumer_key: &'a str,
    consumer_secret: &'a str,
    token: Option<(&'a str, &'a str)>,
    version: Option<&'static str>,
}

impl<'a> Signer<'a> {
    pub fn two_legged(consumer_key: &'a str, consumer_secret: &'a str) -> Self {
        Signer {
            consumer_key,
            consumer_secret,
            token: None,
            version: Some(OAUTH_VERSION),
        }
    }

    pub fn three_legged(
        consumer_key: &'a str,
        consumer_secret: &'a str,
        token: &'a str,
        token_secret: &'a str,
    ) -> Self {
        Signer {
            consumer_key,
            consumer_secret,
            token: Some((token, token_secret)),
            version: Some(OAUTH_VERSION),
        }
    }

    /// Value for the `Authorization` header of one request.
    ///
    /// `endpoint` is the URL without its query; `encoded_query` carries the
    /// query pairs already percent-encoded, since they participate in the
    /// signature base string in that form.
    pub fn authorization(
        &self,
        http_method: &str,
        endpoint: &str,
        encoded_query: &[(String, String)],
    ) -> String {
        let nonce = Uuid::new_v4().to_string();
        let timestamp = Utc::now().timestamp();

        let mut fields = self.protocol_params(&nonce, timestamp);
        let signature = self.signature(http_method, endpoint, &fields, encoded_query);
        fields.push((
            "oauth_signature".to_string(),
            percent_encode(&signature).to_string(),
        ));
        fields.sort();

        let fields = fields
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, v))
            .collect::<Vec<String>>()
            .join(", ");
        format!("OAuth {}", fields)
    }

    /// The oauth_* protocol parameters, percent-encoded.
    fn protocol_params(&self, nonce: &str, timestamp: i64) -> Vec<(String, String)> {
        let timestamp = timestamp.to_string();
        let mut params = vec![
            (
                "oauth_consumer_key".to_string(),
                percent_encode(self.consumer_key).to_string(),
            ),
            (
                "oauth_signature_method".to_string(),
                percent_encode(SIGNATURE_METHOD).to_string(),
            ),
            (
                "oauth_timestamp".to_string(),
                percent_encode(&timestamp).to_string(),
            ),
            ("oauth_nonce".to_string(), percent_encode(nonce).to_string()),
        ];
        if let Some(version) = self.version {
            params.push(("oauth_version".to_string(), percent_encode(version).to_string()));
        }
        if let Some((token, _)) = self.token {
            params.push(("oauth_token".to_string(), percent_encode(token).to_string()));
        }
        params
    }

    fn signature(
        &self,
        http_method: &str,
        endpoint: &str,
        protocol_params: &[(String, String)],
        encoded_query: &[(String, String)],
    ) -> String {
        // join protocol and query parameters, then alphabetic sort
        let mut params: Vec<(&str, &str)> = protocol_params
            .iter()
            .chain(encoded_query.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        params.sort();

        // "realm" is a special parameter and never enters the base string
        let param_str = params
            .iter()
            .filter(|(k, _)| *k != "realm")
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<String>>()
            .join("&");

        let http_method = http_method.to_ascii_uppercase();
        let base_str = format!(
            "{}&{}&{}",
            percent_encode(&http_method),
            percent_encode(endpoint),
            percent_encode(&param_str)
        );

        let token_secret = self.token.map(|(_, secret)| secret).unwrap_or("");
        let sign_key = format!(
            "{}&{}",
            percent_encode(self.consumer_secret),
            percent_encode(token_secret)
        );

        // NOTE: HMAC-SHA1 accepts keys of any length, so this cannot fail.
        let mut mac =
            HmacSha1::new_from_slice(sign_key.as_bytes()).expect("HMAC-SHA1 takes any key length");
        mac.update(base_str.as_bytes());
        BASE64.encode(mac.finalize().into_bytes().as_slice())
    }
}
