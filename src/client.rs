use std::collections::HashMap;
use std::fmt::Display;

use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::models::{Listing, ListingImage, ResultSet, Shop, User};
use crate::oauth::{PendingAuthorization, Signer, UserToken};
use crate::params::{parse_form, Params};

const PRODUCTION_URL: &str = "https://openapi.etsy.com/v2";
const SANDBOX_URL: &str = "https://sandbox.openapi.etsy.com/v2";

/// Path segment the remote API reserves for "the user who authorized this
/// request".
const SELF_SEGMENT: &str = "__SELF__";

/// Which deployment of the API a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Production,
    Sandbox,
}

impl Environment {
    fn base_url(&self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_URL,
            Environment::Sandbox => SANDBOX_URL,
        }
    }
}

/// Selects the user (or shop) an endpoint addresses.
///
/// `Me` is only accepted by [`Client<UserToken>`] methods; an app-only
/// client has no way to express it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// A login name, shop name, or numeric id.
    Id(String),
    /// The user who authorized this client.
    Me,
}

impl Selector {
    fn segment(&self) -> &str {
        match self {
            Selector::Id(id) => id,
            Selector::Me => SELF_SEGMENT,
        }
    }
}

impl From<&str> for Selector {
    fn from(id: &str) -> Self {
        Selector::Id(id.to_string())
    }
}

impl From<String> for Selector {
    fn from(id: String) -> Self {
        Selector::Id(id)
    }
}

impl From<u64> for Selector {
    fn from(id: u64) -> Self {
        Selector::Id(id.to_string())
    }
}

/// Color filter for active-listing queries.
#[derive(Debug, Clone)]
pub struct ColorFilter {
    color: String,
    accuracy: u8,
}

impl ColorFilter {
    /// `color` is an RGB (`#00FF00`) or HSV (`360;100;100`) value.
    pub fn new(color: impl Into<String>) -> Self {
        ColorFilter {
            color: color.into(),
            accuracy: 5,
        }
    }

    /// Widen or tighten the match tolerance (default 5).
    pub fn accuracy(mut self, accuracy: u8) -> Self {
        self.accuracy = accuracy;
        self
    }
}

#[derive(Debug, Clone)]
struct Consumer {
    key: String,
    secret: String,
}

/// The API client, parameterised by its authorization state.
///
/// `Client<()>` signs nothing and identifies itself through the `api_key`
/// query parameter. [`Client<UserToken>`] additionally holds a user token
/// pair and is the only variant exposing [`Selector::Me`] calls.
#[derive(Debug, Clone)]
pub struct Client<A> {
    consumer: Consumer,
    auth: A,
    base_url: String,
    http: HttpClient,
}

impl Client<()> {
    /// Production client from consumer credentials. Use
    /// [`ClientBuilder`] for the sandbox or a pre-obtained user token.
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Client {
            consumer: Consumer {
                key: consumer_key.into(),
                secret: consumer_secret.into(),
            },
            auth: (),
            base_url: PRODUCTION_URL.to_string(),
            http: HttpClient::new(),
        }
    }

    /// Attach a user token obtained through the authorization flow.
    pub fn authorize(self, token: UserToken) -> Client<UserToken> {
        Client {
            consumer: self.consumer,
            auth: token,
            base_url: self.base_url,
            http: self.http,
        }
    }

    /// Basic info about a user, by login name or numeric id.
    pub fn user(&self, user: impl Display) -> Result<ResultSet<User>> {
        self.get_json(&format!("/users/{}", user), self.key_params(), None)
    }

    /// The sellers a user has favorited.
    pub fn user_favorites(&self, user: impl Display) -> Result<ResultSet<User>> {
        self.get_json(
            &format!("/users/{}/favorites/users", user),
            self.key_params(),
            None,
        )
    }

    /// The shops owned by a user.
    pub fn user_shops(&self, user: impl Display) -> Result<ResultSet<Shop>> {
        self.get_json(&format!("/users/{}/shops", user), self.key_params(), None)
    }

    /// Active listings in a shop, by shop name or numeric id.
    pub fn shop_listings(&self, shop: impl Display) -> Result<ResultSet<Listing>> {
        self.get_json(
            &format!("/shops/{}/listings/active", shop),
            self.key_params(),
            None,
        )
    }
}

impl Client<UserToken> {
    /// The token pair this client was authorized with.
    pub fn token(&self) -> &UserToken {
        &self.auth
    }

    /// Basic info about a user. `Selector::Me` resolves to the authorizing
    /// user and switches the call to the three-legged signer.
    pub fn user(&self, who: impl Into<Selector>) -> Result<ResultSet<User>> {
        let who = who.into();
        self.scoped(format!("/users/{}", who.segment()), &who)
    }

    /// The sellers a user has favorited.
    pub fn user_favorites(&self, who: impl Into<Selector>) -> Result<ResultSet<User>> {
        let who = who.into();
        self.scoped(format!("/users/{}/favorites/users", who.segment()), &who)
    }

    /// The shops owned by a user.
    pub fn user_shops(&self, who: impl Into<Selector>) -> Result<ResultSet<Shop>> {
        let who = who.into();
        self.scoped(format!("/users/{}/shops", who.segment()), &who)
    }

    /// Active listings in a shop.
    pub fn shop_listings(&self, who: impl Into<Selector>) -> Result<ResultSet<Listing>> {
        let who = who.into();
        self.scoped(format!("/shops/{}/listings/active", who.segment()), &who)
    }

    fn scoped<R: DeserializeOwned>(&self, path: String, who: &Selector) -> Result<R> {
        match who {
            // the remote API prioritises API-key auth over OAuth, so the
            // key must be absent for user-level calls
            Selector::Me => {
                let signer = Signer::three_legged(
                    &self.consumer.key,
                    &self.consumer.secret,
                    &self.auth.token,
                    &self.auth.secret,
                );
                self.get_json(&path, self.scoped_params(who), Some(&signer))
            }
            Selector::Id(_) => self.get_json(&path, self.scoped_params(who), None),
        }
    }

    fn scoped_params(&self, who: &Selector) -> Params {
        match who {
            Selector::Me => Params::new(),
            Selector::Id(_) => self.key_params(),
        }
    }
}

impl<A> Client<A> {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// All active listings on the site, optionally filtered by color.
    pub fn active_listings(&self, color: Option<&ColorFilter>) -> Result<ResultSet<Listing>> {
        let mut params = self.key_params();
        if let Some(filter) = color {
            params.push("color", &filter.color);
            params.push("color_accuracy", filter.accuracy);
        }
        self.get_json("/listings/active", params, None)
    }

    /// A single listing. The path is pure string substitution, so numeric
    /// ids and string aliases behave identically.
    pub fn listing(&self, listing: impl Display) -> Result<ResultSet<Listing>> {
        self.get_json(&format!("/listings/{}", listing), self.key_params(), None)
    }

    /// Images attached to a listing.
    pub fn listing_images(&self, listing: impl Display) -> Result<ResultSet<ListingImage>> {
        self.get_json(
            &format!("/listings/{}/images", listing),
            self.key_params(),
            None,
        )
    }

    /// Search users by keyword.
    pub fn find_users(&self, keywords: &str) -> Result<ResultSet<User>> {
        let mut params = self.key_params();
        params.push("keywords", keywords);
        self.get_json("/users", params, None)
    }

    /// Step one of the authorization flow: fetch a temporary token pair
    /// and the login URL the end user must visit. The caller carries the
    /// pair into [`complete_authorization`](Self::complete_authorization).
    pub fn start_authorization(&self, permissions: &[&str]) -> Result<PendingAuthorization> {
        let mut params = Params::new();
        if !permissions.is_empty() {
            params.push("scope", permissions.join(" "));
        }
        let signer = Signer::two_legged(&self.consumer.key, &self.consumer.secret);
        let response = self.execute("/oauth/request_token", Method::GET, &params, Some(&signer))?;
        let body = response.text()?;
        let mut fields = parse_form(&body);
        Ok(PendingAuthorization {
            token: take(&mut fields, "oauth_token")?,
            token_secret: take(&mut fields, "oauth_token_secret")?,
            login_url: take(&mut fields, "login_url")?,
        })
    }

    /// Step two: exchange the verifier shown to the user for the permanent
    /// token pair. Persist the result and feed it to
    /// [`Client::authorize`] in future runs.
    pub fn complete_authorization(
        &self,
        verifier: &str,
        temp_token: &str,
        temp_token_secret: &str,
    ) -> Result<UserToken> {
        let mut params = Params::new();
        params.push("oauth_verifier", verifier);
        let signer = Signer::three_legged(
            &self.consumer.key,
            &self.consumer.secret,
            temp_token,
            temp_token_secret,
        );
        let response = self.execute("/oauth/access_token", Method::POST, &params, Some(&signer))?;
        let body = response.text()?;
        let mut fields = parse_form(&body);
        Ok(UserToken::new(
            take(&mut fields, "oauth_token")?,
            take(&mut fields, "oauth_token_secret")?,
        ))
    }

    fn key_params(&self) -> Params {
        let mut params = Params::new();
        params.push("api_key", &self.consumer.key);
        params
    }

    fn get_json<R: DeserializeOwned>(
        &self,
        path: &str,
        params: Params,
        signer: Option<&Signer>,
    ) -> Result<R> {
        let response = self.execute(path, Method::GET, &params, signer)?;
        response
            .json::<R>()
            .map_err(|e| Error::Decode(e.to_string()))
    }

    /// Shared dispatch: every endpoint method funnels through here.
    fn execute(
        &self,
        path: &str,
        method: Method,
        params: &Params,
        signer: Option<&Signer>,
    ) -> Result<Response> {
        let endpoint = format!("{}{}", self.base_url, path);
        let query = params.query_string();
        let url = if query.is_empty() {
            endpoint.clone()
        } else {
            format!("{}?{}", endpoint, query)
        };
        debug!(%url, method = %method, signed = signer.is_some(), "dispatching API request");

        let mut request = self.http.request(method.clone(), url.as_str());
        if let Some(signer) = signer {
            request = request.header(
                AUTHORIZATION,
                signer.authorization(method.as_str(), &endpoint, &params.encoded()),
            );
        }

        let response = request.send()?;
        let status = response.status().as_u16();
        if status > 201 {
            let body = response
                .text()
                .unwrap_or_else(|_| String::from("Unknown error"));
            error!(status, "API request failed");
            return Err(Error::from_status(status, body));
        }
        Ok(response)
    }
}

fn take(fields: &mut HashMap<String, String>, key: &str) -> Result<String> {
    fields
        .remove(key)
        .ok_or_else(|| Error::Decode(format!("token response missing {}", key)))
}

/// Optional-field construction, for credentials loaded from storage.
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    consumer_key: Option<String>,
    consumer_secret: Option<String>,
    user_token: Option<String>,
    user_token_secret: Option<String>,
    environment: Environment,
    base_url: Option<String>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        ClientBuilder::default()
    }

    pub fn consumer_key(mut self, key: impl Into<String>) -> Self {
        self.consumer_key = Some(key.into());
        self
    }

    pub fn consumer_secret(mut self, secret: impl Into<String>) -> Self {
        self.consumer_secret = Some(secret.into());
        self
    }

    pub fn user_token(mut self, token: impl Into<String>) -> Self {
        self.user_token = Some(token.into());
        self
    }

    pub fn user_token_secret(mut self, secret: impl Into<String>) -> Self {
        self.user_token_secret = Some(secret.into());
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Point the client somewhere other than the two fixed deployments.
    /// Takes precedence over [`environment`](Self::environment).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn build(self) -> Result<AnyClient> {
        let key = self
            .consumer_key
            .ok_or_else(|| Error::Config("consumer key must be provided".into()))?;
        let secret = self
            .consumer_secret
            .ok_or_else(|| Error::Config("consumer secret must be provided".into()))?;
        let base_url = self
            .base_url
            .unwrap_or_else(|| self.environment.base_url().to_string());

        let client = Client {
            consumer: Consumer { key, secret },
            auth: (),
            base_url,
            http: HttpClient::new(),
        };

        match (self.user_token, self.user_token_secret) {
            (None, None) => Ok(AnyClient::App(client)),
            (Some(token), Some(secret)) => {
                Ok(AnyClient::User(client.authorize(UserToken::new(token, secret))))
            }
            _ => Err(Error::Config(
                "user token and user token secret must be supplied together".into(),
            )),
        }
    }
}

/// What [`ClientBuilder::build`] produces: an app-only client, or one that
/// also carries a user token.
#[derive(Debug)]
pub enum AnyClient {
    App(Client<()>),
    User(Client<UserToken>),
}

impl AnyClient {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AnyClient::User(_))
    }

    pub fn into_authorized(self) -> Option<Client<UserToken>> {
        match self {
            AnyClient::User(client) => Some(client),
            AnyClient::App(_) => None,
        }
    }

    /// Drop any user token and keep the app-only capabilities.
    pub fn into_app(self) -> Client<()> {
        match self {
            AnyClient::App(client) => client,
            AnyClient::User(client) => Client {
                consumer: client.consumer,
                auth: (),
                base_url: client.base_url,
                http: client.http,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const LISTING_BODY: &str = r#"{
        "count": 1,
        "results": [{"listing_id": 42, "title": "hand thrown mug", "state": "active"}],
        "type": "Listing"
    }"#;

    const USER_BODY: &str = r#"{
        "count": 1,
        "results": [{"user_id": 7, "login_name": "bluflowr"}],
        "type": "User"
    }"#;

    fn app_client(server: &Server) -> Client<()> {
        let built = ClientBuilder::new()
            .consumer_key("ck")
            .consumer_secret("cs")
            .base_url(server.url())
            .build()
            .unwrap();
        match built {
            AnyClient::App(client) => client,
            AnyClient::User(_) => unreachable!(),
        }
    }

    fn user_client(server: &Server) -> Client<UserToken> {
        app_client(server).authorize(UserToken::new("utoken", "usecret"))
    }

    #[test]
    fn active_listings_send_the_api_key() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/listings/active")
            .match_query(Matcher::UrlEncoded("api_key".into(), "ck".into()))
            .with_status(200)
            .with_body(LISTING_BODY)
            .create();

        let page = app_client(&server).active_listings(None).unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.results[0].listing_id, 42);
        mock.assert();
    }

    #[test]
    fn color_filters_add_their_params() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/listings/active")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("api_key".into(), "ck".into()),
                Matcher::UrlEncoded("color".into(), "#00FF00".into()),
                Matcher::UrlEncoded("color_accuracy".into(), "15".into()),
            ]))
            .with_status(200)
            .with_body(LISTING_BODY)
            .create();

        let filter = ColorFilter::new("#00FF00").accuracy(15);
        app_client(&server).active_listings(Some(&filter)).unwrap();
        mock.assert();
    }

    #[test]
    fn created_status_counts_as_success() {
        let mut server = Server::new();
        server
            .mock("GET", "/listings/42")
            .match_query(Matcher::Any)
            .with_status(201)
            .with_body(LISTING_BODY)
            .create();

        assert!(app_client(&server).listing(42).is_ok());
    }

    #[test]
    fn accepted_status_is_past_the_success_boundary() {
        let mut server = Server::new();
        server
            .mock("GET", "/listings/42")
            .match_query(Matcher::Any)
            .with_status(202)
            .with_body("queued")
            .create();

        let err = app_client(&server).listing(42).unwrap_err();
        assert!(matches!(err, Error::Unexpected { status: 202, .. }));
    }

    #[test]
    fn remote_failures_split_by_status_class() {
        let mut server = Server::new();
        server
            .mock("GET", "/listings/404")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body("no such listing")
            .create();
        server
            .mock("GET", "/listings/500")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create();

        let client = app_client(&server);
        match client.listing(404).unwrap_err() {
            Error::Client { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "no such listing");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            client.listing(500).unwrap_err(),
            Error::Server { status: 500, .. }
        ));
    }

    #[test]
    fn listing_lookup_is_identical_for_numeric_and_string_ids() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/listings/42")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(LISTING_BODY)
            .expect(2)
            .create();

        let client = app_client(&server);
        let by_number = client.listing(42).unwrap();
        let by_string = client.listing("42").unwrap();
        assert_eq!(
            by_number.results[0].listing_id,
            by_string.results[0].listing_id
        );
        mock.assert();
    }

    #[test]
    fn self_lookup_selects_the_user_signer() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/users/__SELF__")
            .match_query(Matcher::Any)
            .match_header(
                "authorization",
                Matcher::Regex(r#"oauth_token="utoken""#.to_string()),
            )
            .with_status(200)
            .with_body(USER_BODY)
            .create();

        let page = user_client(&server).user(Selector::Me).unwrap();
        assert_eq!(page.results[0].user_id, 7);
        mock.assert();
    }

    #[test]
    fn self_lookups_omit_the_api_key() {
        let server = Server::new();
        let client = user_client(&server);
        assert!(!client.scoped_params(&Selector::Me).contains("api_key"));
        assert!(client
            .scoped_params(&Selector::Id("bluflowr".into()))
            .contains("api_key"));
    }

    #[test]
    fn by_id_lookups_on_a_user_client_stay_app_keyed() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/users/bluflowr")
            .match_query(Matcher::UrlEncoded("api_key".into(), "ck".into()))
            .with_status(200)
            .with_body(USER_BODY)
            .create();

        user_client(&server).user("bluflowr").unwrap();
        mock.assert();
    }

    #[test]
    fn start_authorization_parses_the_form_response() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/oauth/request_token")
            .match_query(Matcher::UrlEncoded(
                "scope".into(),
                "listings_r profile_r".into(),
            ))
            .match_header(
                "authorization",
                Matcher::Regex(r#"oauth_consumer_key="ck""#.to_string()),
            )
            .with_status(200)
            .with_body("login_url=https://example/auth&oauth_token=T1&oauth_token_secret=S1")
            .create();

        let pending = app_client(&server)
            .start_authorization(&["listings_r", "profile_r"])
            .unwrap();
        assert_eq!(pending.token, "T1");
        assert_eq!(pending.token_secret, "S1");
        assert_eq!(pending.login_url, "https://example/auth");
        mock.assert();
    }

    #[test]
    fn complete_authorization_returns_the_permanent_pair() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/oauth/access_token")
            .match_query(Matcher::UrlEncoded("oauth_verifier".into(), "v123".into()))
            .match_header(
                "authorization",
                Matcher::Regex(r#"oauth_token="T1""#.to_string()),
            )
            .with_status(200)
            .with_body("oauth_token=T2&oauth_token_secret=S2")
            .create();

        let token = app_client(&server)
            .complete_authorization("v123", "T1", "S1")
            .unwrap();
        assert_eq!(token.token, "T2");
        assert_eq!(token.secret, "S2");
        mock.assert();
    }

    #[test]
    fn token_responses_missing_fields_are_decode_errors() {
        let mut server = Server::new();
        server
            .mock("GET", "/oauth/request_token")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("oauth_token=T1")
            .create();

        let err = app_client(&server).start_authorization(&[]).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn unparseable_json_is_a_decode_error() {
        let mut server = Server::new();
        server
            .mock("GET", "/listings/42")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("definitely not json")
            .create();

        let err = app_client(&server).listing(42).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn builder_requires_consumer_credentials() {
        let err = ClientBuilder::new().build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn builder_rejects_a_partial_token_pair() {
        let err = ClientBuilder::new()
            .consumer_key("ck")
            .consumer_secret("cs")
            .user_token("tok")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn builder_with_a_full_pair_is_authorized() {
        let built = ClientBuilder::new()
            .consumer_key("ck")
            .consumer_secret("cs")
            .user_token("tok")
            .user_token_secret("sec")
            .build()
            .unwrap();
        assert!(built.is_authorized());
        let client = built.into_authorized().unwrap();
        assert_eq!(client.token().token, "tok");
    }

    #[test]
    fn environments_select_the_fixed_hosts() {
        assert_eq!(
            Client::new("ck", "cs").base_url(),
            "https://openapi.etsy.com/v2"
        );
        let built = ClientBuilder::new()
            .consumer_key("ck")
            .consumer_secret("cs")
            .environment(Environment::Sandbox)
            .build()
            .unwrap();
        assert_eq!(
            built.into_app().base_url(),
            "https://sandbox.openapi.etsy.com/v2"
        );
    }
}
