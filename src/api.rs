// API client module: a small blocking HTTP client for the Venmo REST API.
// Every operation is one (or, for the two-factor login, three) sequential
// request/response round trips. Response bodies are JSON; failures come back
// as an `{"error": {"code": .., "message": ..}}` envelope which is turned
// into an `ApiError` here so the UI only has to match on error variants.

use crate::config::Config;
use crate::device::generate_device_id;
use crate::error::{
    ApiError, CODE_FRIEND_REQUEST_PENDING, CODE_INVALID_CREDENTIALS, CODE_TWO_FACTOR_REQUIRED,
};
use crate::models::{
    scalar_to_string, Amount, Audience, Direction, LoginCredentials, PaymentMethod,
    PaymentRequest, Session, User,
};
use reqwest::blocking::{Client, ClientBuilder, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::io;
use tracing::{debug, info, warn};

pub const USER_AGENT: &str = "Venmo/7.44.0 (iPhone; iOS 13.0; Scale/2.0)";

const OAUTH_PATH: &str = "/oauth/access_token";
const TWO_FACTOR_PATH: &str = "/account/two-factor/token";
const ACCOUNT_PATH: &str = "/me";
const USERS_PATH: &str = "/users";
const PAYMENT_METHODS_PATH: &str = "/payment-methods";
const FRIEND_REQUESTS_PATH: &str = "/friend-requests";
const PAYMENTS_PATH: &str = "/payments";

const FRIENDS_LIMIT: &str = "1337";
const SEARCH_LIMIT: &str = "50";

const DEVICE_ID_HEADER: &str = "device-id";
const OTP_SECRET_HEADER: &str = "venmo-otp-secret";
const OTP_CODE_HEADER: &str = "venmo-otp";

/// Blocking client holding the HTTP session, the base URL, the device id
/// sent with every request and, once logged in, the session.
pub struct ApiClient {
    client: Client,
    base_url: String,
    device_id: String,
    session: Option<Session>,
}

impl ApiClient {
    /// Build a client from the resolved configuration. A random device id is
    /// generated unless one was configured.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        Self::with_builder(config, Client::builder())
    }

    fn with_builder(config: &Config, builder: ClientBuilder) -> Result<Self, ApiError> {
        let client = builder
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .timeout(config.timeout)
            .build()?;
        let device_id = config
            .device_id
            .clone()
            .unwrap_or_else(generate_device_id);
        debug!(base_url = %config.api_url, %device_id, "created api client");
        Ok(ApiClient {
            client,
            base_url: config.api_url.clone(),
            device_id,
            session: None,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns whether a login succeeded and has not been revoked.
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn require_session(&self) -> Result<&Session, ApiError> {
        self.session.as_ref().ok_or(ApiError::NotAuthenticated)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Headers for calls made before a token exists (login and two-factor).
    fn anonymous_headers(&self) -> Result<HeaderMap, ApiError> {
        build_headers(&self.device_id, None)
    }

    fn auth_headers(&self) -> Result<HeaderMap, ApiError> {
        let session = self.require_session()?;
        build_headers(&self.device_id, Some(&session.access_token))
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        debug!(%method, path, "api request");
        Ok(self
            .client
            .request(method, self.url(path))
            .headers(self.auth_headers()?))
    }

    fn get(&self, path: &str) -> Result<Value, ApiError> {
        read_body(self.authed(Method::GET, path)?.send()?)
    }

    fn post<B: serde::Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        read_body(self.authed(Method::POST, path)?.json(body).send()?)
    }

    /// Log in with `creds`.
    ///
    /// When the service asks for a second factor, an SMS code is requested
    /// and `otp_prompt` is called to read it from the user. The argument to
    /// the prompt says whether the service confirmed the SMS was sent. On
    /// success the account profile (`/me`) is fetched and stored alongside
    /// the token.
    pub fn login<F>(&mut self, creds: &LoginCredentials, otp_prompt: F) -> Result<&Session, ApiError>
    where
        F: FnOnce(bool) -> io::Result<String>,
    {
        debug!(path = OAUTH_PATH, "login request");
        let res = self
            .client
            .post(self.url(OAUTH_PATH))
            .headers(self.anonymous_headers()?)
            .json(creds)
            .send()?;
        let otp_secret = res
            .headers()
            .get(OTP_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let login = match read_body(res) {
            Ok(body) => body,
            Err(ApiError::Service {
                code: CODE_INVALID_CREDENTIALS,
                ..
            }) => return Err(ApiError::InvalidCredentials),
            Err(ApiError::Service {
                code: CODE_TWO_FACTOR_REQUIRED,
                ..
            }) => {
                let secret = otp_secret.ok_or_else(|| {
                    ApiError::TwoFactor(format!("response had no `{OTP_SECRET_HEADER}` header"))
                })?;
                info!("two-factor authentication required");
                self.two_factor_login(creds, &secret, otp_prompt)?
            }
            Err(e) => return Err(e),
        };

        self.establish(login)
    }

    fn two_factor_login<F>(
        &self,
        creds: &LoginCredentials,
        otp_secret: &str,
        otp_prompt: F,
    ) -> Result<Value, ApiError>
    where
        F: FnOnce(bool) -> io::Result<String>,
    {
        let sent = self.request_sms_code(otp_secret)?;
        let code = otp_prompt(sent).map_err(|e| ApiError::TwoFactor(e.to_string()))?;
        let code = code.trim();

        let mut headers = self.anonymous_headers()?;
        headers.insert(
            HeaderName::from_static(OTP_SECRET_HEADER),
            header_value(otp_secret, OTP_SECRET_HEADER)?,
        );
        headers.insert(
            HeaderName::from_static(OTP_CODE_HEADER),
            header_value(code, OTP_CODE_HEADER)?,
        );

        debug!(path = OAUTH_PATH, "two-factor login request");
        let res = self
            .client
            .post(self.url(OAUTH_PATH))
            .headers(headers)
            .json(creds)
            .send()?;
        read_body(res).map_err(|e| match e {
            ApiError::Service { message, .. } => ApiError::TwoFactor(message),
            other => other,
        })
    }

    /// Ask the service to text a one-time code. Returns whether it reported
    /// the message as sent. A rejected request still lets the user type a
    /// code (one may already be on the phone); only transport failures abort.
    fn request_sms_code(&self, otp_secret: &str) -> Result<bool, ApiError> {
        let mut headers = self.anonymous_headers()?;
        headers.insert(
            HeaderName::from_static(OTP_SECRET_HEADER),
            header_value(otp_secret, OTP_SECRET_HEADER)?,
        );

        debug!(path = TWO_FACTOR_PATH, "requesting sms code");
        let res = self
            .client
            .post(self.url(TWO_FACTOR_PATH))
            .headers(headers)
            .json(&json!({ "via": "sms" }))
            .send()?;
        let sent = match read_body(res) {
            Ok(body) => sms_was_sent(&body),
            Err(
                e @ (ApiError::Service { .. } | ApiError::Status { .. } | ApiError::InvalidJson(_)),
            ) => {
                warn!(error = %e, "sms code request rejected");
                false
            }
            Err(e) => return Err(e),
        };
        if !sent {
            warn!("service did not confirm the sms code was sent");
        }
        Ok(sent)
    }

    fn establish(&mut self, login: Value) -> Result<&Session, ApiError> {
        let session = Session::from_login(login, Value::Null)?;
        info!(username = %session.username, "logged in");
        self.session = Some(session);

        match self.get(ACCOUNT_PATH) {
            Ok(account) => {
                if let Some(s) = self.session.as_mut() {
                    s.account = account;
                }
            }
            Err(e) => warn!(error = %e, "could not fetch account profile"),
        }
        self.require_session()
    }

    /// Revoke the access token. A no-op when not logged in.
    pub fn logout(&mut self) -> Result<(), ApiError> {
        if self.session.is_none() {
            return Ok(());
        }
        let res = self.authed(Method::DELETE, OAUTH_PATH)?.send();
        self.session = None;
        read_body(res?)?;
        info!("access token revoked");
        Ok(())
    }

    /// Balance reported by the login response.
    pub fn balance(&self) -> Result<&Value, ApiError> {
        Ok(&self.require_session()?.balance)
    }

    /// The `data` object of `GET /users/{id}`.
    pub fn user_by_id(&self, user_id: &str) -> Result<Value, ApiError> {
        let body = self.get(&format!("{USERS_PATH}/{user_id}"))?;
        take_data(body)
    }

    pub fn user_by_username(&self, username: &str) -> Result<Value, ApiError> {
        let id = self.user_id_by_username(username)?;
        self.user_by_id(&id)
    }

    /// Resolve a username to an id with the user search endpoint. The match
    /// is exact but case-insensitive.
    pub fn user_id_by_username(&self, username: &str) -> Result<String, ApiError> {
        debug!(path = USERS_PATH, "user search");
        let res = self
            .authed(Method::GET, USERS_PATH)?
            .query(&[
                ("query", username),
                ("type", "username"),
                ("limit", SEARCH_LIMIT),
                ("offset", "0"),
            ])
            .send()?;
        let body = read_body(res)?;
        find_user_id(&body, username).ok_or_else(|| ApiError::UserNotFound(username.to_string()))
    }

    pub fn username_by_id(&self, user_id: &str) -> Result<String, ApiError> {
        let data = self.user_by_id(user_id)?;
        data.get("username")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(ApiError::MalformedResponse("data.username"))
    }

    /// Friends of the logged-in account.
    pub fn friends(&self) -> Result<Vec<User>, ApiError> {
        let user_id = &self.require_session()?.user_id;
        let path = format!("{USERS_PATH}/{user_id}/friends?limit={FRIENDS_LIMIT}");
        let data = take_data(self.get(&path)?)?;
        Ok(serde_json::from_value(data)?)
    }

    pub fn payment_methods(&self) -> Result<Vec<PaymentMethod>, ApiError> {
        let data = take_data(self.get(PAYMENT_METHODS_PATH)?)?;
        Ok(serde_json::from_value(data)?)
    }

    /// Send a friend request. An already pending request is reported as
    /// `ApiError::FriendRequestPending`.
    pub fn send_friend_request(&self, user_id: &str) -> Result<Value, ApiError> {
        match self.post(FRIEND_REQUESTS_PATH, &json!({ "user_id": user_id })) {
            Err(ApiError::Service {
                code: CODE_FRIEND_REQUEST_PENDING,
                ..
            }) => Err(ApiError::FriendRequestPending),
            other => other,
        }
    }

    pub fn send_friend_request_by_username(&self, username: &str) -> Result<Value, ApiError> {
        let id = self.user_id_by_username(username)?;
        self.send_friend_request(&id)
    }

    /// Post a payment or a payment request.
    pub fn transfer(&self, req: &PaymentRequest) -> Result<Value, ApiError> {
        info!(
            user_id = %req.user_id,
            amount = %req.amount,
            audience = %req.audience,
            "posting payment"
        );
        self.post(PAYMENTS_PATH, req)
    }

    pub fn send_money(
        &self,
        amount: Amount,
        user_id: &str,
        funding_source_id: &str,
        audience: Audience,
        note: &str,
    ) -> Result<Value, ApiError> {
        self.transfer(&PaymentRequest::new(
            Direction::Send,
            user_id,
            funding_source_id,
            amount,
            note,
            audience,
        ))
    }

    pub fn request_money(
        &self,
        amount: Amount,
        user_id: &str,
        funding_source_id: &str,
        audience: Audience,
        note: &str,
    ) -> Result<Value, ApiError> {
        self.transfer(&PaymentRequest::new(
            Direction::Request,
            user_id,
            funding_source_id,
            amount,
            note,
            audience,
        ))
    }

    pub fn send_money_by_username(
        &self,
        amount: Amount,
        username: &str,
        funding_source_id: &str,
        audience: Audience,
        note: &str,
    ) -> Result<Value, ApiError> {
        let id = self.user_id_by_username(username)?;
        self.send_money(amount, &id, funding_source_id, audience, note)
    }

    pub fn request_money_by_username(
        &self,
        amount: Amount,
        username: &str,
        funding_source_id: &str,
        audience: Audience,
        note: &str,
    ) -> Result<Value, ApiError> {
        let id = self.user_id_by_username(username)?;
        self.request_money(amount, &id, funding_source_id, audience, note)
    }
}

/// Default headers. The bearer token is only attached when given.
pub fn build_headers(device_id: &str, token: Option<&str>) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static(DEVICE_ID_HEADER),
        header_value(device_id, DEVICE_ID_HEADER)?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(t) = token {
        let mut val = header_value(&format!("Bearer {t}"), "authorization")?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
    }
    Ok(headers)
}

fn header_value(value: &str, name: &'static str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value).map_err(|_| ApiError::InvalidHeader(name))
}

fn read_body(res: Response) -> Result<Value, ApiError> {
    let status = res.status();
    let text = res.text()?;
    classify_response(status, &text)
}

/// Turn a status and body into the JSON value or the matching error.
///
/// An error envelope wins over the HTTP status: the service reports login
/// problems with a 4xx status *and* an envelope, and the envelope's code is
/// what callers match on.
pub fn classify_response(status: StatusCode, body: &str) -> Result<Value, ApiError> {
    if body.trim().is_empty() {
        if status.is_success() {
            return Ok(Value::Null);
        }
        return Err(ApiError::Status {
            status,
            body: String::new(),
        });
    }

    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) if !status.is_success() => {
            return Err(ApiError::Status {
                status,
                body: body.to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(err) = value.get("error").filter(|e| !e.is_null()) {
        let code = err
            .get("code")
            .and_then(scalar_to_string)
            .and_then(|c| c.parse::<i64>().ok())
            .unwrap_or(0);
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(ApiError::Service { code, message });
    }

    if !status.is_success() {
        return Err(ApiError::Status {
            status,
            body: body.to_string(),
        });
    }
    Ok(value)
}

fn take_data(mut body: Value) -> Result<Value, ApiError> {
    match body.get_mut("data").map(Value::take) {
        Some(Value::Null) | None => Err(ApiError::MalformedResponse("data")),
        Some(data) => Ok(data),
    }
}

fn sms_was_sent(body: &Value) -> bool {
    body.pointer("/data/status").and_then(Value::as_str) == Some("sent")
}

/// Find the id of the search result whose username equals `username`,
/// ignoring case.
pub fn find_user_id(search: &Value, username: &str) -> Option<String> {
    search
        .get("data")?
        .as_array()?
        .iter()
        .find(|user| {
            user.get("username")
                .and_then(Value::as_str)
                .is_some_and(|u| u.eq_ignore_ascii_case(username))
        })
        .and_then(|user| user.get("id"))
        .and_then(scalar_to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_without_token() {
        let headers = build_headers("1234-ABCD", None).unwrap();
        assert_eq!(headers.get(DEVICE_ID_HEADER).unwrap(), "1234-ABCD");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn headers_with_token() {
        let headers = build_headers("1234-ABCD", Some("tok")).unwrap();
        let auth = headers.get(AUTHORIZATION).unwrap();
        assert_eq!(auth, "Bearer tok");
        assert!(auth.is_sensitive());
    }

    #[test]
    fn bad_header_value_is_an_error() {
        let err = build_headers("bad\nid", None).unwrap_err();
        assert!(matches!(err, ApiError::InvalidHeader(DEVICE_ID_HEADER)));
    }

    #[test]
    fn envelope_beats_status() {
        let body = r#"{"error": {"code": 81109, "message": "Additional authentication is required"}}"#;
        let err = classify_response(StatusCode::UNAUTHORIZED, body).unwrap_err();
        assert!(matches!(
            err,
            ApiError::Service {
                code: CODE_TWO_FACTOR_REQUIRED,
                ..
            }
        ));
    }

    #[test]
    fn string_error_code_is_parsed() {
        let body = r#"{"error": {"code": "264", "message": "Your email or password was incorrect."}}"#;
        let err = classify_response(StatusCode::BAD_REQUEST, body).unwrap_err();
        match err {
            ApiError::Service { code, message } => {
                assert_eq!(code, CODE_INVALID_CREDENTIALS);
                assert!(message.contains("incorrect"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn plain_failures() {
        let err = classify_response(StatusCode::BAD_GATEWAY, "<html>oops</html>").unwrap_err();
        assert!(matches!(err, ApiError::Status { status, .. } if status == StatusCode::BAD_GATEWAY));

        let err = classify_response(StatusCode::OK, "<html>").unwrap_err();
        assert!(matches!(err, ApiError::InvalidJson(_)));

        let err = classify_response(StatusCode::NOT_FOUND, r#"{"data": {}}"#).unwrap_err();
        assert!(matches!(err, ApiError::Status { .. }));
    }

    #[test]
    fn success_bodies() {
        assert_eq!(classify_response(StatusCode::NO_CONTENT, "").unwrap(), Value::Null);
        let v = classify_response(StatusCode::OK, r#"{"data": {"id": "1"}, "error": null}"#).unwrap();
        assert_eq!(v["data"]["id"], "1");
    }

    #[test]
    fn data_extraction() {
        assert_eq!(take_data(json!({"data": [1, 2]})).unwrap(), json!([1, 2]));
        assert!(matches!(
            take_data(json!({"pagination": {}})),
            Err(ApiError::MalformedResponse("data"))
        ));
    }

    #[test]
    fn sms_confirmation() {
        assert!(sms_was_sent(&json!({"data": {"status": "sent"}})));
        assert!(!sms_was_sent(&json!({"data": {"status": "failed"}})));
        assert!(!sms_was_sent(&json!({"data": {}})));
    }

    #[test]
    fn username_search_is_case_insensitive_exact() {
        let search = json!({"data": [
            {"id": "1", "username": "alice-smith"},
            {"id": "2", "username": "Alice"},
            {"id": 3, "username": "bob"},
        ]});
        assert_eq!(find_user_id(&search, "alice").as_deref(), Some("2"));
        assert_eq!(find_user_id(&search, "BOB").as_deref(), Some("3"));
        assert_eq!(find_user_id(&search, "carol"), None);
        assert_eq!(find_user_id(&json!({"data": null}), "alice"), None);
    }

    #[test]
    fn logged_out_client_refuses_authed_calls() {
        let client = ApiClient::new(&Config {
            device_id: Some("0000-TEST".into()),
            ..Config::default()
        })
        .unwrap();
        assert!(!client.is_authenticated());
        assert_eq!(client.device_id(), "0000-TEST");
        assert!(matches!(client.friends(), Err(ApiError::NotAuthenticated)));
        assert!(matches!(client.balance(), Err(ApiError::NotAuthenticated)));
    }

    #[test]
    fn logout_without_session_is_noop() {
        let mut client = ApiClient::new(&Config::default()).unwrap();
        assert!(client.logout().is_ok());
    }

    /// One-shot HTTP server answering a fixed sequence of replies, one per
    /// connection, and recording what the client sent.
    mod scripted {
        use std::collections::HashMap;
        use std::io::{BufRead, BufReader, Read, Write};
        use std::net::{TcpListener, TcpStream};
        use std::thread::{self, JoinHandle};

        pub struct Reply {
            pub status: u16,
            pub headers: Vec<(&'static str, &'static str)>,
            pub body: String,
        }

        pub fn reply(status: u16, body: serde_json::Value) -> Reply {
            Reply {
                status,
                headers: Vec::new(),
                body: body.to_string(),
            }
        }

        #[derive(Debug)]
        pub struct Seen {
            pub method: String,
            pub path: String,
            pub headers: HashMap<String, String>,
            pub body: String,
        }

        impl Seen {
            pub fn header(&self, name: &str) -> Option<&str> {
                self.headers.get(name).map(String::as_str)
            }

            pub fn json(&self) -> serde_json::Value {
                serde_json::from_str(&self.body).unwrap()
            }
        }

        pub fn serve(replies: Vec<Reply>) -> (String, JoinHandle<Vec<Seen>>) {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            let handle = thread::spawn(move || {
                replies
                    .into_iter()
                    .map(|reply| {
                        let (stream, _) = listener.accept().unwrap();
                        answer(stream, &reply)
                    })
                    .collect()
            });
            (base, handle)
        }

        fn answer(stream: TcpStream, reply: &Reply) -> Seen {
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let mut parts = line.split_whitespace();
            let method = parts.next().unwrap_or_default().to_string();
            let path = parts.next().unwrap_or_default().to_string();

            let mut headers = HashMap::new();
            loop {
                line.clear();
                reader.read_line(&mut line).unwrap();
                let trimmed = line.trim_end();
                if trimmed.is_empty() {
                    break;
                }
                if let Some((k, v)) = trimmed.split_once(':') {
                    headers.insert(k.trim().to_ascii_lowercase(), v.trim().to_string());
                }
            }

            let len: usize = headers
                .get("content-length")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let mut body = vec![0; len];
            reader.read_exact(&mut body).unwrap();

            let mut head = format!(
                "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
                reply.status,
                reply.body.len()
            );
            for (k, v) in &reply.headers {
                head.push_str(&format!("{k}: {v}\r\n"));
            }
            head.push_str("\r\n");

            let mut stream = reader.into_inner();
            stream.write_all(head.as_bytes()).unwrap();
            stream.write_all(reply.body.as_bytes()).unwrap();
            stream.flush().unwrap();

            Seen {
                method,
                path,
                headers,
                body: String::from_utf8(body).unwrap(),
            }
        }
    }

    use scripted::{reply, serve, Reply};
    use std::cell::Cell;
    use std::time::Duration;

    fn client_for(base: &str) -> ApiClient {
        let config = Config {
            api_url: base.to_string(),
            device_id: Some("TEST-DEVICE".into()),
            timeout: Duration::from_secs(5),
            ..Config::default()
        };
        ApiClient::with_builder(&config, Client::builder().no_proxy()).unwrap()
    }

    fn creds() -> LoginCredentials {
        LoginCredentials::new("alice", "hunter2")
    }

    fn login_ok() -> Reply {
        reply(
            200,
            json!({
                "access_token": "tok",
                "balance": "20.00",
                "user": {"id": "42", "username": "alice", "first_name": "Alice"}
            }),
        )
    }

    fn me_ok() -> Reply {
        reply(200, json!({"data": {"user": {"username": "alice"}, "balance": "20.00"}}))
    }

    fn two_factor_required(secret: Option<&'static str>) -> Reply {
        let mut r = reply(
            401,
            json!({"error": {"code": CODE_TWO_FACTOR_REQUIRED, "message": "Additional authentication is required"}}),
        );
        if let Some(s) = secret {
            r.headers.push((OTP_SECRET_HEADER, s));
        }
        r
    }

    fn no_prompt(_: bool) -> io::Result<String> {
        Err(io::Error::other("no code expected"))
    }

    /// Start a server whose first two replies log in, followed by `rest`.
    fn logged_in(rest: Vec<Reply>) -> (ApiClient, std::thread::JoinHandle<Vec<scripted::Seen>>) {
        let mut replies = vec![login_ok(), me_ok()];
        replies.extend(rest);
        let (base, server) = serve(replies);
        let mut client = client_for(&base);
        client.login(&creds(), no_prompt).unwrap();
        (client, server)
    }

    #[test]
    fn wrong_password_is_invalid_credentials() {
        let (base, server) = serve(vec![reply(
            400,
            json!({"error": {"code": CODE_INVALID_CREDENTIALS, "message": "Your email or password was incorrect."}}),
        )]);
        let mut client = client_for(&base);

        let err = client.login(&creds(), no_prompt).unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials));
        assert!(!client.is_authenticated());

        let seen = server.join().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, "POST");
        assert_eq!(seen[0].path, OAUTH_PATH);
        assert_eq!(seen[0].header(DEVICE_ID_HEADER), Some("TEST-DEVICE"));
        assert_eq!(seen[0].header("authorization"), None);
        assert_eq!(seen[0].json()["phone_email_or_username"], "alice");
        assert_eq!(seen[0].json()["client_id"], "1");
    }

    #[test]
    fn two_factor_login_retries_with_code() {
        let (base, server) = serve(vec![
            two_factor_required(Some("otp-secret")),
            reply(200, json!({"data": {"status": "sent"}})),
            login_ok(),
            me_ok(),
        ]);
        let mut client = client_for(&base);
        let prompted = Cell::new(None);

        let session = client
            .login(&creds(), |sent| {
                prompted.set(Some(sent));
                Ok(" 123456\n".to_string())
            })
            .unwrap();
        assert_eq!(session.username, "alice");
        assert_eq!(session.account["data"]["balance"], "20.00");
        assert_eq!(prompted.get(), Some(true));

        let seen = server.join().unwrap();
        assert_eq!(seen.len(), 4);

        assert_eq!(seen[1].path, TWO_FACTOR_PATH);
        assert_eq!(seen[1].header(OTP_SECRET_HEADER), Some("otp-secret"));
        assert_eq!(seen[1].json(), json!({"via": "sms"}));

        assert_eq!(seen[2].path, OAUTH_PATH);
        assert_eq!(seen[2].header(OTP_SECRET_HEADER), Some("otp-secret"));
        assert_eq!(seen[2].header(OTP_CODE_HEADER), Some("123456"));
        assert_eq!(seen[2].header("authorization"), None);
        assert_eq!(seen[2].json()["password"], "hunter2");

        assert_eq!(seen[3].method, "GET");
        assert_eq!(seen[3].path, ACCOUNT_PATH);
        assert_eq!(seen[3].header("authorization"), Some("Bearer tok"));
    }

    #[test]
    fn rejected_sms_request_still_prompts_for_code() {
        let (base, server) = serve(vec![
            two_factor_required(Some("otp-secret")),
            reply(400, json!({"error": {"code": 1, "message": "sms throttled"}})),
            login_ok(),
            me_ok(),
        ]);
        let mut client = client_for(&base);
        let prompted = Cell::new(None);

        client
            .login(&creds(), |sent| {
                prompted.set(Some(sent));
                Ok("654321".to_string())
            })
            .unwrap();
        assert_eq!(prompted.get(), Some(false));
        assert!(client.is_authenticated());

        let seen = server.join().unwrap();
        assert_eq!(seen[2].header(OTP_CODE_HEADER), Some("654321"));
    }

    #[test]
    fn wrong_code_is_two_factor_error() {
        let (base, server) = serve(vec![
            two_factor_required(Some("otp-secret")),
            reply(200, json!({"data": {"status": "sent"}})),
            reply(400, json!({"error": {"code": 81110, "message": "Invalid code"}})),
        ]);
        let mut client = client_for(&base);

        let err = client.login(&creds(), |_| Ok("000000".into())).unwrap_err();
        assert!(matches!(err, ApiError::TwoFactor(ref m) if m == "Invalid code"));
        assert!(!client.is_authenticated());
        assert_eq!(server.join().unwrap().len(), 3);
    }

    #[test]
    fn two_factor_without_secret_header() {
        let (base, server) = serve(vec![two_factor_required(None)]);
        let mut client = client_for(&base);
        let prompted = Cell::new(false);

        let err = client
            .login(&creds(), |_| {
                prompted.set(true);
                Ok(String::new())
            })
            .unwrap_err();
        assert!(matches!(err, ApiError::TwoFactor(_)));
        assert!(!prompted.get());
        assert_eq!(server.join().unwrap().len(), 1);
    }

    #[test]
    fn failed_profile_fetch_keeps_session() {
        let (base, server) = serve(vec![
            login_ok(),
            Reply {
                status: 500,
                headers: Vec::new(),
                body: "oops".into(),
            },
        ]);
        let mut client = client_for(&base);

        let session = client.login(&creds(), no_prompt).unwrap();
        assert_eq!(session.access_token, "tok");
        assert_eq!(session.account, Value::Null);
        assert!(client.is_authenticated());
        assert_eq!(client.balance().unwrap(), &json!("20.00"));
        server.join().unwrap();
    }

    #[test]
    fn friend_request_outcomes() {
        let (client, server) = logged_in(vec![
            reply(400, json!({"error": {"code": CODE_FRIEND_REQUEST_PENDING, "message": "pending"}})),
            reply(400, json!({"error": {"code": 1, "message": "nope"}})),
            reply(200, json!({"data": [{"id": "77", "username": "Bob"}]})),
            reply(200, json!({"data": {"status": "pending"}})),
        ]);

        assert!(matches!(
            client.send_friend_request("77"),
            Err(ApiError::FriendRequestPending)
        ));
        assert!(matches!(
            client.send_friend_request("77"),
            Err(ApiError::Service { code: 1, .. })
        ));
        let data = client.send_friend_request_by_username("bob").unwrap();
        assert_eq!(data["data"]["status"], "pending");

        let seen = server.join().unwrap();
        assert_eq!(seen[2].path, FRIEND_REQUESTS_PATH);
        assert_eq!(seen[2].json(), json!({"user_id": "77"}));
        assert!(seen[4].path.starts_with("/users?"));
        assert!(seen[4].path.contains("type=username"));
        assert_eq!(seen[5].json(), json!({"user_id": "77"}));
    }

    #[test]
    fn payments_by_username() {
        let search = || reply(200, json!({"data": [{"id": 77, "username": "bob"}]}));
        let (client, server) = logged_in(vec![
            search(),
            reply(200, json!({"data": {"payment": {"id": "p1"}}})),
            search(),
            reply(200, json!({"data": {"payment": {"id": "p2"}}})),
        ]);
        let amount: Amount = "5".parse().unwrap();

        client
            .send_money_by_username(amount, "Bob", "fs-1", Audience::Public, "lunch")
            .unwrap();
        client
            .request_money_by_username(amount, "bob", "fs-1", Audience::Private, "")
            .unwrap();

        let seen = server.join().unwrap();
        assert_eq!(seen[3].path, PAYMENTS_PATH);
        assert_eq!(seen[3].header("authorization"), Some("Bearer tok"));
        assert_eq!(
            seen[3].json(),
            json!({
                "funding_source_id": "fs-1",
                "user_id": "77",
                "amount": "5.00",
                "note": "lunch",
                "audience": "public",
            })
        );
        assert_eq!(seen[5].json()["amount"], "-5.00");
        assert_eq!(seen[5].json()["audience"], "private");
    }

    #[test]
    fn unknown_username_is_not_found() {
        let (client, server) = logged_in(vec![reply(200, json!({"data": []}))]);
        let err = client.user_id_by_username("ghost").unwrap_err();
        assert!(matches!(err, ApiError::UserNotFound(ref u) if u == "ghost"));
        server.join().unwrap();
    }

    #[test]
    fn logout_revokes_and_clears_session() {
        let (mut client, server) = logged_in(vec![reply(200, json!({}))]);
        assert!(client.is_authenticated());

        client.logout().unwrap();
        assert!(!client.is_authenticated());
        assert!(client.session().is_none());

        let seen = server.join().unwrap();
        assert_eq!(seen[2].method, "DELETE");
        assert_eq!(seen[2].path, OAUTH_PATH);
        assert_eq!(seen[2].header("authorization"), Some("Bearer tok"));
    }
}
