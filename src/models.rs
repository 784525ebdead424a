// Data shapes exchanged with the service. Most response bodies are kept as
// `serde_json::Value` by the client because the UI prints them verbatim; the
// typed structs below cover the fields the program actually acts on.

use crate::error::ApiError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Body of the OAuth login request. This is also the on-disk format of the
/// credential file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    pub phone_email_or_username: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    pub password: String,
}

fn default_client_id() -> String {
    "1".into()
}

impl LoginCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        LoginCredentials {
            phone_email_or_username: username.into(),
            client_id: default_client_id(),
            password: password.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.phone_email_or_username.is_empty() && !self.password.is_empty()
    }
}

/// Authenticated state built from the login response and the `/me` body.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub user_id: String,
    pub username: String,
    pub first_name: String,
    pub balance: Value,
    /// Raw login response, used for the verbose account views.
    pub login: Value,
    /// Raw `/me` response.
    pub account: Value,
}

impl Session {
    pub fn from_login(login: Value, account: Value) -> Result<Self, ApiError> {
        let access_token = login
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or(ApiError::MalformedResponse("access_token"))?
            .to_string();
        let user = login
            .get("user")
            .filter(|u| u.is_object())
            .ok_or(ApiError::MalformedResponse("user"))?;
        let user_id = user
            .get("id")
            .and_then(scalar_to_string)
            .ok_or(ApiError::MalformedResponse("user.id"))?;
        let username = user
            .get("username")
            .and_then(Value::as_str)
            .ok_or(ApiError::MalformedResponse("user.username"))?
            .to_string();
        let first_name = user
            .get("first_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let balance = login.get("balance").cloned().unwrap_or(Value::Null);

        Ok(Session {
            access_token,
            user_id,
            username,
            first_name,
            balance,
            login,
            account,
        })
    }

    /// The `user` object of the login response.
    pub fn user_fields(&self) -> Option<&serde_json::Map<String, Value>> {
        self.login.get("user").and_then(Value::as_object)
    }
}

/// Relationship between the logged-in account and another user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendStatus {
    Friend,
    NotFriends,
    RequestSentByYou,
    RequestReceivedByYou,
    Unknown(String),
}

impl From<String> for FriendStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "friend" => FriendStatus::Friend,
            "not_friends" => FriendStatus::NotFriends,
            "request_sent_by_you" => FriendStatus::RequestSentByYou,
            "request_received_by_you" => FriendStatus::RequestReceivedByYou,
            _ => FriendStatus::Unknown(s),
        }
    }
}

impl<'de> Deserialize<'de> for FriendStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(FriendStatus::from).unwrap_or(FriendStatus::NotFriends))
    }
}

impl FriendStatus {
    pub fn is_friend(&self) -> bool {
        matches!(self, FriendStatus::Friend)
    }

    /// Sentence shown in the user action menu.
    pub fn describe(&self) -> String {
        match self {
            FriendStatus::Friend => "Already friends.".into(),
            FriendStatus::NotFriends => "Not friends.".into(),
            FriendStatus::RequestSentByYou => {
                "Friend request from you to them is pending.".into()
            }
            FriendStatus::RequestReceivedByYou => {
                "Friend request from them to you is pending.".into()
            }
            FriendStatus::Unknown(s) => format!("Unknown friend status: {s}"),
        }
    }
}

impl fmt::Display for FriendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FriendStatus::Friend => "friend",
            FriendStatus::NotFriends => "not_friends",
            FriendStatus::RequestSentByYou => "request_sent_by_you",
            FriendStatus::RequestReceivedByYou => "request_received_by_you",
            FriendStatus::Unknown(s) => s,
        };
        f.write_str(s)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct User {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default = "default_status")]
    pub friend_status: FriendStatus,
}

fn default_status() -> FriendStatus {
    FriendStatus::NotFriends
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// A funding source (bank account, card, or the Venmo balance).
#[derive(Deserialize, Debug, Clone)]
pub struct PaymentMethod {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub last_four: Option<String>,
}

/// Who can see a transaction in the feed.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    #[default]
    Private,
    Friends,
    Public,
}

impl Audience {
    pub const ALL: [Audience; 3] = [Audience::Private, Audience::Friends, Audience::Public];
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Audience::Private => "private",
            Audience::Friends => "friends",
            Audience::Public => "public",
        })
    }
}

/// A positive money amount held in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(u64);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("`{0}` is not a valid amount")]
    Invalid(String),
    #[error("amount must be greater than zero")]
    Zero,
}

impl Amount {
    pub fn from_cents(cents: u64) -> Self {
        Amount(cents)
    }

    pub fn cents(&self) -> u64 {
        self.0
    }

    /// Wire form: decimal string, negated for money requests.
    pub fn to_wire(&self, negate: bool) -> String {
        let sign = if negate { "-" } else { "" };
        format!("{sign}{self}")
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(AmountError::Empty);
        }
        let invalid = || AmountError::Invalid(s.to_string());

        let (whole, frac) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };
        if frac.len() > 2
            || (whole.is_empty() && frac.is_empty())
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let frac: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };
        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac))
            .ok_or_else(invalid)?;
        if cents == 0 {
            return Err(AmountError::Zero);
        }
        Ok(Amount(cents))
    }
}

/// Body of `POST /payments`. Requests use the same endpoint with a negative
/// amount.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub funding_source_id: String,
    pub user_id: String,
    pub amount: String,
    pub note: String,
    pub audience: Audience,
}

impl PaymentRequest {
    pub fn new(
        direction: Direction,
        user_id: impl Into<String>,
        funding_source_id: impl Into<String>,
        amount: Amount,
        note: impl Into<String>,
        audience: Audience,
    ) -> Self {
        PaymentRequest {
            funding_source_id: funding_source_id.into(),
            user_id: user_id.into(),
            amount: amount.to_wire(direction == Direction::Request),
            note: note.into(),
            audience,
        }
    }
}

/// Whether money goes to the other user or is asked from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Request,
}

/// Render a scalar JSON value (string or number) as a plain string.
pub fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let v = Value::deserialize(deserializer)?;
    scalar_to_string(&v).ok_or_else(|| serde::de::Error::custom("expected a string or a number"))
}

fn optional_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let v = Value::deserialize(deserializer)?;
    Ok(scalar_to_string(&v))
}
