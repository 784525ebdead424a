// UI layer: interactive menus built on `dialoguer`, with `indicatif`
// spinners while requests are in flight. Handlers run one at a time and
// return `anyhow::Result`; API failures are printed and the menu keeps
// going, terminal I/O failures end the program.

use crate::api::ApiClient;
use crate::credentials;
use crate::error::ApiError;
use crate::menu::Menu;
use crate::models::{Amount, Audience, Direction, LoginCredentials, PaymentRequest, Session, User};
use anyhow::{Context, Result};
use crossterm::style::Stylize;
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Stored credentials get one try, typed credentials get one retry.
const MAX_LOGIN_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MainAction {
    SendMoney,
    RequestMoney,
    AccountInfo,
    Balance,
    Friends,
    PaymentMethods,
    UserIdByUsername,
    UsernameByUserId,
    UserInfo,
    UserLookup,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserAction {
    FriendStatus,
    SendFriendRequest,
    Exit,
}

/// How much of the account to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoLevel {
    Summary,
    Identifiers,
    Profile,
    Full,
    Token,
}

impl InfoLevel {
    const ALL: [InfoLevel; 5] = [
        InfoLevel::Summary,
        InfoLevel::Identifiers,
        InfoLevel::Profile,
        InfoLevel::Full,
        InfoLevel::Token,
    ];

    fn label(self) -> &'static str {
        match self {
            InfoLevel::Summary => "0 - name and username",
            InfoLevel::Identifiers => "1 - adds user id and device id",
            InfoLevel::Profile => "2 - every profile field and balance",
            InfoLevel::Full => "3 - full account record",
            InfoLevel::Token => "4 - OAuth token",
        }
    }
}

/// Log in, bootstrapping the credential file when needed. Returns whether
/// the client ended up authenticated.
pub fn login(api: &mut ApiClient, auth_file: &Path) -> Result<bool> {
    let mut stored = match credentials::load(auth_file) {
        Ok(creds) => Some(creds),
        Err(e) if e.needs_prompt() => {
            warn!(error = %e, "no usable stored credentials");
            None
        }
        Err(e) => return Err(e).context("reading credential file"),
    };

    for _ in 0..MAX_LOGIN_ATTEMPTS {
        let (creds, typed) = match stored.take() {
            Some(creds) => (creds, false),
            None => (prompt_credentials()?, true),
        };

        let pb = spinner("Logging in...");
        let outcome = api.login(&creds, |sent| {
            pb.finish_and_clear();
            prompt_sms_code(sent)
        });
        pb.finish_and_clear();

        match outcome {
            Ok(session) => {
                println!("{}", format!("Welcome {}!", session.first_name).green());
                if typed {
                    credentials::store(auth_file, &creds).context("saving credentials")?;
                }
                return Ok(true);
            }
            Err(ApiError::InvalidCredentials) => {
                println!("{}", "Incorrect credentials.".red());
            }
            Err(e) => {
                println!("{}", format!("Unable to login: {e}").red());
                return Ok(false);
            }
        }
    }

    println!("{}", "Unable to login.".red());
    Ok(false)
}

fn prompt_credentials() -> io::Result<LoginCredentials> {
    let username: String = Input::new()
        .with_prompt("Venmo username, email or phone")
        .interact_text()?;
    // `Password` hides input in terminal for passwords.
    let password: String = Password::new().with_prompt("Password").interact()?;
    Ok(LoginCredentials::new(username.trim(), password))
}

fn prompt_sms_code(sent: bool) -> io::Result<String> {
    if sent {
        println!("SMS code sent.");
    } else {
        println!("{}", "Error sending sms code.".yellow());
    }
    Input::new()
        .with_prompt("Enter the code sent to your phone via SMS")
        .interact_text()
}

/// Main interactive menu. Runs until the user chooses "Exit".
pub fn main_menu(api: &ApiClient) -> Result<()> {
    let Some(session) = api.session() else {
        println!("User not logged in.");
        return Ok(());
    };

    let mut menu = Menu::new("Main Menu").with_header(format!("Account : {}", session.username));
    menu.add_option("Send Money", MainAction::SendMoney)
        .add_option("Request Money", MainAction::RequestMoney)
        .add_option("Show Account Information", MainAction::AccountInfo)
        .add_option("Show Account Venmo Balance", MainAction::Balance)
        .add_option("List Friends", MainAction::Friends)
        .add_option("Show Payment Methods", MainAction::PaymentMethods)
        .add_option("Get A Users Id By Username", MainAction::UserIdByUsername)
        .add_option("Get A Username By User ID", MainAction::UsernameByUserId)
        .add_option("Get A Users Information", MainAction::UserInfo)
        .add_option("User lookup with user action menu", MainAction::UserLookup)
        .add_option("Exit", MainAction::Exit);

    loop {
        let outcome = match menu.choose()? {
            MainAction::SendMoney => transfer(api, Direction::Send),
            MainAction::RequestMoney => transfer(api, Direction::Request),
            MainAction::AccountInfo => account_info(api),
            MainAction::Balance => balance(api),
            MainAction::Friends => list_friends(api),
            MainAction::PaymentMethods => payment_methods(api),
            MainAction::UserIdByUsername => user_id_by_username(api),
            MainAction::UsernameByUserId => username_by_user_id(api),
            MainAction::UserInfo => user_information(api),
            MainAction::UserLookup => user_lookup_with_menu(api),
            MainAction::Exit => break,
        };
        report(outcome)?;
    }
    Ok(())
}

/// Print API failures and keep going; anything else is fatal.
fn report(outcome: Result<()>) -> Result<()> {
    match outcome {
        Ok(()) => Ok(()),
        Err(e) if e.downcast_ref::<ApiError>().is_some() => {
            println!("{}", format!("Error: {e:#}").red());
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn spinner(msg: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn with_spinner<T>(msg: &'static str, f: impl FnOnce() -> T) -> T {
    let pb = spinner(msg);
    let out = f();
    pb.finish_and_clear();
    out
}

fn transfer(api: &ApiClient, direction: Direction) -> Result<()> {
    let user_id = prompt_user_id(api)?;

    let amount: String = Input::new()
        .with_prompt("Amount")
        .validate_with(|input: &String| input.parse::<Amount>().map(|_| ()).map_err(|e| e.to_string()))
        .interact_text()?;
    let amount: Amount = amount.parse()?;

    let methods = with_spinner("Fetching payment methods...", || api.payment_methods())?;
    if methods.is_empty() {
        println!("No payment methods on this account.");
        return Ok(());
    }
    let labels: Vec<String> = methods
        .iter()
        .map(|m| format!("{} ({})", m.name, m.kind))
        .collect();
    let method = &methods[Select::new()
        .with_prompt("Payment method")
        .items(&labels)
        .default(0)
        .interact()?];

    let note: String = Input::new()
        .with_prompt("Note")
        .allow_empty(true)
        .interact_text()?;
    let audience = Audience::ALL[Select::new()
        .with_prompt("Visibility")
        .items(&Audience::ALL)
        .default(0)
        .interact()?];

    let verb = match direction {
        Direction::Send => "Send",
        Direction::Request => "Request",
    };
    let confirmed = Confirm::new()
        .with_prompt(format!("{verb} ${amount} ({audience})?"))
        .default(false)
        .interact()?;
    if !confirmed {
        println!("Transaction cancelled.");
        return Ok(());
    }

    let req = PaymentRequest::new(direction, user_id, &method.id, amount, note, audience);
    with_spinner("Sending...", || api.transfer(&req))?;
    println!("{}", "Transaction complete.".green());
    Ok(())
}

/// Ask for a user by username or numeric id and return the id.
fn prompt_user_id(api: &ApiClient) -> Result<String> {
    let by = Select::new()
        .with_prompt("Find the user by")
        .items(&["Username", "User ID"])
        .default(0)
        .interact()?;
    if by == 0 {
        let username = prompt_username()?;
        Ok(with_spinner("Searching...", || api.user_id_by_username(&username))?)
    } else {
        Ok(prompt_numeric_id()?)
    }
}

fn prompt_username() -> io::Result<String> {
    let username: String = Input::new().with_prompt("Username").interact_text()?;
    Ok(username.trim().trim_start_matches('@').to_string())
}

fn prompt_numeric_id() -> io::Result<String> {
    let id: u64 = Input::new().with_prompt("User ID").interact_text()?;
    Ok(id.to_string())
}

/// Look a user up by id or username; returns the user's `data` record.
fn lookup_user(api: &ApiClient) -> Result<Value> {
    let by = Select::new()
        .with_prompt("Look the user up by")
        .items(&["User ID", "Username"])
        .default(0)
        .interact()?;
    let data = if by == 0 {
        let id = prompt_numeric_id()?;
        with_spinner("Fetching user...", || api.user_by_id(&id))?
    } else {
        let username = prompt_username()?;
        with_spinner("Fetching user...", || api.user_by_username(&username))?
    };
    Ok(data)
}

fn account_info(api: &ApiClient) -> Result<()> {
    let session = api.session().ok_or(ApiError::NotAuthenticated)?;
    let labels: Vec<&str> = InfoLevel::ALL.iter().map(|l| l.label()).collect();
    let level = InfoLevel::ALL[Select::new()
        .with_prompt("How much account data")
        .items(&labels)
        .default(0)
        .interact()?];

    println!();
    for line in account_info_lines(session, api.device_id(), level) {
        println!("{line}");
    }
    Ok(())
}

pub fn account_info_lines(session: &Session, device_id: &str, level: InfoLevel) -> Vec<String> {
    match level {
        InfoLevel::Summary => vec![
            format!("First Name : {}", session.first_name),
            format!("Username : {}", session.username),
        ],
        InfoLevel::Identifiers => vec![
            format!("First Name : {}", session.first_name),
            format!("Username : {}", session.username),
            format!("Userid : {}", session.user_id),
            format!("Device-ID : {device_id}"),
        ],
        InfoLevel::Profile => {
            let mut lines: Vec<String> = session
                .user_fields()
                .into_iter()
                .flatten()
                .map(|(k, v)| format!("{} : {}", capitalize(k), display_value(v)))
                .collect();
            lines.push(format!("Balance : {}", display_value(&session.balance)));
            lines
        }
        InfoLevel::Full => flatten_lines(&session.account),
        InfoLevel::Token => vec![format!("Authorization Token : {}", session.access_token)],
    }
}

fn balance(api: &ApiClient) -> Result<()> {
    let balance = api.balance()?;
    println!("\nBalance: {}", display_value(balance));
    Ok(())
}

fn list_friends(api: &ApiClient) -> Result<()> {
    let friends = with_spinner("Fetching friends...", || api.friends())?;
    if friends.is_empty() {
        println!("\nNo friends yet.");
    }
    for friend in &friends {
        println!();
        println!("Name: {}", friend.full_name());
        println!("Username: {}", friend.username);
        println!("ID: {}", friend.id);
    }
    Ok(())
}

fn payment_methods(api: &ApiClient) -> Result<()> {
    let methods = with_spinner("Fetching payment methods...", || api.payment_methods())?;
    println!();
    for method in &methods {
        println!("Type: {}", method.kind);
        println!("Name: {}", method.name);
        println!("Last-Four: {}", method.last_four.as_deref().unwrap_or("-"));
        println!("ID: {}", method.id);
        println!();
    }
    Ok(())
}

fn user_id_by_username(api: &ApiClient) -> Result<()> {
    let username = prompt_username()?;
    match with_spinner("Searching...", || api.user_id_by_username(&username)) {
        Ok(id) => println!("\nUsername: {username} UserID: {id}"),
        Err(ApiError::UserNotFound(_)) => println!("Could not find that username."),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn username_by_user_id(api: &ApiClient) -> Result<()> {
    let id = prompt_numeric_id()?;
    let username = with_spinner("Fetching user...", || api.username_by_id(&id))?;
    println!("\n{username}");
    Ok(())
}

fn user_information(api: &ApiClient) -> Result<()> {
    let data = lookup_user(api)?;
    println!();
    for line in flatten_lines(&data) {
        println!("{line}");
    }
    Ok(())
}

fn user_lookup_with_menu(api: &ApiClient) -> Result<()> {
    let data = lookup_user(api)?;
    let user: User = serde_json::from_value(data).map_err(ApiError::from)?;
    user_menu(api, &user)
}

/// Actions on a single user: friend status and friend requests.
fn user_menu(api: &ApiClient, user: &User) -> Result<()> {
    let mut menu = Menu::new("User Menu").with_header(format!(
        "Account:\n\tUsername: {}\n\tID: {}\n\tName: {}",
        user.username,
        user.id,
        user.full_name()
    ));
    menu.add_option("Is Friend?", UserAction::FriendStatus)
        .add_option("Send Friend Request", UserAction::SendFriendRequest)
        .add_option("Exit", UserAction::Exit);

    loop {
        let outcome = match menu.choose()? {
            UserAction::FriendStatus => {
                println!("Friend Status: {}", user.friend_status);
                Ok(())
            }
            UserAction::SendFriendRequest => send_friend_request(api, user),
            UserAction::Exit => break,
        };
        report(outcome)?;
    }
    Ok(())
}

fn send_friend_request(api: &ApiClient, user: &User) -> Result<()> {
    println!("{}", user.friend_status.describe());
    if user.friend_status.is_friend() {
        println!("Friend request not sent.");
        return Ok(());
    }
    match with_spinner("Sending friend request...", || api.send_friend_request(&user.id)) {
        Ok(_) => println!(
            "{}",
            format!("Friend request successfully sent to {}.", user.username).green()
        ),
        Err(ApiError::FriendRequestPending) => println!("Already a pending friend request."),
        Err(e) => {
            println!("Failed to send a friend request.");
            return Err(e.into());
        }
    }
    Ok(())
}

/// Flatten a JSON object into `Key : value` lines. Nested objects are
/// walked in place; their keys are not prefixed.
pub fn flatten_lines(value: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    flatten_into(value, &mut lines);
    lines
}

fn flatten_into(value: &Value, lines: &mut Vec<String>) {
    let Some(map) = value.as_object() else {
        if !value.is_null() {
            lines.push(display_value(value));
        }
        return;
    };
    for (key, v) in map {
        if v.is_object() {
            flatten_into(v, lines);
        } else {
            lines.push(format!("{} : {}", capitalize(key), display_value(v)));
        }
    }
}

fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Strings print bare and `null` as `None`; numbers and booleans keep their
/// JSON spelling (`true`, not `True`).
fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "None".into(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> Session {
        Session::from_login(
            json!({
                "access_token": "secret-token",
                "balance": 12.5,
                "user": {"username": "alice", "id": "42", "first_name": "Alice", "is_business": false}
            }),
            json!({"data": {"user": {"username": "alice", "phone": "555"}, "balance": "12.50"}}),
        )
        .unwrap()
    }

    #[test]
    fn capitalizes_first_letter_only() {
        assert_eq!(capitalize("first_name"), "First_name");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn flatten_walks_nested_objects() {
        let v = json!({
            "data": {
                "username": "bob",
                "id": "7",
                "profile": {"about": "hi", "is_active": true},
                "friends_count": 3,
                "email": null,
            }
        });
        assert_eq!(
            flatten_lines(&v),
            vec![
                "Username : bob",
                "Id : 7",
                "About : hi",
                "Is_active : true",
                "Friends_count : 3",
                "Email : None",
            ]
        );
    }

    #[test]
    fn account_levels() {
        let s = session();
        assert_eq!(
            account_info_lines(&s, "DEV-1", InfoLevel::Summary),
            vec!["First Name : Alice", "Username : alice"]
        );
        let ids = account_info_lines(&s, "DEV-1", InfoLevel::Identifiers);
        assert_eq!(ids[2], "Userid : 42");
        assert_eq!(ids[3], "Device-ID : DEV-1");

        let profile = account_info_lines(&s, "DEV-1", InfoLevel::Profile);
        assert_eq!(
            profile,
            vec![
                "Username : alice",
                "Id : 42",
                "First_name : Alice",
                "Is_business : false",
                "Balance : 12.5",
            ]
        );

        let full = account_info_lines(&s, "DEV-1", InfoLevel::Full);
        assert_eq!(full, vec!["Username : alice", "Phone : 555", "Balance : 12.50"]);

        assert_eq!(
            account_info_lines(&s, "DEV-1", InfoLevel::Token),
            vec!["Authorization Token : secret-token"]
        );
    }

    #[test]
    fn report_swallows_api_errors_only() {
        assert!(report(Err(ApiError::FriendRequestPending.into())).is_ok());
        assert!(report(Err(anyhow::anyhow!("terminal went away"))).is_err());
    }
}
