//! HTTP login handshake
//!
//! Turns a challstr into an assertion token via the login server. Request
//! building and response interpretation are pure; [`LoginClient`] performs
//! the actual round trip.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AppError, FatalError};
use crate::types::to_user_id;

/// Responses shorter than this are login-server diagnostics, not assertions
pub const MIN_RESPONSE_LEN: usize = 50;

/// Marker the login server uses when shedding load
const OVERLOAD_MARKER: &str = "heavy load";

/// One login attempt for a given challstr
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub challstr: String,
    pub userid: String,
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn new(challstr: String, nick: &str, password: Option<&str>) -> Self {
        Self {
            challstr,
            userid: to_user_id(nick),
            password: password.map(str::to_string),
        }
    }

    /// Query string for the password-less `getassertion` GET
    pub fn assertion_query(&self) -> Result<String, AppError> {
        let params: &[(&str, &str)] = &[
            ("act", "getassertion"),
            ("userid", &self.userid),
            ("challstr", &self.challstr),
        ];
        Ok(serde_urlencoded::to_string(params)?)
    }

    /// Form body for the password `login` POST
    pub fn login_form(&self, password: &str) -> Result<String, AppError> {
        let params: &[(&str, &str)] = &[
            ("act", "login"),
            ("name", &self.userid),
            ("pass", password),
            ("challstr", &self.challstr),
        ];
        Ok(serde_urlencoded::to_string(params)?)
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    actionsuccess: Value,
    #[serde(default)]
    assertion: Value,
}

/// Loose truthiness, as the login server's flag is not always a JSON bool
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Interpret the login server's body, yielding the assertion token.
///
/// The structured response is prefixed with a single non-JSON byte. Any
/// JSON after that byte is structured: a truthy `actionsuccess` with a
/// string `assertion` succeeds, anything else is fatal. A body that is not
/// JSON is taken verbatim as the token, which is what the `getassertion`
/// variant returns. The unstripped body is used there, since the prefix
/// byte only exists on structured responses and stripping would cut the
/// first character off a real assertion.
pub fn interpret_login_response(
    body: &str,
    nick: &str,
    password_provided: bool,
) -> Result<String, FatalError> {
    if body == ";" {
        return Err(FatalError::CredentialRejected {
            nick: nick.to_string(),
            password_provided,
        });
    }
    if body.len() < MIN_RESPONSE_LEN {
        return Err(FatalError::LoginServerError(body.to_string()));
    }
    if body.contains(OVERLOAD_MARKER) {
        return Err(FatalError::LoginServerOverloaded);
    }

    let stripped = body
        .char_indices()
        .nth(1)
        .map(|(i, _)| &body[i..])
        .unwrap_or_default();

    let value: Value = match serde_json::from_str(stripped) {
        Ok(value) => value,
        Err(e) => {
            if stripped.trim_start().starts_with('{') {
                warn!(
                    "Login response looks structured but did not parse ({}); using it verbatim as the token",
                    e
                );
            }
            return Ok(body.to_string());
        }
    };

    let response = match value {
        Value::Object(_) => serde_json::from_value::<LoginResponse>(value).ok(),
        _ => None,
    };
    match response {
        Some(LoginResponse {
            actionsuccess,
            assertion: Value::String(assertion),
        }) if is_truthy(&actionsuccess) => Ok(assertion),
        _ => Err(FatalError::LoginUnsuccessful(body.to_string())),
    }
}

/// HTTP client for the login endpoint
#[derive(Debug, Clone)]
pub struct LoginClient {
    http: reqwest::Client,
    url: String,
}

impl LoginClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let http = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(http) => http,
            Err(e) => {
                warn!(
                    "Failed to build login HTTP client ({}); using defaults without the {:?} timeout",
                    e, timeout
                );
                reqwest::Client::default()
            }
        };

        Self {
            http,
            url: url.into(),
        }
    }

    /// Perform the round trip and return the raw response body
    pub async fn fetch(&self, request: &LoginRequest) -> Result<String, AppError> {
        let response = match request.password.as_deref() {
            None => {
                let url = format!("{}?{}", self.url, request.assertion_query()?);
                debug!("Sending login to {}", self.url);
                self.http.get(url).send().await?
            }
            Some(password) => {
                let form = request.login_form(password)?;
                debug!("Sending login to {}", self.url);
                self.http
                    .post(&self.url)
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(form)
                    .send()
                    .await?
            }
        };
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_token() -> String {
        "a".repeat(120)
    }

    #[test]
    fn test_request_uses_user_id() {
        let req = LoginRequest::new("4|abc".to_string(), "Some Bot", None);
        assert_eq!(req.userid, "somebot");
        assert_eq!(
            req.assertion_query().unwrap(),
            "act=getassertion&userid=somebot&challstr=4%7Cabc"
        );
    }

    #[test]
    fn test_login_form_encodes_password() {
        let req = LoginRequest::new("4|abc".to_string(), "Bot", Some("p&ss word"));
        assert_eq!(
            req.login_form("p&ss word").unwrap(),
            "act=login&name=bot&pass=p%26ss+word&challstr=4%7Cabc"
        );
    }

    #[test]
    fn test_semicolon_is_credential_rejection() {
        let err = interpret_login_response(";", "Bot", true).unwrap_err();
        assert_eq!(
            err,
            FatalError::CredentialRejected {
                nick: "Bot".to_string(),
                password_provided: true
            }
        );
    }

    #[test]
    fn test_short_body_is_server_error() {
        let err = interpret_login_response("Invalid challstr", "Bot", false).unwrap_err();
        assert_eq!(err, FatalError::LoginServerError("Invalid challstr".to_string()));
    }

    #[test]
    fn test_heavy_load_is_overload() {
        let body = format!("The login server is under heavy load. {}", long_token());
        let err = interpret_login_response(&body, "Bot", false).unwrap_err();
        assert_eq!(err, FatalError::LoginServerOverloaded);
    }

    #[test]
    fn test_structured_success_yields_assertion() {
        let body = format!(
            r#"]{{"actionsuccess":true,"assertion":"{}","curuser":{{"loggedin":true}}}}"#,
            long_token()
        );
        assert_eq!(interpret_login_response(&body, "Bot", true).unwrap(), long_token());
    }

    #[test]
    fn test_structured_failure_is_fatal() {
        let body = format!(r#"]{{"actionsuccess":false,"assertion":"{}"}}"#, long_token());
        let err = interpret_login_response(&body, "Bot", true).unwrap_err();
        assert!(matches!(err, FatalError::LoginUnsuccessful(_)));
    }

    #[test]
    fn test_numeric_success_flag_is_truthy() {
        let body = format!(r#"]{{"actionsuccess":1,"assertion":"{}"}}"#, long_token());
        assert_eq!(interpret_login_response(&body, "Bot", true).unwrap(), long_token());
    }

    #[test]
    fn test_numeric_failure_flag_is_fatal() {
        let body = format!(r#"]{{"actionsuccess":0,"assertion":"{}"}}"#, long_token());
        let err = interpret_login_response(&body, "Bot", true).unwrap_err();
        assert_eq!(err, FatalError::LoginUnsuccessful(body));
    }

    #[test]
    fn test_success_without_string_assertion_is_fatal() {
        let body = format!(r#"]{{"actionsuccess":true,"assertion":null,"pad":"{}"}}"#, long_token());
        let err = interpret_login_response(&body, "Bot", true).unwrap_err();
        assert!(matches!(err, FatalError::LoginUnsuccessful(_)));
    }

    #[test]
    fn test_malformed_json_used_verbatim() {
        let body = format!(r#"]{{"actionsuccess":true,"assertion":"{}""#, long_token());
        assert_eq!(interpret_login_response(&body, "Bot", true).unwrap(), body);
    }

    #[tokio::test]
    async fn test_login_client_applies_timeout() {
        std::env::set_var("NO_PROXY", "127.0.0.1,localhost");

        // Accepted by the kernel backlog but never answered
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/action.php", listener.local_addr().unwrap());
        let client = LoginClient::new(url, Duration::from_millis(200));
        let request = LoginRequest::new("4|abc".to_string(), "Bot", None);

        let result = tokio::time::timeout(Duration::from_secs(5), client.fetch(&request))
            .await
            .expect("login timeout should fire first");
        assert!(matches!(result, Err(AppError::Http(_))));
        drop(listener);
    }

    #[test]
    fn test_raw_assertion_used_verbatim() {
        let body = format!("{},bot,2,1700000000,sim3.psim.us", long_token());
        assert_eq!(interpret_login_response(&body, "Bot", false).unwrap(), body);
    }
}
