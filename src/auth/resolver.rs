//! Session negotiation
//!
//! Turns a [`Credential`] into a [`Session`] by calling the login endpoint
//! its variant needs. The dispatch in [`SessionResolver::resolve`] is one
//! exhaustive match, so a new variant does not compile until it has a flow.

use super::types::{Credential, PrivateKey, Session};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use quick_xml::de::from_str;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

/// Lifetime of a JWT bearer assertion
const JWT_LIFETIME_SECS: i64 = 180;

const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Resolves credentials to sessions against one login host
#[derive(Debug, Clone)]
pub struct SessionResolver {
    http: HttpClient,
    config: ClientConfig,
}

impl SessionResolver {
    /// Create a resolver sharing the given HTTP client
    pub fn new(http: HttpClient, config: ClientConfig) -> Self {
        Self { http, config }
    }

    /// The client settings sessions are negotiated with
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Negotiate a session for the credential
    pub async fn resolve(&self, credential: &Credential) -> Result<Session> {
        debug!(kind = %credential.kind(), "Negotiating session");

        let session = match credential {
            Credential::SecurityToken {
                username,
                password,
                security_token,
            } => {
                let password = format!("{password}{security_token}");
                self.soap_login(username, &password, None).await?
            }

            Credential::OrganizationId {
                username,
                password,
                organization_id,
            } => {
                self.soap_login(username, password, Some(organization_id.as_str()))
                    .await?
            }

            Credential::ConsumerKeySecret {
                username,
                password,
                consumer_key,
                consumer_secret,
            } => {
                let url = self.token_url(&self.config.login_url());
                self.token_exchange(
                    &url,
                    vec![
                        ("grant_type", "password"),
                        ("client_id", consumer_key.as_str()),
                        ("client_secret", consumer_secret.as_str()),
                        ("username", username.as_str()),
                        ("password", password.as_str()),
                    ],
                )
                .await?
            }

            Credential::JwtBearer {
                username,
                consumer_key,
                private_key,
                instance_url,
            } => {
                let assertion = self.jwt_assertion(username, consumer_key, private_key).await?;
                let base = match instance_url {
                    Some(url) => url.trim_end_matches('/').to_string(),
                    None => self.config.login_url(),
                };
                let url = self.token_url(&base);
                self.token_exchange(
                    &url,
                    vec![("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())],
                )
                .await?
            }

            Credential::DirectSession {
                session_id,
                instance,
            } => Session::new(session_id, instance.base_url(), &self.config.version),

            Credential::ClientCredentials {
                consumer_key,
                consumer_secret,
                domain,
            } => {
                let base = match &self.config.login_url {
                    Some(url) => url.trim_end_matches('/').to_string(),
                    None => format!("https://{domain}.salesforce.com"),
                };
                let url = self.token_url(&base);
                self.token_exchange(
                    &url,
                    vec![
                        ("grant_type", "client_credentials"),
                        ("client_id", consumer_key.as_str()),
                        ("client_secret", consumer_secret.as_str()),
                    ],
                )
                .await?
            }
        };

        info!(
            kind = %credential.kind(),
            instance = session.instance_url(),
            "Session established"
        );
        Ok(session)
    }

    fn token_url(&self, base: &str) -> String {
        format!("{base}/services/oauth2/token")
    }

    /// SOAP partner login, optionally scoped to an organization
    async fn soap_login(
        &self,
        username: &str,
        password: &str,
        organization_id: Option<&str>,
    ) -> Result<Session> {
        let url = format!(
            "{}/services/Soap/u/{}",
            self.config.login_url(),
            self.config.version
        );
        let envelope = login_envelope(
            username,
            password,
            self.config.client_id.as_deref(),
            organization_id,
        );

        let request = RequestConfig::new()
            .header("SOAPAction", "login")
            .text(envelope, "text/xml; charset=UTF-8");

        let body = match self.http.request_text(Method::POST, &url, request).await {
            Ok(body) => body,
            Err(Error::HttpStatus { status, body }) => {
                let reason = soap_fault(&body).unwrap_or(body);
                return Err(Error::auth(format!("SOAP login rejected ({status}): {reason}")));
            }
            Err(e) => return Err(e),
        };

        let result = parse_login_response(&body)?;
        let instance_url = origin(&result.server_url)?;
        Ok(Session::new(result.session_id, instance_url, &self.config.version))
    }

    /// Post an OAuth2 grant and turn the token response into a session
    async fn token_exchange(&self, url: &str, form: Vec<(&str, &str)>) -> Result<Session> {
        let request = RequestConfig::new().form(form);
        let token: TokenResponse = match self.http.post_json(url, request).await {
            Ok(token) => token,
            Err(Error::HttpStatus { status, body }) => {
                return Err(Error::auth(format!(
                    "Token request failed with status {status}: {body}"
                )))
            }
            Err(e) => return Err(e),
        };
        Ok(Session::new(
            token.access_token,
            token.instance_url,
            &self.config.version,
        ))
    }

    /// Sign the JWT bearer assertion
    async fn jwt_assertion(
        &self,
        username: &str,
        consumer_key: &str,
        private_key: &PrivateKey,
    ) -> Result<String> {
        let pem = match private_key {
            PrivateKey::Pem(pem) => pem.clone(),
            PrivateKey::File(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                Error::invalid_credential(format!(
                    "cannot read privatekey_file {}: {e}",
                    path.display()
                ))
            })?,
        };

        let now = Utc::now().timestamp();
        let claims = JwtClaims {
            iss: consumer_key.to_string(),
            sub: username.to_string(),
            aud: self.config.login_url(),
            exp: now + JWT_LIFETIME_SECS,
        };

        let key = EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| Error::JwtGeneration {
            message: format!("Invalid private key: {e}"),
        })?;
        encode(&Header::new(Algorithm::RS256), &claims, &key).map_err(|e| Error::JwtGeneration {
            message: format!("Failed to encode JWT: {e}"),
        })
    }
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    instance_url: String,
}

/// JWT bearer claims
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct JwtClaims {
    pub(crate) iss: String,
    pub(crate) sub: String,
    pub(crate) aud: String,
    pub(crate) exp: i64,
}

// ============================================================================
// SOAP login response
// ============================================================================

#[derive(Debug, Deserialize)]
struct SoapEnvelope {
    #[serde(rename = "Body")]
    body: SoapBody,
}

#[derive(Debug, Deserialize)]
struct SoapBody {
    #[serde(rename = "loginResponse")]
    login_response: Option<LoginResponse>,
    #[serde(rename = "Fault")]
    fault: Option<SoapFault>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    result: LoginResult,
}

#[derive(Debug, Deserialize)]
struct LoginResult {
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "serverUrl")]
    server_url: String,
}

#[derive(Debug, Deserialize)]
struct SoapFault {
    faultstring: String,
}

/// Session id and server URL of a successful login; a fault is an auth error
fn parse_login_response(body: &str) -> Result<LoginResult> {
    let envelope: SoapEnvelope = from_str(body)
        .map_err(|e| Error::auth(format!("Malformed SOAP login response: {e}")))?;
    if let Some(fault) = envelope.body.fault {
        return Err(Error::auth(format!("SOAP login rejected: {}", fault.faultstring)));
    }
    envelope
        .body
        .login_response
        .map(|response| response.result)
        .ok_or_else(|| Error::auth("SOAP login response has no loginResponse"))
}

fn soap_fault(body: &str) -> Option<String> {
    from_str::<SoapEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.body.fault)
        .map(|fault| fault.faultstring)
}

/// Scheme, host and port of a URL
fn origin(server_url: &str) -> Result<String> {
    let url = Url::parse(server_url)?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::auth(format!("serverUrl has no host: {server_url}")))?;
    Ok(match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    })
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn login_envelope(
    username: &str,
    password: &str,
    client_id: Option<&str>,
    organization_id: Option<&str>,
) -> String {
    let mut header = String::new();
    if let Some(client) = client_id {
        header.push_str(&format!(
            "<urn:CallOptions><urn:client>{}</urn:client><urn:defaultNamespace>sf</urn:defaultNamespace></urn:CallOptions>",
            xml_escape(client)
        ));
    }
    if let Some(org) = organization_id {
        header.push_str(&format!(
            "<urn:LoginScopeHeader><urn:organizationId>{}</urn:organizationId></urn:LoginScopeHeader>",
            xml_escape(org)
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="utf-8" ?>
<env:Envelope xmlns:xsd="http://www.w3.org/2001/XMLSchema"
        xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
        xmlns:env="http://schemas.xmlsoap.org/soap/envelope/"
        xmlns:urn="urn:partner.soap.sforce.com">
    <env:Header>{header}</env:Header>
    <env:Body>
        <n1:login xmlns:n1="urn:partner.soap.sforce.com">
            <n1:username>{}</n1:username>
            <n1:password>{}</n1:password>
        </n1:login>
    </env:Body>
</env:Envelope>"#,
        xml_escape(username),
        xml_escape(password)
    )
}

#[cfg(test)]
mod resolver_tests {
    use super::*;

    #[test]
    fn test_origin_strips_path() {
        assert_eq!(
            origin("https://na1.salesforce.com/services/Soap/u/59.0/00D000000000001").unwrap(),
            "https://na1.salesforce.com"
        );
        assert_eq!(
            origin("http://127.0.0.1:8080/services/Soap/u/59.0").unwrap(),
            "http://127.0.0.1:8080"
        );
    }

    #[test]
    fn test_envelope_escapes_and_scopes() {
        let xml = login_envelope("a&b@acme.com", "p<w>", None, Some("00D1"));
        assert!(xml.contains("<n1:username>a&amp;b@acme.com</n1:username>"));
        assert!(xml.contains("<n1:password>p&lt;w&gt;</n1:password>"));
        assert!(xml.contains("<urn:organizationId>00D1</urn:organizationId>"));
        assert!(!xml.contains("CallOptions"));

        let xml = login_envelope("u", "p", Some("etl"), None);
        assert!(xml.contains("<urn:client>etl</urn:client>"));
        assert!(!xml.contains("LoginScopeHeader"));
    }

    #[test]
    fn test_login_response_decodes_entities() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns="urn:partner.soap.sforce.com">
<soapenv:Body><loginResponse><result>
<passwordExpired>false</passwordExpired>
<serverUrl>https://na1.salesforce.com/services/Soap/u/59.0/00D1?a=1&amp;b=2</serverUrl>
<sessionId>00D1!x</sessionId>
<userInfo><userName>me@acme.com</userName></userInfo>
</result></loginResponse></soapenv:Body></soapenv:Envelope>"#;

        let result = parse_login_response(body).unwrap();
        assert_eq!(result.session_id, "00D1!x");
        assert_eq!(
            result.server_url,
            "https://na1.salesforce.com/services/Soap/u/59.0/00D1?a=1&b=2"
        );
    }

    #[test]
    fn test_fault_string_is_unescaped() {
        let body = "<soapenv:Envelope><soapenv:Body><soapenv:Fault>\
                    <faultcode>sf:INVALID_LOGIN</faultcode>\
                    <faultstring>INVALID_LOGIN: user&apos;s password &amp; token</faultstring>\
                    </soapenv:Fault></soapenv:Body></soapenv:Envelope>";

        let err = parse_login_response(body).unwrap_err();
        assert!(matches!(err, Error::Auth { .. }));
        assert!(err
            .to_string()
            .contains("INVALID_LOGIN: user's password & token"));
        assert_eq!(
            soap_fault(body).as_deref(),
            Some("INVALID_LOGIN: user's password & token")
        );
    }

    #[test]
    fn test_login_response_without_result() {
        let body = "<soapenv:Envelope><soapenv:Body></soapenv:Body></soapenv:Envelope>";
        assert!(matches!(parse_login_response(body), Err(Error::Auth { .. })));
        assert!(parse_login_response("not xml at all").is_err());
    }
}
