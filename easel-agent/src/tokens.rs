//! Token issuance against the canvas authorization endpoint.
//!
//! A subject proves ownership with a paste code; the endpoint answers
//! with a fresh token, which is appended to the tokens file as one
//! `["<token>", uid]` record.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use easel_core::{Credential, PaintError, Token};

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    uid: u32,
    paste: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    data: TokenData,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    token: String,
}

pub struct TokenIssuer {
    client: reqwest::Client,
    url: String,
    tokens_file: PathBuf,
}

impl TokenIssuer {
    pub fn new(url: impl Into<String>, tokens_file: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            tokens_file: tokens_file.into(),
        }
    }

    /// Request a token for `uid` and record it.
    pub async fn issue(&self, uid: u32, paste: &str) -> Result<Credential, PaintError> {
        let paste = paste.trim();
        if paste.is_empty() {
            return Err(PaintError::InvalidRecord("empty paste code".into()));
        }
        let response = self
            .client
            .post(&self.url)
            .json(&TokenRequest { uid, paste })
            .send()
            .await?
            .error_for_status()?;
        let body: TokenResponse = response.json().await?;
        let token: Token = body.data.token.parse()?;
        let credential = Credential::new(uid, token)?;
        append_record(&self.tokens_file, &credential)?;
        tracing::info!(uid, "token issued");
        Ok(credential)
    }
}

/// Append one record line to the tokens file, creating it if needed.
pub fn append_record(path: &Path, credential: &Credential) -> Result<(), PaintError> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{}", credential.to_record())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    const TOKEN: &str = "0123456789abcdef0123456789abcdef";

    /// Answer one HTTP request with `status` and `body`; returns the request text.
    async fn one_shot_server(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/api/auth/gettoken", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.ends_with(b"}") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (url, server)
    }

    #[tokio::test]
    async fn issued_token_is_appended() {
        let body = r#"{"data":{"token":"01234567-89ab-cdef-0123-456789abcdef"}}"#;
        let (url, server) = one_shot_server("200 OK", body).await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("tokens.txt");
        std::fs::write(&file, "[\"ffffffffffffffffffffffffffffffff\", 1]\n").unwrap();

        let issuer = TokenIssuer::new(url, &file);
        let credential = issuer.issue(77, " paste-code ").await.unwrap();
        assert_eq!(credential.uid, 77);
        assert_eq!(credential.token, TOKEN.parse::<Token>().unwrap());

        let request = server.await.unwrap();
        assert!(request.contains(r#""uid":77"#), "{request}");
        assert!(request.contains(r#""paste":"paste-code""#), "{request}");

        let text = std::fs::read_to_string(&file).unwrap();
        let parsed = easel_core::credential::parse_records(&text);
        assert_eq!(parsed.credentials.len(), 2);
        assert_eq!(parsed.credentials[1], credential);
    }

    #[tokio::test]
    async fn rejected_request_is_an_error() {
        let (url, _server) = one_shot_server("403 Forbidden", "{}").await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("tokens.txt");
        let issuer = TokenIssuer::new(url, &file);
        let err = issuer.issue(5, "paste").await.unwrap_err();
        assert!(matches!(err, PaintError::Http(_)), "{err:?}");
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn empty_paste_is_rejected_locally() {
        let issuer = TokenIssuer::new("http://127.0.0.1:9/unused", "unused.txt");
        assert!(issuer.issue(5, "  ").await.is_err());
    }

    #[test]
    fn append_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("new.txt");
        let credential = Credential::new(9, TOKEN.parse().unwrap()).unwrap();
        append_record(&file, &credential).unwrap();
        append_record(&file, &credential).unwrap();
        let text = std::fs::read_to_string(&file).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert_eq!(Credential::parse_record(text.lines().next().unwrap()).unwrap(), credential);
    }
}
