//! Credentials taken from GOOGLE_APPLICATION_CREDENTIALS_JSON
//!
//! Every test in this file that builds a client from scratch reads the
//! process environment, so they all live in one test function and the
//! variable is never mutated while another test reads it.

mod common;

use std::sync::Arc;

use common::*;
use gcs_vfs::client::{ClientOption, MemoryClient};
use gcs_vfs::credentials::{with_env_credentials, CREDENTIALS_ENV};
use gcs_vfs::fs::Fs;
use gcs_vfs::{GcsFs, Result, VfsError};

#[tokio::test]
async fn test_environment_credentials() -> Result<()> {
    // Raw JSON object: passed through byte for byte
    std::env::set_var(CREDENTIALS_ENV, r#"{"type":"service_account"}"#);
    assert_eq!(
        with_env_credentials(Vec::new()),
        vec![ClientOption::CredentialsJson(
            br#"{"type":"service_account"}"#.to_vec()
        )]
    );
    let fs = GcsFs::new(Vec::new()).await?;
    assert_eq!(fs.name(), "GcsFs");

    // Quoted JSON: the unquoted form is used
    std::env::set_var(CREDENTIALS_ENV, r#""{\"type\":\"service_account\"}""#);
    assert_eq!(
        with_env_credentials(Vec::new()),
        vec![ClientOption::CredentialsJson(
            br#"{"type":"service_account"}"#.to_vec()
        )]
    );
    GcsFs::new_with_separator("|", Vec::new()).await?;

    // Garbage: skipped, construction still succeeds
    std::env::set_var(CREDENTIALS_ENV, "definitely not json");
    assert!(with_env_credentials(Vec::new()).is_empty());
    GcsFs::new(Vec::new()).await?;

    // Existing client: the supplied client is used as-is
    std::env::set_var(CREDENTIALS_ENV, r#"{"type":"service_account"}"#);
    let client = Arc::new(MemoryClient::new());
    let fs = GcsFs::from_client(client.clone());
    write_str(&fs, "/bucket/seen", "via memory").await?;
    let again = GcsFs::from_client(client);
    assert_eq!(read_string(&again, "/bucket/seen").await?, "via memory");

    // Empty: nothing appended, caller options kept in order
    std::env::set_var(CREDENTIALS_ENV, "");
    let options = vec![ClientOption::ProxyUrl("http://proxy:3128".to_string())];
    assert_eq!(with_env_credentials(options.clone()), options);

    // Both from-scratch constructors forward the environment payload, so an
    // unsupported credential type fails either one
    std::env::set_var(
        CREDENTIALS_ENV,
        r#"{"type":"authorized_user","refresh_token":"t"}"#,
    );
    assert!(matches!(
        GcsFs::new(Vec::new()).await,
        Err(VfsError::ClientConstruction(_))
    ));
    assert!(matches!(
        GcsFs::new_with_separator("|", Vec::new()).await,
        Err(VfsError::ClientConstruction(_))
    ));

    std::env::remove_var(CREDENTIALS_ENV);

    // Explicit options are validated strictly, unlike the environment payload
    let result = GcsFs::new(vec![ClientOption::CredentialsJson(b"[1, 2]".to_vec())]).await;
    assert!(matches!(result, Err(VfsError::ClientConstruction(_))));

    let result = GcsFs::new(vec![ClientOption::CredentialsFile(
        "/nonexistent/gcs-vfs/key.json".into(),
    )])
    .await;
    assert!(matches!(result, Err(VfsError::ClientConstruction(_))));
    Ok(())
}
