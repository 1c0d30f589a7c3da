//! Installer download over a pinned-TLS transport.
//!
//! The toolchain installer is fetched with an HTTPS-only client whose minimum
//! protocol version is fixed by configuration. Plain HTTP URLs, redirects to
//! plain HTTP, and servers that cannot negotiate the pinned version all fail.

use std::error::Error;
use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::TlsVersion;
use crate::execute::types::ExecuteError;
use crate::util::hash::hash_bytes;

impl From<TlsVersion> for reqwest::tls::Version {
  fn from(version: TlsVersion) -> Self {
    match version {
      TlsVersion::Tls12 => reqwest::tls::Version::TLS_1_2,
      TlsVersion::Tls13 => reqwest::tls::Version::TLS_1_3,
    }
  }
}

/// Download `url` to `dest`.
///
/// If `expected_sha256` is given the body is verified before anything is
/// written. Returns the SHA-256 of the downloaded bytes.
pub async fn fetch_installer(
  url: &str,
  min_tls: TlsVersion,
  expected_sha256: Option<&str>,
  dest: &Path,
) -> Result<String, ExecuteError> {
  if !url.starts_with("https://") {
    return Err(ExecuteError::InsecureUrl(url.to_string()));
  }

  info!(url = %url, min_tls = min_tls.as_str(), "fetching installer");

  let client = installer_client(min_tls).map_err(|e| fetch_failed(url, &e))?;
  download(&client, url, expected_sha256, dest).await
}

/// HTTPS-only client that refuses anything below `min_tls`.
fn installer_client(min_tls: TlsVersion) -> Result<reqwest::Client, reqwest::Error> {
  reqwest::Client::builder()
    .https_only(true)
    .min_tls_version(min_tls.into())
    .build()
}

async fn download(
  client: &reqwest::Client,
  url: &str,
  expected_sha256: Option<&str>,
  dest: &Path,
) -> Result<String, ExecuteError> {
  let response = client.get(url).send().await.map_err(|e| fetch_failed(url, &e))?;

  if !response.status().is_success() {
    return Err(ExecuteError::FetchFailed {
      url: url.to_string(),
      message: format!("HTTP {}", response.status()),
    });
  }

  let bytes = response.bytes().await.map_err(|e| fetch_failed(url, &e))?;

  let actual_hash = hash_bytes(&bytes);

  if let Some(expected) = expected_sha256 {
    if !actual_hash.eq_ignore_ascii_case(expected) {
      return Err(ExecuteError::HashMismatch {
        url: url.to_string(),
        expected: expected.to_string(),
        actual: actual_hash,
      });
    }
    debug!(sha256 = %actual_hash, "installer digest verified");
  }

  if let Some(parent) = dest.parent() {
    fs::create_dir_all(parent).await?;
  }
  let mut file = fs::File::create(dest).await?;
  file.write_all(&bytes).await?;
  file.flush().await?;

  info!(path = ?dest, size = bytes.len(), sha256 = %actual_hash, "installer downloaded");

  Ok(actual_hash)
}

/// reqwest's top-level message hides the TLS cause; keep the whole chain.
fn fetch_failed(url: &str, err: &(dyn Error + 'static)) -> ExecuteError {
  let mut message = err.to_string();
  let mut source = err.source();
  while let Some(cause) = source {
    message.push_str(": ");
    message.push_str(&cause.to_string());
    source = cause.source();
  }
  ExecuteError::FetchFailed {
    url: url.to_string(),
    message,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[tokio::test]
  async fn rejects_plain_http() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("rustup-init.sh");

    let result = fetch_installer("http://sh.rustup.rs", TlsVersion::Tls12, None, &dest).await;

    assert!(matches!(result, Err(ExecuteError::InsecureUrl(_))));
    assert!(!dest.exists());
  }

  #[tokio::test]
  async fn rejects_other_schemes() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("rustup-init.sh");

    let result = fetch_installer("file:///etc/passwd", TlsVersion::Tls13, None, &dest).await;

    assert!(matches!(result, Err(ExecuteError::InsecureUrl(_))));
  }

  #[tokio::test]
  async fn unreachable_host_is_fetch_failure() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("rustup-init.sh");

    // .invalid is reserved and never resolves
    let result = fetch_installer("https://installer.invalid/rustup-init.sh", TlsVersion::Tls12, None, &dest).await;

    assert!(matches!(result, Err(ExecuteError::FetchFailed { .. })));
    assert!(!dest.exists());
  }

  /// A loopback server that answers every ClientHello with a TLS 1.2
  /// ServerHello and then closes its side.
  async fn tls12_only_server() -> std::net::SocketAddr {
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[rustfmt::skip]
    const SERVER_HELLO: &[u8] = &[
      0x16, 0x03, 0x03, 0x00, 0x2c, // handshake record, TLS 1.2
      0x02, 0x00, 0x00, 0x28, // ServerHello
      0x03, 0x03, // server_version TLS 1.2
      0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10,
      0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e, 0x1f, 0x20,
      0x00, // session id
      0xc0, 0x2f, // ECDHE_RSA_WITH_AES_128_GCM_SHA256
      0x00, // null compression
      0x00, 0x00, // no extensions
    ];

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      while let Ok((mut socket, _)) = listener.accept().await {
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let _ = socket.write_all(SERVER_HELLO).await;
        let _ = socket.shutdown().await;
        while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
      }
    });
    addr
  }

  fn client_without_proxy(min_tls: TlsVersion) -> reqwest::Client {
    temp_env::with_vars_unset(["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"], || {
      installer_client(min_tls).unwrap()
    })
  }

  #[tokio::test]
  #[serial_test::serial]
  async fn server_below_pinned_version_is_refused() {
    let addr = tls12_only_server().await;
    let url = format!("https://{}/rustup-init.sh", addr);
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("rustup-init.sh");

    let pinned = download(&client_without_proxy(TlsVersion::Tls13), &url, None, &dest).await;
    let relaxed = download(&client_without_proxy(TlsVersion::Tls12), &url, None, &dest).await;

    let message = |result: Result<String, ExecuteError>| match result {
      Err(ExecuteError::FetchFailed { message, .. }) => message,
      other => panic!("expected a fetch failure, got {:?}", other),
    };
    let (pinned, relaxed) = (message(pinned), message(relaxed));
    assert!(pinned.to_lowercase().contains("version"), "{}", pinned);
    assert!(!relaxed.contains("VersionIsDisabled"), "{}", relaxed);
    assert!(!dest.exists());
  }

  #[test]
  fn client_builds_for_each_pin() {
    assert!(installer_client(TlsVersion::Tls12).is_ok());
    assert!(installer_client(TlsVersion::Tls13).is_ok());
  }

  #[test]
  fn tls_version_maps_to_reqwest() {
    assert_eq!(
      reqwest::tls::Version::from(TlsVersion::Tls12),
      reqwest::tls::Version::TLS_1_2
    );
    assert_eq!(
      reqwest::tls::Version::from(TlsVersion::Tls13),
      reqwest::tls::Version::TLS_1_3
    );
  }
}
