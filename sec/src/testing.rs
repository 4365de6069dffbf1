//! Local TLS server backed by a freshly minted self-signed certificate

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rcgen::CertificateParams;
use time::OffsetDateTime;
use tokio::io::AsyncReadExt as _;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use crate::validity::CertificateWindow;

pub(crate) struct TestCertificate {
    der: Vec<u8>,
    key: Vec<u8>,
    pub(crate) pem: String,
    pub(crate) window: CertificateWindow,
}

fn offset_date_time(t: DateTime<Utc>) -> (OffsetDateTime, DateTime<Utc>) {
    let seconds = t.timestamp();
    (
        OffsetDateTime::from_unix_timestamp(seconds).unwrap(),
        Utc.timestamp_opt(seconds, 0).unwrap(),
    )
}

pub(crate) fn self_signed(
    names: &[&str],
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
) -> TestCertificate {
    let (nb, not_before) = offset_date_time(not_before);
    let (na, not_after) = offset_date_time(not_after);

    let mut params =
        CertificateParams::new(names.iter().map(|n| n.to_string()).collect::<Vec<_>>());
    params.not_before = nb;
    params.not_after = na;
    let cert = rcgen::Certificate::from_params(params).unwrap();

    TestCertificate {
        der: cert.serialize_der().unwrap(),
        key: cert.serialize_private_key_der(),
        pem: cert.serialize_pem().unwrap(),
        window: CertificateWindow::new(not_before, not_after),
    }
}

/// Accept a single TLS connection on an ephemeral port and hold it until the
/// client closes.
pub(crate) async fn serve_once(cert: &TestCertificate) -> u16 {
    let config = rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(
            vec![rustls::Certificate(cert.der.clone())],
            rustls::PrivateKey(cert.key.clone()),
        )
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            if let Ok(mut tls) = acceptor.accept(stream).await {
                let mut buf = [0u8; 16];
                let _ = tls.read(&mut buf).await;
            }
        }
    });
    port
}
