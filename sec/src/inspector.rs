use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use log::{debug, info, warn};
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, OwnedTrustAnchor, RootCertStore, ServerName};
use tokio::io::AsyncWriteExt as _;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::parse_x509_certificate;

use crate::error::{ConfigError, InspectError};
use crate::validity::CertificateWindow;

/// Bound on establishing the TCP connection and finishing the TLS handshake
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Which peer certificate is taken as the leaf
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, clap::ValueEnum)]
pub enum LeafSelection {
    /// First certificate presented by the peer
    #[default]
    First,
    /// First certificate whose names match the requested host
    Hostname,
}

/// Accepts any certificate chain. Handshake signatures are still checked.
struct NoVerification;

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

/// Performs one TLS handshake and reads the validity window of the leaf certificate
pub struct Inspector {
    config: Arc<ClientConfig>,
    connect_timeout: Duration,
    leaf_selection: LeafSelection,
    skip_tls_verify: bool,
}

impl fmt::Debug for Inspector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inspector")
            .field("connect_timeout", &self.connect_timeout)
            .field("leaf_selection", &self.leaf_selection)
            .field("skip_tls_verify", &self.skip_tls_verify)
            .finish()
    }
}

impl Default for Inspector {
    fn default() -> Inspector {
        Inspector::new(false)
    }
}

impl Inspector {
    /// Create an inspector, optionally skipping chain and hostname verification
    ///
    /// ```
    /// # use sec::Inspector;
    /// let verified = Inspector::new(false);
    /// let self_signed = Inspector::new(true);
    /// ```
    pub fn new(skip_tls_verify: bool) -> Inspector {
        Inspector::with_root_store(skip_tls_verify, bundled_roots())
    }

    /// Create an inspector that trusts the PEM encoded CA certificates in `pem`
    /// on top of the bundled roots, for hosts signed by an internal CA.
    ///
    /// `source` names the input in error messages.
    pub fn with_ca_pem(
        skip_tls_verify: bool,
        pem: &[u8],
        source: &str,
    ) -> Result<Inspector, ConfigError> {
        let certificates = rustls_pemfile::certs(&mut &pem[..])
            .map_err(|_| ConfigError::NoCaCertificate(source.to_string()))?;
        let mut root_store = bundled_roots();
        let (added, ignored) = root_store.add_parsable_certificates(&certificates);
        if added == 0 {
            return Err(ConfigError::NoCaCertificate(source.to_string()));
        }
        info!("trusting {added} CA certificates from {source}");
        if ignored > 0 {
            warn!("ignored {ignored} unparsable CA certificates from {source}");
        }
        Ok(Inspector::with_root_store(skip_tls_verify, root_store))
    }

    /// Like [`Inspector::with_ca_pem`], reading the certificates from `path`
    pub fn with_ca_file(skip_tls_verify: bool, path: &Path) -> Result<Inspector, ConfigError> {
        let pem = fs::read(path).map_err(|source| ConfigError::CaFile {
            path: path.to_path_buf(),
            source,
        })?;
        Inspector::with_ca_pem(skip_tls_verify, &pem, &path.display().to_string())
    }

    fn with_root_store(skip_tls_verify: bool, root_store: RootCertStore) -> Inspector {
        // safe defaults offer TLS 1.3 and TLS 1.2 only
        let mut config = ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        if skip_tls_verify {
            config
                .dangerous()
                .set_certificate_verifier(Arc::new(NoVerification));
        }

        Inspector {
            config: Arc::new(config),
            connect_timeout: CONNECT_TIMEOUT,
            leaf_selection: LeafSelection::default(),
            skip_tls_verify,
        }
    }

    /// Override the connect-level timeout
    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Override how the leaf certificate is picked from the peer chain
    pub fn leaf_selection(mut self, leaf_selection: LeafSelection) -> Self {
        self.leaf_selection = leaf_selection;
        self
    }

    /// Connect to `domain_name:port` and read the leaf certificate's validity window.
    ///
    /// `token` is only consulted before dialing; an in-flight handshake is left
    /// to finish or hit the connect timeout.
    pub async fn inspect(
        &self,
        domain_name: &str,
        port: u16,
        token: &CancellationToken,
    ) -> Result<CertificateWindow, InspectError> {
        if token.is_cancelled() {
            return Err(InspectError::Cancelled);
        }

        info!("testing SSL expiration on host {domain_name} over port {port}");
        let server_name = ServerName::try_from(domain_name)
            .map_err(|_| InspectError::DnsName(domain_name.to_string()))?;
        let connector = TlsConnector::from(self.config.clone());
        let address = format!("{domain_name}:{port}");

        let handshake = async {
            let stream = TcpStream::connect(&address)
                .await
                .map_err(|source| InspectError::Connect {
                    address: address.clone(),
                    source,
                })?;
            connector
                .connect(server_name, stream)
                .await
                .map_err(|source| InspectError::Handshake {
                    address: address.clone(),
                    source,
                })
        };
        let mut stream = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| InspectError::Timeout {
                address: address.clone(),
                timeout: self.connect_timeout,
            })??;

        let (_, conn) = stream.get_ref();
        let window = match conn.peer_certificates() {
            Some(certificates) => self.select_window(domain_name, certificates),
            None => Err(InspectError::NoPeerCertificate(address.clone())),
        };

        if let Err(e) = stream.shutdown().await {
            debug!("failed to close connection to {address}: {e}");
        }

        let window = window?;
        info!("certificate for {domain_name} is {window}");
        Ok(window)
    }

    fn select_window(
        &self,
        domain_name: &str,
        certificates: &[Certificate],
    ) -> Result<CertificateWindow, InspectError> {
        match self.leaf_selection {
            LeafSelection::First => {
                let certificate = certificates
                    .first()
                    .ok_or_else(|| InspectError::NoPeerCertificate(domain_name.to_string()))?;
                let (_, cert) = parse_x509_certificate(certificate.as_ref())
                    .map_err(|e| InspectError::Parse(e.to_string()))?;
                CertificateWindow::try_from(&cert)
            }
            LeafSelection::Hostname => {
                for certificate in certificates {
                    let (_, cert) = parse_x509_certificate(certificate.as_ref())
                        .map_err(|e| InspectError::Parse(e.to_string()))?;
                    if matches_host(&cert, domain_name) {
                        return CertificateWindow::try_from(&cert);
                    }
                }
                Err(InspectError::NoMatchingCertificate(domain_name.to_string()))
            }
        }
    }
}

fn bundled_roots() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    root_store.add_server_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.0.iter().map(|ta| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));
    root_store
}

/// Does any subject alternative DNS name, or the common name when there are
/// none, match `host`?
fn matches_host(cert: &X509Certificate<'_>, host: &str) -> bool {
    let dns_names: Vec<&str> = match cert.subject_alternative_name() {
        Ok(Some(san)) => san
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(name) => Some(*name),
                _ => None,
            })
            .collect(),
        _ => vec![],
    };
    if !dns_names.is_empty() {
        return dns_names.iter().any(|pattern| name_matches(pattern, host));
    }
    cert.subject()
        .iter_common_name()
        .filter_map(|cn| cn.as_str().ok())
        .any(|cn| name_matches(cn, host))
}

fn name_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim_end_matches('.');
    let host = host.trim_end_matches('.');
    match pattern.strip_prefix("*.") {
        Some(suffix) => match host.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest.eq_ignore_ascii_case(suffix),
            None => false,
        },
        None => pattern.eq_ignore_ascii_case(host),
    }
}
