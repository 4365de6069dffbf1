#![deny(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications
)]

//! SSL Expiry Check

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use chrono::Utc;
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use tokio_util::sync::CancellationToken;

use sec::{
    deliver, CheckOutcome, CheckRequest, Checker, ConfigError, Inspector, KuberhealthyReporter,
    LeafSelection, LogReporter, Orchestrator, RawRequest, Reporter,
};

#[derive(Debug, Default, Parser)]
#[command(author, about, version)]
struct Opts {
    /// Domain name to check
    #[arg(long, env = "DOMAIN_NAME")]
    domain_name: Option<String>,
    /// TLS port to check
    #[arg(long, env = "PORT")]
    port: Option<String>,
    /// Warn when the certificate expires within this many days
    #[arg(long, env = "DAYS")]
    days: Option<String>,
    /// Skip certificate chain and hostname verification (true/false)
    #[arg(long, env = "INSECURE")]
    insecure: Option<String>,
    /// Check deadline in seconds since Unix epoch
    #[arg(long, env = "KH_CHECK_RUN_DEADLINE")]
    deadline: Option<String>,
    /// Timeout in seconds to connect and finish the TLS handshake
    #[arg(long, env = "CONNECT_TIMEOUT", default_value = "10")]
    connect_timeout: u64,
    /// PEM file with CA certificates to trust on top of the bundled roots
    #[arg(long, env = "CA_CERT_FILE")]
    ca_cert_file: Option<PathBuf>,
    /// How the leaf certificate is picked from the peer chain
    #[arg(long, env = "LEAF_SELECTION", value_enum, default_value_t)]
    leaf_selection: LeafSelection,
    /// Report the outcome to this URL instead of the log
    #[arg(long, env = "KH_REPORTING_URL")]
    reporting_url: Option<String>,
    /// Run identifier sent along with the report
    #[arg(long, env = "KH_RUN_UUID")]
    run_uuid: Option<String>,
}

impl Opts {
    fn raw_request(&self) -> RawRequest<'_> {
        RawRequest {
            domain_name: self.domain_name.as_deref(),
            port: self.port.as_deref(),
            days: self.days.as_deref(),
            insecure: self.insecure.as_deref(),
            deadline: self.deadline.as_deref(),
        }
    }

    fn reporting_url(&self) -> Option<&str> {
        self.reporting_url.as_deref().filter(|url| !url.is_empty())
    }

    fn reporter(&self) -> Box<dyn Reporter> {
        match self.reporting_url() {
            Some(url) => Box::new(KuberhealthyReporter::new(url, self.run_uuid.clone())),
            None => Box::new(LogReporter),
        }
    }

    fn ca_cert_file(&self) -> Option<&PathBuf> {
        self.ca_cert_file
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    fn checker(&self, request: CheckRequest) -> Result<Checker, ConfigError> {
        let inspector = match self.ca_cert_file() {
            Some(path) => Inspector::with_ca_file(request.skip_tls_verify, path)?,
            None => Inspector::new(request.skip_tls_verify),
        }
        .connect_timeout(Duration::from_secs(self.connect_timeout))
        .leaf_selection(self.leaf_selection);
        let orchestrator = Orchestrator::new(request.deadline, Utc::now());
        Ok(Checker::with_parts(request, inspector, orchestrator))
    }

    /// Without a harness the exit status carries the result. The reason has
    /// already been logged by the reporter.
    fn exit_status(&self, outcome: &CheckOutcome) -> anyhow::Result<()> {
        if self.reporting_url().is_none() && !outcome.is_healthy() {
            bail!("check failed");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let opts: Opts = Opts::parse();
    let request = CheckRequest::parse(&opts.raw_request())?;
    let checker = opts.checker(request)?;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => trigger.cancel(),
            Err(e) => error!("failed to listen for signals: {e}"),
        }
    });

    let outcome = checker.run(&shutdown).await;
    deliver(opts.reporter(), outcome.clone()).await?;
    opts.exit_status(&outcome)?;
    info!("done");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut int = signal(SignalKind::interrupt())?;
    let mut term = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = int.recv() => info!("SIGINT received"),
        _ = term.recv() => info!("SIGTERM received"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received");
    Ok(())
}
