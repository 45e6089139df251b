use std::{fs, path::Path, sync::Arc};

use anyhow::{Context, anyhow};
use rustls::{ClientConfig, RootCertStore, pki_types::CertificateDer, pki_types::pem::PemObject};

/// Installs aws-lc-rs as the process wide rustls provider, which the relay
/// connection and [`client_config`] both build on. Call once, before the
/// first `wss://` connection.
pub fn init() -> anyhow::Result<()> {
    let provider = rustls::crypto::aws_lc_rs::default_provider();
    if provider.install_default().is_err() {
        return Err(anyhow!("a rustls crypto provider is already installed"));
    }
    Ok(())
}

/// TLS config trusting only the given CA, for relays behind a private CA.
/// `None` keeps the default webpki roots.
pub fn client_config(ca_cert_path: Option<&Path>) -> anyhow::Result<Option<Arc<ClientConfig>>> {
    let Some(path) = ca_cert_path else {
        return Ok(None);
    };

    let roots = root_store(path)?;
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Some(Arc::new(config)))
}

fn root_store(path: &Path) -> anyhow::Result<RootCertStore> {
    let pem = fs::read(path)
        .with_context(|| format!("failed to read CA certificate at path: {}", path.display()))?;

    let mut roots = RootCertStore::empty();
    for cert in CertificateDer::pem_slice_iter(&pem) {
        let cert = cert.with_context(|| format!("{} is not valid PEM", path.display()))?;
        roots
            .add(cert)
            .context("failed to add CA certificate to the root store")?;
    }

    if roots.is_empty() {
        return Err(anyhow!("no certificates found in {}", path.display()));
    }
    Ok(roots)
}
