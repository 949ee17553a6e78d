// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::ClientBuilder;
use std::error::Error;
#[cfg(feature = "fips")]
use tracing::debug;
#[cfg(not(feature = "fips"))]
use tracing::warn;

/// Server certificate policy applied to every collector connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertificateValidation {
    /// Standard chain and hostname verification.
    #[default]
    Enforce,
    /// Trust every certificate and every hostname. Development only.
    Disable,
}

impl CertificateValidation {
    /// Maps the adapter's "disable certificate validation" flag onto a policy.
    #[must_use]
    pub fn from_disable_flag(disable: bool) -> Self {
        if disable {
            Self::Disable
        } else {
            Self::Enforce
        }
    }
}

/// Installs the process-wide crypto provider for TLS (FIPS mode).
///
/// The AWS-LC FIPS provider becomes the rustls default unless a provider is
/// already installed. Idempotent.
#[cfg(feature = "fips")]
pub fn prepare_client_provider() -> Result<(), Box<dyn Error>> {
    if rustls::crypto::CryptoProvider::get_default().is_some() {
        return Ok(());
    }
    rustls::crypto::default_fips_provider()
        .install_default()
        .map_err(|e| format!("Failed to set up fips provider: {e:?}").into())
}

/// No-op outside FIPS mode; reqwest brings its own rustls provider.
#[cfg(not(feature = "fips"))]
#[allow(clippy::unnecessary_wraps)]
pub fn prepare_client_provider() -> Result<(), Box<dyn Error>> {
    Ok(())
}

/// Creates a reqwest client builder with the given certificate policy.
/// Uses reqwest's default rustls TLS implementation.
#[cfg(not(feature = "fips"))]
pub fn create_reqwest_client_builder(
    validation: CertificateValidation,
) -> Result<ClientBuilder, Box<dyn Error>> {
    let builder = reqwest::Client::builder().use_rustls_tls();
    Ok(apply_validation(builder, validation))
}

/// Creates a reqwest client builder with FIPS-compliant TLS configuration.
/// This version loads native root certificates and verifies FIPS compliance.
/// Disabling certificate validation is refused in this mode.
#[cfg(feature = "fips")]
pub fn create_reqwest_client_builder(
    validation: CertificateValidation,
) -> Result<ClientBuilder, Box<dyn Error>> {
    if validation == CertificateValidation::Disable {
        return Err("Certificate validation cannot be disabled in FIPS mode".into());
    }

    prepare_client_provider()?;
    let provider =
        rustls::crypto::CryptoProvider::get_default().ok_or("No crypto provider configured")?;

    if !provider.fips() {
        return Err("Crypto provider is not FIPS-compliant".into());
    }

    let mut root_cert_store = rustls::RootCertStore::empty();
    let native_certs = rustls_native_certs::load_native_certs();
    let mut valid_count = 0;
    for cert in native_certs.certs {
        match root_cert_store.add(cert) {
            Ok(()) => valid_count += 1,
            Err(err) => {
                debug!("Failed to parse certificate: {:?}", err);
            }
        }
    }
    if valid_count == 0 {
        return Err("No valid certificates found in native root store".into());
    }

    let versions = rustls::ALL_VERSIONS.to_vec();
    let config = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(&versions)
        .map_err(|_| "Failed to set protocol versions")?
        .with_root_certificates(root_cert_store)
        .with_no_client_auth();

    if !config.fips() {
        return Err("The final TLS configuration is not FIPS-compliant".into());
    }
    debug!("Client builder is configured with FIPS.");

    Ok(reqwest::Client::builder().use_preconfigured_tls(config))
}

#[cfg(not(feature = "fips"))]
fn apply_validation(builder: ClientBuilder, validation: CertificateValidation) -> ClientBuilder {
    match validation {
        CertificateValidation::Enforce => builder,
        CertificateValidation::Disable => {
            warn!("HEC | Certificate validation is disabled, every server certificate and hostname is trusted");
            builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
        }
    }
}
