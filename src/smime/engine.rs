use crate::smime::{self, Config, SmimeError, VerificationResult};
use std::sync::Arc;
use tokio::task;

/// An S/MIME engine that runs the operations of this module on the blocking
/// thread pool of the Tokio runtime.
///
/// Cloning is cheap; clones share the configuration. Concurrent calls are
/// independent of each other.
#[derive(Clone, Debug, Default)]
pub struct SmimeEngine {
    config: Arc<Config>,
}

impl SmimeEngine {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Encrypts text for the holder of a certificate. See [`smime::encrypt`].
    pub async fn encrypt(
        &self,
        plaintext: impl Into<String>,
        certificate_pem: impl Into<String>,
    ) -> Result<String, SmimeError> {
        let (plaintext, certificate_pem) = (plaintext.into(), certificate_pem.into());
        let config = self.config.clone();

        run_blocking(move || smime::encrypt(&plaintext, &certificate_pem, &config)).await
    }

    /// Decrypts an enveloped message. See [`smime::decrypt`].
    pub async fn decrypt(
        &self,
        smime_text: impl Into<String>,
        private_key_pem: impl Into<String>,
    ) -> Result<String, SmimeError> {
        let (smime_text, private_key_pem) = (smime_text.into(), private_key_pem.into());

        run_blocking(move || smime::decrypt(&smime_text, &private_key_pem)).await
    }

    /// Signs text with a detached signature. See [`smime::sign`].
    pub async fn sign(
        &self,
        plaintext: impl Into<String>,
        private_key_pem: impl Into<String>,
        certificate_pem: impl Into<String>,
    ) -> Result<String, SmimeError> {
        let plaintext = plaintext.into();
        let (private_key_pem, certificate_pem) = (private_key_pem.into(), certificate_pem.into());
        let config = self.config.clone();

        run_blocking(move || smime::sign(&plaintext, &private_key_pem, &certificate_pem, &config))
            .await
    }

    /// Signs text, encapsulating it in the signature. See
    /// [`smime::sign_opaque`].
    pub async fn sign_opaque(
        &self,
        plaintext: impl Into<String>,
        private_key_pem: impl Into<String>,
        certificate_pem: impl Into<String>,
    ) -> Result<String, SmimeError> {
        let plaintext = plaintext.into();
        let (private_key_pem, certificate_pem) = (private_key_pem.into(), certificate_pem.into());
        let config = self.config.clone();

        run_blocking(move || {
            smime::sign_opaque(&plaintext, &private_key_pem, &certificate_pem, &config)
        })
        .await
    }

    /// Verifies a signed message. See [`smime::verify`].
    pub async fn verify(
        &self,
        smime_text: impl Into<String>,
        certificate_pem: impl Into<String>,
    ) -> Result<VerificationResult, SmimeError> {
        let (smime_text, certificate_pem) = (smime_text.into(), certificate_pem.into());

        run_blocking(move || smime::verify(&smime_text, &certificate_pem)).await
    }

    pub async fn get_signature_body(
        &self,
        smime_text: impl Into<String>,
    ) -> Result<String, SmimeError> {
        let smime_text = smime_text.into();

        run_blocking(move || smime::get_signature_body(&smime_text)).await
    }
}

async fn run_blocking<F, T>(f: F) -> Result<T, SmimeError>
where
    F: FnOnce() -> Result<T, SmimeError> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| SmimeError::Task(e.to_string()))?
}
