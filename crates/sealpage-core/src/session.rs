//! View-time unlocking with last-submitted-wins semantics
//!
//! Each password submission takes a ticket. Derivation runs on a blocking
//! worker; when it resolves, the result is only rendered if no newer ticket
//! has been issued in the meantime. Older work is never cancelled, its
//! result is just dropped.
//!
//! The ticket check and the render happen under the same lock that issues
//! tickets, so a submission made while a render is in progress waits for it
//! and becomes the latest only once that render is done.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sealpage_crypto::{CryptoError, KeyDerivation, Verifier};
use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::error::SealResult;
use crate::page::LockedPayload;

/// Receives recovered plaintext. The only component that touches output.
pub trait Renderer: Send + Sync {
    fn render(&self, plaintext: &str) -> SealResult<()>;
}

/// Result of one password submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// Tag verified and the renderer received the plaintext
    Unlocked,
    /// No pipeline matched: wrong password or damaged payload
    Rejected,
    /// A newer submission started before this one resolved
    Superseded,
}

impl UnlockOutcome {
    pub fn is_successful(&self) -> bool {
        matches!(self, UnlockOutcome::Unlocked)
    }
}

/// Opaque handle for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

pub struct PageUnlocker<R> {
    kdf: Arc<KeyDerivation>,
    payload: LockedPayload,
    renderer: R,
    latest: Mutex<u64>,
}

impl<R: Renderer> PageUnlocker<R> {
    pub fn new(kdf: Arc<KeyDerivation>, payload: LockedPayload, renderer: R) -> Self {
        Self {
            kdf,
            payload,
            renderer,
            latest: Mutex::new(0),
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Submit a password: take a ticket and run the attempt.
    pub async fn handle_decryption_of_page(
        &self,
        password: SecretString,
    ) -> SealResult<UnlockOutcome> {
        let ticket = self.begin_attempt();
        self.run_attempt(ticket, password).await
    }

    /// Take a ticket, making every earlier ticket stale.
    pub fn begin_attempt(&self) -> Ticket {
        let mut latest = self.lock_latest();
        *latest += 1;
        Ticket(*latest)
    }

    fn lock_latest(&self) -> MutexGuard<'_, u64> {
        // a counter cannot be left half-updated
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Derive, verify, and render for `ticket`.
    ///
    /// `MalformedHex` and `DecryptionFailed` are returned as errors; only a
    /// signature mismatch maps to [`UnlockOutcome::Rejected`].
    pub async fn run_attempt(
        &self,
        ticket: Ticket,
        password: SecretString,
    ) -> SealResult<UnlockOutcome> {
        let kdf = Arc::clone(&self.kdf);
        let salt = self.payload.salt.clone();
        let signed_msg = self.payload.signed_msg.clone();

        let result = tokio::task::spawn_blocking(move || {
            Verifier::new(&kdf).unlock(&password, &salt, &signed_msg)
        })
        .await?;

        let latest = self.lock_latest();
        if *latest != ticket.0 {
            debug!(ticket = ticket.0, "discarding result of superseded unlock attempt");
            return Ok(UnlockOutcome::Superseded);
        }

        match result {
            Ok(decoded) => {
                info!(pipeline = %decoded.pipeline, "page unlocked");
                self.renderer.render(&decoded.plaintext)?;
                Ok(UnlockOutcome::Unlocked)
            }
            Err(CryptoError::SignatureMismatch) => {
                debug!(ticket = ticket.0, "incorrect password");
                Ok(UnlockOutcome::Rejected)
            }
            Err(e) => {
                warn!(error = %e, "unlock failed");
                Err(e.into())
            }
        }
    }
}
