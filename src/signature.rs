//! Signature verification seam.
//!
//! The marketplace treats signatures as opaque strings checked by a
//! [`SignatureService`]. The bundled [`HashSigner`] is a deterministic
//! stand-in for development and tests: the "signature" of a document is the
//! SHA-256 of the signer's address and the document, hex encoded. It proves
//! nothing cryptographically and must be replaced at any trust boundary.

use sha2::{Digest, Sha256};

use crate::error::{MarketError, Result};

/// Signs documents and verifies that `signature` covers `document` on
/// behalf of `address`.
pub trait SignatureService: Send + Sync {
    fn verify(&self, document: &str, address: &str, signature: &str) -> Result<()>;

    /// Produce a signature over `document` with the given private key.
    fn sign(&self, document: &str, private_key: &str) -> String;
}

/// Deterministic non-cryptographic signer: sha256(address || 0x00 || document).
/// The "private key" of an address is the address itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashSigner;

impl SignatureService for HashSigner {
    fn verify(&self, document: &str, address: &str, signature: &str) -> Result<()> {
        if self.sign(document, address) == signature {
            Ok(())
        } else {
            Err(MarketError::validation("Invalid signature"))
        }
    }

    fn sign(&self, document: &str, private_key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(private_key.as_bytes());
        hasher.update([0u8]);
        hasher.update(document.as_bytes());
        hex::encode(hasher.finalize())
    }
}
