//! Error types for the anti-rollback core
//!
//! The TPM primitive layer speaks in 32-bit status words; this module lifts
//! that into a proper Rust error type so the rest of the crate can propagate
//! failures with `?` instead of checking integers by hand.

use core::fmt;

use crate::tlcl::TpmStatus;

/// Errors the anti-rollback core can report to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "rollback errors must be handled, not silently discarded"]
pub enum RollbackError {
    /// `disable` or `deactivated` was observed; the fix was applied but only
    /// takes effect after a power cycle. The caller must reboot.
    MustReboot,
    /// `RecoverKernelSpace` failed but `TPM_IS_INITIALIZED` already exists,
    /// so provisioning cannot be safely retried.
    AlreadyInitialized,
    /// `KERNEL_VERSIONS` has the wrong permissions or UID tag: a TPM owner
    /// redefined it out from under us.
    CorruptedState,
    /// The backup kernel counter is ahead of the primary, which the design
    /// asserts can never happen.
    InternalInconsistency,
    /// A status propagated unchanged from the TPM primitive layer.
    Tpm(TpmStatus),
}

/// Result alias for anti-rollback operations.
pub type RollbackResult<T> = Result<T, RollbackError>;

impl RollbackError {
    /// Encode this error as the 32-bit status word the external firmware
    /// boundary (and the original C implementation) expects. `0` is reserved
    /// for success and is never produced by this function.
    pub const fn to_status_code(self) -> u32 {
        match self {
            Self::MustReboot => 0x1001,
            Self::AlreadyInitialized => 0x1002,
            Self::CorruptedState => 0x1003,
            Self::InternalInconsistency => 0x1004,
            Self::Tpm(status) => status.to_raw(),
        }
    }
}

impl fmt::Display for RollbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MustReboot => write!(f, "TPM enable/activation state changed; reboot required"),
            Self::AlreadyInitialized => {
                write!(f, "kernel space recovery failed but spaces are already initialized")
            }
            Self::CorruptedState => {
                write!(f, "kernel versions space has unexpected permissions or UID tag")
            }
            Self::InternalInconsistency => {
                write!(f, "backup kernel counter is ahead of the primary counter")
            }
            Self::Tpm(status) => write!(f, "TPM primitive layer error: {}", status),
        }
    }
}

impl From<TpmStatus> for RollbackError {
    fn from(status: TpmStatus) -> Self {
        Self::Tpm(status)
    }
}
