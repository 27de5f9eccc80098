//! Contract consumed from the TPM primitive layer ("tlcl").
//!
//! Everything in this module describes what the anti-rollback core needs
//! from a low-level TPM command library: typed wrappers over `TPM_Startup`,
//! `TPM_NV_DefineSpace`, and friends. The primitive layer itself -- talking
//! to real TPM hardware over LPC/I2C/SPI -- is out of scope for this crate;
//! [`sim`](crate::sim) provides a software stand-in used by the test suite.

use bitflags::bitflags;
use core::fmt;

/// Maximum size in bytes the core ever reads or writes to an NVRAM space.
pub const MAX_NV_VALUE_SIZE: usize = 64;

bitflags! {
    /// TPM NVRAM space access-control attributes (`TPM_NV_PER_*`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NvPermissions: u32 {
        /// Space becomes read-only for the rest of the boot once
        /// `SetGlobalLock` is called.
        const GLOBALLOCK = 0x8000;
        /// Space may only be written while physical presence is asserted.
        const PPWRITE = 0x0001;
    }
}

/// Status returned by a TPM primitive call. `Success` is the only value that
/// means the command completed; everything else is a failure the caller
/// must handle or propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpmStatus {
    Success,
    /// The 64-write anti-wear limit on an unowned TPM was hit.
    MaxNVWrites,
    /// The referenced NVRAM index does not exist.
    BadIndex,
    /// Any other non-zero status the primitive layer returned, kept as an
    /// opaque code so it can still be surfaced to the caller unchanged.
    Other(u32),
}

impl TpmStatus {
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    pub const fn to_raw(self) -> u32 {
        match self {
            Self::Success => 0,
            Self::MaxNVWrites => 0x0000_0048,
            Self::BadIndex => 0x0000_0002,
            Self::Other(code) => code,
        }
    }

    pub const fn from_raw(code: u32) -> Self {
        match code {
            0 => Self::Success,
            0x0000_0048 => Self::MaxNVWrites,
            0x0000_0002 => Self::BadIndex,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for TpmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::MaxNVWrites => write!(f, "max NV writes exceeded"),
            Self::BadIndex => write!(f, "bad NV index"),
            Self::Other(code) => write!(f, "TPM status 0x{:08x}", code),
        }
    }
}

/// `TpmResult<T>` is `Ok` on `TpmStatus::Success`, `Err` otherwise. Callers
/// within this crate use it the same way the original firmware used
/// `RETURN_ON_FAILURE`: propagate with `?` and stop at the first failure.
pub type TpmResult<T> = Result<T, TpmStatus>;

/// A 32-bit TPM NVRAM space index.
pub type NvIndex = u32;

/// The primitive command set this core requires from the TPM driver.
///
/// Implementors own the actual transport (MMIO, LPC, a software simulator).
/// Every method blocks until the TPM responds; there is no cancellation and
/// no re-entrancy, matching the single-threaded boot context this core runs
/// in.
pub trait Tlcl {
    /// Initializes the command library itself (not the TPM). Idempotent.
    fn lib_init(&mut self) -> TpmResult<()>;

    /// `TPM_Startup`.
    fn startup(&mut self) -> TpmResult<()>;

    /// `TPM_ContinueSelfTest`. Non-blocking: failures surface on later
    /// commands rather than here.
    fn continue_self_test(&mut self) -> TpmResult<()>;

    /// Asserts physical presence for the remainder of the boot (or until
    /// `lock_physical_presence` is called).
    fn assert_physical_presence(&mut self) -> TpmResult<()>;

    /// Reads the `disable` and `deactivated` flags.
    fn get_flags(&mut self) -> TpmResult<(bool, bool)>;

    fn set_enable(&mut self) -> TpmResult<()>;

    fn set_deactivated(&mut self, deactivated: bool) -> TpmResult<()>;

    /// Wipes TPM ownership and any sealed secrets.
    fn force_clear(&mut self) -> TpmResult<()>;

    /// Locks the TPM against defining further NVRAM spaces without physical
    /// presence.
    fn set_nv_locked(&mut self) -> TpmResult<()>;

    fn define_space(
        &mut self,
        index: NvIndex,
        permissions: NvPermissions,
        size: u32,
    ) -> TpmResult<()>;

    fn write(&mut self, index: NvIndex, data: &[u8]) -> TpmResult<()>;

    /// Reads exactly `buf.len()` bytes from `index` into `buf`.
    fn read(&mut self, index: NvIndex, buf: &mut [u8]) -> TpmResult<()>;

    fn get_permissions(&mut self, index: NvIndex) -> TpmResult<NvPermissions>;

    /// One-way latch: all globally-lockable spaces become read-only until
    /// the next power cycle.
    fn set_global_lock(&mut self) -> TpmResult<()>;

    /// Turns physical presence off for the remainder of the boot.
    fn lock_physical_presence(&mut self) -> TpmResult<()>;
}
