//! Anti-rollback firmware core
//!
//! TPM-backed monotonic version counters for a verified boot chain. Two
//! counters are kept, firmware and kernel, each a `(key_version, version)`
//! pair packed into a 32-bit NVRAM value the TPM will not let firmware roll
//! backward without going through recovery.
//!
//! The crate is organized the way the boot sequence itself is: a thin
//! hardware trait ([`tlcl`]) at the bottom, NVRAM layout constants
//! ([`nvram`]), then one module per step of `RollbackFirmwareSetup` /
//! `RollbackKernelRecovery` ([`safe_write`], [`provision`],
//! [`kernel_recovery`], [`kernel_backup`], [`devmode`]), sequenced by
//! [`boot`], with [`api`] exposing the eight functions firmware actually
//! calls.

#![no_std]

// `sync::once_lock` leaks a `Box` per global to hand out `'static`
// references without an allocator-free alternative; the test-only software
// TPM simulator (`sim`) needs `Vec`/`BTreeMap` on top of that.
extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod api;
pub(crate) mod boot;
pub(crate) mod devmode;
pub mod error;
pub(crate) mod kernel_backup;
pub(crate) mod kernel_recovery;
pub mod log_service;
pub mod nvram;
pub(crate) mod provision;
pub(crate) mod safe_write;
pub mod sync;
pub mod tlcl;

#[cfg(any(test, feature = "test-util"))]
pub mod sim;

pub use api::{
    rollback_firmware_lock, rollback_firmware_read, rollback_firmware_setup,
    rollback_firmware_write, rollback_kernel_lock, rollback_kernel_read, rollback_kernel_recovery,
    rollback_kernel_write,
};
pub use boot::BootContext;
pub use error::{RollbackError, RollbackResult};
pub use tlcl::Tlcl;
