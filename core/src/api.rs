//! Component H: the public API surface (`§4.H`).
//!
//! These eight functions are the entire contract the firmware's verified
//! boot chain consumes from this crate. Firmware calls `rollback_firmware_setup`
//! (normal boot) or `rollback_kernel_recovery` (recovery boot) exactly once;
//! the returned [`BootContext`] is threaded into the kernel Read/Write/Lock
//! calls for the rest of that boot.

use crate::boot::{self, BootContext};
use crate::error::RollbackResult;
use crate::nvram;
use crate::safe_write::safe_write;
use crate::tlcl::Tlcl;

/// Splits a combined 32-bit counter into (key_version, version).
///
/// The on-disk byte order is little-endian, fixed across this provisioning
/// image (`DESIGN.md`): the NVRAM image is meant to be portable across
/// devices that share firmware, not just self-consistent on one.
fn split_combined(combined: u32) -> (u16, u16) {
    ((combined >> 16) as u16, combined as u16)
}

/// Packs (key_version, version) into the on-disk 32-bit representation.
///
/// The original firmware used `(key_version << 16) & version`, which is a
/// bitwise AND and zeroes out everything but the bits the two operands
/// happen to share -- almost certainly a bug, since a version of 0 would
/// erase the key version entirely. This uses the evidently-intended
/// bitwise OR; see `DESIGN.md` for the discrepancy this corrects.
fn pack_combined(key_version: u16, version: u16) -> u32 {
    ((key_version as u32) << 16) | (version as u32)
}

/// `RollbackFirmwareSetup`: `SetupTPM(recovery=false, developer=developer_mode)`.
pub fn rollback_firmware_setup(
    tpm: &mut impl Tlcl,
    developer_mode: bool,
) -> RollbackResult<BootContext> {
    boot::setup_tpm(tpm, false, developer_mode)
}

/// `RollbackFirmwareRead`: reads `FIRMWARE_VERSIONS` and splits it.
pub fn rollback_firmware_read(tpm: &mut impl Tlcl) -> RollbackResult<(u16, u16)> {
    let mut buf = [0u8; nvram::VERSION_SIZE];
    tpm.read(nvram::FIRMWARE_VERSIONS, &mut buf)?;
    Ok(split_combined(u32::from_le_bytes(buf)))
}

/// `RollbackFirmwareWrite`: safe-writes the combined version into
/// `FIRMWARE_VERSIONS`.
pub fn rollback_firmware_write(
    tpm: &mut impl Tlcl,
    key_version: u16,
    version: u16,
) -> RollbackResult<()> {
    let combined = pack_combined(key_version, version);
    safe_write(tpm, nvram::FIRMWARE_VERSIONS, &combined.to_le_bytes())
}

/// `RollbackFirmwareLock`: `SetGlobalLock`, making every globally-lockable
/// space read-only until the next power cycle.
pub fn rollback_firmware_lock(tpm: &mut impl Tlcl) -> RollbackResult<()> {
    tpm.set_global_lock().map_err(Into::into)
}

/// `RollbackKernelRecovery`: runs `SetupTPM(recovery=true, ...)` but
/// discards its error -- a recovery boot must proceed even if the TPM is
/// broken, so the recovery kernel gets a chance to repair it. Locking is
/// skipped in developer mode to leave the device open for repair.
pub fn rollback_kernel_recovery(
    tpm: &mut impl Tlcl,
    developer_mode: bool,
) -> RollbackResult<BootContext> {
    let _ = boot::setup_tpm(tpm, true, developer_mode);
    let ctx = BootContext::new(true);
    if !developer_mode {
        tpm.set_global_lock()?;
    }
    Ok(ctx)
}

/// `RollbackKernelRead`: during recovery this always returns `(0, 0)` so a
/// compromised recovery path can't be used to read an advanced counter.
pub fn rollback_kernel_read(tpm: &mut impl Tlcl, ctx: &BootContext) -> RollbackResult<(u16, u16)> {
    if ctx.recovery_mode() {
        return Ok((0, 0));
    }
    let mut buf = [0u8; nvram::VERSION_SIZE];
    tpm.read(nvram::KERNEL_VERSIONS, &mut buf)?;
    Ok(split_combined(u32::from_le_bytes(buf)))
}

/// `RollbackKernelWrite`: no-op success during recovery.
pub fn rollback_kernel_write(
    tpm: &mut impl Tlcl,
    ctx: &BootContext,
    key_version: u16,
    version: u16,
) -> RollbackResult<()> {
    if ctx.recovery_mode() {
        return Ok(());
    }
    let combined = pack_combined(key_version, version);
    safe_write(tpm, nvram::KERNEL_VERSIONS, &combined.to_le_bytes())
}

/// `RollbackKernelLock`: no-op success during recovery, otherwise turns
/// physical presence off for the remainder of the boot.
pub fn rollback_kernel_lock(tpm: &mut impl Tlcl, ctx: &BootContext) -> RollbackResult<()> {
    if ctx.recovery_mode() {
        return Ok(());
    }
    tpm.lock_physical_presence().map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimTpm;

    #[test]
    fn pack_combined_uses_or_not_and() {
        // With the original AND bug, version=0 would zero out key_version.
        assert_eq!(pack_combined(7, 0), 7 << 16);
        assert_eq!(pack_combined(7, 3), (7 << 16) | 3);
    }

    #[test]
    fn firmware_round_trip() {
        let mut tpm = SimTpm::empty();
        rollback_firmware_setup(&mut tpm, false).unwrap();
        rollback_firmware_write(&mut tpm, 2, 7).unwrap();
        assert_eq!(rollback_firmware_read(&mut tpm).unwrap(), (2, 7));
    }

    #[test]
    fn firmware_lock_blocks_further_writes() {
        let mut tpm = SimTpm::empty();
        rollback_firmware_setup(&mut tpm, false).unwrap();
        rollback_firmware_lock(&mut tpm).unwrap();
        assert!(rollback_firmware_write(&mut tpm, 1, 1).is_err());
    }

    #[test]
    fn kernel_lock_blocks_further_writes_outside_recovery() {
        let mut tpm = SimTpm::empty();
        let ctx = rollback_firmware_setup(&mut tpm, false).unwrap();
        rollback_kernel_write(&mut tpm, &ctx, 5, 3).unwrap();
        rollback_kernel_lock(&mut tpm, &ctx).unwrap();
        assert!(rollback_kernel_write(&mut tpm, &ctx, 6, 0).is_err());
    }

    #[test]
    fn recovery_round_trip_restores_counters_and_clears_distrust() {
        let mut tpm = SimTpm::empty();

        // Boot 1: normal setup, write (5, 3), lock.
        let ctx = rollback_firmware_setup(&mut tpm, false).unwrap();
        rollback_kernel_write(&mut tpm, &ctx, 5, 3).unwrap();
        rollback_kernel_lock(&mut tpm, &ctx).unwrap();

        // Boot 2: recovery, non-dev -- locks globally.
        let recovery_ctx = rollback_kernel_recovery(&mut tpm, false).unwrap();
        assert_eq!(rollback_kernel_read(&mut tpm, &recovery_ctx).unwrap(), (0, 0));

        // Boot 3: normal setup again; distrust flag was armed by the
        // recovery boot, so the primary is restored from backup.
        let ctx = rollback_firmware_setup(&mut tpm, false).unwrap();
        assert_eq!(rollback_kernel_read(&mut tpm, &ctx).unwrap(), (5, 3));

        let mut flag = [0u8; nvram::VERSION_SIZE];
        tpm.read(nvram::KERNEL_MUST_USE_BACKUP, &mut flag).unwrap();
        assert_eq!(u32::from_le_bytes(flag), 0);
    }

    #[test]
    fn recovery_read_write_lock_are_inert_during_recovery() {
        let mut tpm = SimTpm::empty();
        rollback_firmware_setup(&mut tpm, false).unwrap();
        let recovery_ctx = rollback_kernel_recovery(&mut tpm, false).unwrap();

        rollback_kernel_write(&mut tpm, &recovery_ctx, 9, 9).unwrap();
        rollback_kernel_lock(&mut tpm, &recovery_ctx).unwrap();
        assert_eq!(
            rollback_kernel_read(&mut tpm, &recovery_ctx).unwrap(),
            (0, 0)
        );
    }

    #[test]
    fn dev_mode_toggle_clears_tpm_between_boots() {
        let mut tpm = SimTpm::empty();
        let ctx = rollback_firmware_setup(&mut tpm, false).unwrap();
        rollback_firmware_write(&mut tpm, 2, 7).unwrap();
        let _ = ctx;

        assert!(!tpm.was_cleared());
        rollback_firmware_setup(&mut tpm, true).unwrap();
        assert!(tpm.was_cleared());
    }
}
