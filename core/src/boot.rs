//! Component G: the boot orchestrator, `SetupTPM`.
//!
//! Sequences components B-F in the fixed order `§4.G` requires. Firmware
//! calls this (through the `api` module) exactly once per boot, either via
//! `RollbackFirmwareSetup` on a normal boot or `RollbackKernelRecovery` on
//! a recovery boot.

use crate::error::{RollbackError, RollbackResult};
use crate::log_service::{klog, LogLevel};
use crate::nvram;
use crate::safe_write::safe_write;
use crate::tlcl::Tlcl;
use crate::{devmode, kernel_backup, kernel_recovery, provision};

/// Outcome of a boot-time `setup_tpm` call that completed without error.
///
/// Carries the one piece of process-wide state the original design kept in
/// a global (`g_rollback_recovery_mode`): whether this boot is a recovery
/// boot. The `api` module threads this explicitly into the kernel
/// Read/Write/Lock calls instead of consulting a global, so the same
/// process can in principle run more than one boot's worth of logic (as
/// tests do) without cross-talk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootContext {
    recovery_mode: bool,
}

impl BootContext {
    pub(crate) const fn new(recovery_mode: bool) -> Self {
        Self { recovery_mode }
    }

    pub const fn recovery_mode(&self) -> bool {
        self.recovery_mode
    }
}

fn set_distrust_kernel_space_at_next_boot(
    tpm: &mut impl Tlcl,
    recovery_mode: bool,
) -> RollbackResult<()> {
    let mut current = [0u8; nvram::VERSION_SIZE];
    tpm.read(nvram::KERNEL_MUST_USE_BACKUP, &mut current)?;
    let current = u32::from_le_bytes(current) != 0;

    if current != recovery_mode {
        let value: u32 = recovery_mode as u32;
        safe_write(tpm, nvram::KERNEL_MUST_USE_BACKUP, &value.to_le_bytes())?;
    }
    Ok(())
}

/// Runs `§4.G` and returns the resulting [`BootContext`] on success.
pub(crate) fn setup_tpm(
    tpm: &mut impl Tlcl,
    recovery_mode: bool,
    developer_mode: bool,
) -> RollbackResult<BootContext> {
    tpm.lib_init()?;
    tpm.startup()?;
    tpm.continue_self_test()?;
    tpm.assert_physical_presence()?;

    let (disable, deactivated) = tpm.get_flags()?;
    if disable || deactivated {
        klog(LogLevel::Warn, "rollback::boot", "TPM disabled or deactivated, forcing reboot");
        tpm.set_enable()?;
        tpm.set_deactivated(false)?;
        return Err(RollbackError::MustReboot);
    }

    if kernel_recovery::recover_kernel_space(tpm).is_err() {
        if provision::spaces_initialized(tpm)? {
            klog(
                LogLevel::Error,
                "rollback::boot",
                "kernel space recovery failed on an already-provisioned TPM",
            );
            return Err(RollbackError::AlreadyInitialized);
        }
        klog(
            LogLevel::Info,
            "rollback::boot",
            "NVRAM spaces missing, running first-boot provisioning",
        );
        provision::initialize_spaces(tpm)?;
        kernel_recovery::recover_kernel_space(tpm)?;
    }

    kernel_backup::backup_kernel_space(tpm)?;
    set_distrust_kernel_space_at_next_boot(tpm, recovery_mode)?;
    devmode::check_developer_mode_transition(tpm, developer_mode)?;

    Ok(BootContext { recovery_mode })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimTpm;

    #[test]
    fn cold_boot_succeeds_and_reports_counters_as_zero() {
        let mut tpm = SimTpm::empty();
        let ctx = setup_tpm(&mut tpm, false, false).unwrap();
        assert!(!ctx.recovery_mode());
    }

    #[test]
    fn disable_or_deactivated_forces_reboot() {
        let mut tpm = SimTpm::empty();
        tpm.set_disabled_and_deactivated();
        assert_eq!(
            setup_tpm(&mut tpm, false, false).unwrap_err(),
            RollbackError::MustReboot
        );
    }

    #[test]
    fn interrupted_provisioning_is_retried_to_completion() {
        let mut tpm = SimTpm::empty();
        // Simulate power loss after KERNEL_VERSIONS_BACKUP is defined but
        // before KERNEL_MUST_USE_BACKUP: hand-define everything up to that
        // point. KERNEL_MUST_USE_BACKUP must stay undefined here -- D's
        // first read is of that space, so leaving it missing is what makes
        // D actually fail (`BadIndex`) and fall through to re-provisioning.
        // A later power-loss window (e.g. after DEVELOPER_MODE, before the
        // tombstone) would have KERNEL_MUST_USE_BACKUP already defined and
        // zeroed, and KERNEL_VERSIONS already valid, so D would report
        // success on its own and this test would not be exercising recovery
        // from an interrupted boot at all.
        tpm.raw_define(
            nvram::FIRMWARE_VERSIONS,
            nvram::GLOBALLOCK_PERMISSIONS,
            &[0u8; nvram::VERSION_SIZE],
        );
        tpm.raw_define(
            nvram::KERNEL_VERSIONS,
            nvram::KERNEL_VERSIONS_PERMISSIONS,
            &nvram::kernel_space_init_data(),
        );
        tpm.raw_define(
            nvram::KERNEL_VERSIONS_BACKUP,
            nvram::GLOBALLOCK_PERMISSIONS,
            &[0u8; nvram::VERSION_SIZE],
        );
        assert!(!tpm.has_space(nvram::KERNEL_MUST_USE_BACKUP));
        assert!(!tpm.has_space(nvram::TPM_IS_INITIALIZED));

        setup_tpm(&mut tpm, false, false).unwrap();
        assert!(tpm.has_space(nvram::KERNEL_MUST_USE_BACKUP));
        assert!(tpm.has_space(nvram::DEVELOPER_MODE));
        assert!(tpm.has_space(nvram::TPM_IS_INITIALIZED));
    }

    #[test]
    fn tamper_after_provisioning_surfaces_already_initialized() {
        let mut tpm = SimTpm::empty();
        crate::provision::initialize_spaces(&mut tpm).unwrap();
        tpm.raw_define(
            nvram::KERNEL_VERSIONS,
            crate::tlcl::NvPermissions::empty(),
            &[0u8; nvram::KERNEL_SPACE_SIZE],
        );
        assert_eq!(
            setup_tpm(&mut tpm, false, false).unwrap_err(),
            RollbackError::AlreadyInitialized
        );
    }

    #[test]
    fn impossible_backup_ahead_of_primary_is_rejected() {
        let mut tpm = SimTpm::empty();
        crate::provision::initialize_spaces(&mut tpm).unwrap();
        tpm.raw_poke(nvram::KERNEL_VERSIONS_BACKUP, &5u32.to_le_bytes());
        let mut primary = [0u8; nvram::KERNEL_SPACE_SIZE];
        primary[..nvram::VERSION_SIZE].copy_from_slice(&1u32.to_le_bytes());
        primary[nvram::VERSION_SIZE..].copy_from_slice(&nvram::KERNEL_SPACE_UID);
        tpm.raw_poke(nvram::KERNEL_VERSIONS, &primary);

        assert_eq!(
            setup_tpm(&mut tpm, false, false).unwrap_err(),
            RollbackError::InternalInconsistency
        );
    }

    #[test]
    fn recovery_boot_arms_distrust_flag_for_next_boot() {
        let mut tpm = SimTpm::empty();
        setup_tpm(&mut tpm, false, false).unwrap();
        setup_tpm(&mut tpm, true, false).unwrap();

        let mut flag = [0u8; nvram::VERSION_SIZE];
        tpm.read(nvram::KERNEL_MUST_USE_BACKUP, &mut flag).unwrap();
        assert_eq!(u32::from_le_bytes(flag), 1);
    }

    #[test]
    fn dev_mode_toggle_clears_tpm() {
        let mut tpm = SimTpm::empty();
        setup_tpm(&mut tpm, false, false).unwrap();
        assert!(!tpm.was_cleared());
        setup_tpm(&mut tpm, false, true).unwrap();
        assert!(tpm.was_cleared());
    }
}
