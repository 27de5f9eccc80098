//! Component C: first-boot provisioning of the NVRAM spaces.
//!
//! Runs only when [`kernel_recovery::recover_kernel_space`] fails and
//! `TPM_IS_INITIALIZED` is absent. `TPM_IS_INITIALIZED` is defined last and
//! never written to; its existence alone is the tombstone that marks
//! provisioning complete. A power loss between any two steps here leaves
//! that tombstone missing, so the next boot safely re-enters this function.

use crate::error::RollbackResult;
use crate::nvram;
use crate::safe_write::safe_write;
use crate::tlcl::Tlcl;

fn initialize_kernel_versions_space(tpm: &mut impl Tlcl) -> RollbackResult<()> {
    tpm.define_space(
        nvram::KERNEL_VERSIONS,
        nvram::KERNEL_VERSIONS_PERMISSIONS,
        nvram::KERNEL_SPACE_SIZE as u32,
    )?;
    safe_write(
        tpm,
        nvram::KERNEL_VERSIONS,
        &nvram::kernel_space_init_data(),
    )
}

fn define_and_zero(
    tpm: &mut impl Tlcl,
    index: crate::tlcl::NvIndex,
) -> RollbackResult<()> {
    tpm.define_space(
        index,
        nvram::GLOBALLOCK_PERMISSIONS,
        nvram::VERSION_SIZE as u32,
    )?;
    safe_write(tpm, index, &[0u8; nvram::VERSION_SIZE])
}

/// Defines all six NVRAM spaces and writes their initial values, in the
/// order `§4.C` requires: `TPM_IS_INITIALIZED` strictly last, unwritten.
pub(crate) fn initialize_spaces(tpm: &mut impl Tlcl) -> RollbackResult<()> {
    tpm.set_nv_locked()?;

    tpm.define_space(
        nvram::FIRMWARE_VERSIONS,
        nvram::GLOBALLOCK_PERMISSIONS,
        nvram::VERSION_SIZE as u32,
    )?;
    safe_write(tpm, nvram::FIRMWARE_VERSIONS, &[0u8; nvram::VERSION_SIZE])?;

    initialize_kernel_versions_space(tpm)?;

    define_and_zero(tpm, nvram::KERNEL_VERSIONS_BACKUP)?;
    define_and_zero(tpm, nvram::KERNEL_MUST_USE_BACKUP)?;
    define_and_zero(tpm, nvram::DEVELOPER_MODE)?;

    // Tombstone: defined last, never written. Its existence is the signal
    // that every space above was provisioned successfully.
    tpm.define_space(
        nvram::TPM_IS_INITIALIZED,
        nvram::GLOBALLOCK_PERMISSIONS,
        nvram::VERSION_SIZE as u32,
    )?;
    Ok(())
}

/// Checks whether provisioning has previously completed by testing for the
/// tombstone space. Returns `Ok(true)` if it exists, `Ok(false)` if reading
/// it fails with `BadIndex`, and propagates any other TPM error.
pub(crate) fn spaces_initialized(tpm: &mut impl Tlcl) -> RollbackResult<bool> {
    let mut buf = [0u8; nvram::VERSION_SIZE];
    match tpm.read(nvram::TPM_IS_INITIALIZED, &mut buf) {
        Ok(()) => Ok(true),
        Err(crate::tlcl::TpmStatus::BadIndex) => Ok(false),
        Err(status) => Err(status.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimTpm;

    #[test]
    fn cold_boot_defines_all_six_spaces() {
        let mut tpm = SimTpm::empty();
        initialize_spaces(&mut tpm).unwrap();
        assert!(tpm.has_space(nvram::FIRMWARE_VERSIONS));
        assert!(tpm.has_space(nvram::KERNEL_VERSIONS));
        assert!(tpm.has_space(nvram::KERNEL_VERSIONS_BACKUP));
        assert!(tpm.has_space(nvram::KERNEL_MUST_USE_BACKUP));
        assert!(tpm.has_space(nvram::DEVELOPER_MODE));
        assert!(tpm.has_space(nvram::TPM_IS_INITIALIZED));
        assert!(spaces_initialized(&mut tpm).unwrap());
    }

    #[test]
    fn spaces_initialized_is_false_before_provisioning() {
        let mut tpm = SimTpm::empty();
        assert!(!spaces_initialized(&mut tpm).unwrap());
    }

    #[test]
    fn kernel_versions_space_carries_uid_tag() {
        let mut tpm = SimTpm::empty();
        initialize_spaces(&mut tpm).unwrap();
        let mut buf = [0u8; nvram::KERNEL_SPACE_SIZE];
        tpm.read(nvram::KERNEL_VERSIONS, &mut buf).unwrap();
        assert_eq!(&buf[nvram::VERSION_SIZE..], &nvram::KERNEL_SPACE_UID);
    }
}
