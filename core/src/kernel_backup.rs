//! Component E: kernel-space backup.
//!
//! Copies the primary kernel counter into the backup whenever it has
//! advanced, so `kernel_recovery` has something trustworthy to restore
//! from if a later boot leaves the primary unlocked. Runs after recovery
//! (`§4.G` step 8) so it never copies an attacker-chosen value into the
//! backup.

use crate::error::{RollbackError, RollbackResult};
use crate::log_service::{klog, LogLevel};
use crate::nvram;
use crate::safe_write::safe_write;
use crate::tlcl::Tlcl;

/// Runs `§4.E`. Invariant 2 (`BACKUP <= PRIMARY`) is asserted here: if the
/// backup is ever found ahead of the primary, that is an impossible state
/// and this returns `InternalInconsistency` rather than silently papering
/// over it.
pub(crate) fn backup_kernel_space(tpm: &mut impl Tlcl) -> RollbackResult<()> {
    let mut primary_buf = [0u8; nvram::VERSION_SIZE];
    tpm.read(nvram::KERNEL_VERSIONS, &mut primary_buf)?;
    let primary = u32::from_le_bytes(primary_buf);

    let mut backup_buf = [0u8; nvram::VERSION_SIZE];
    tpm.read(nvram::KERNEL_VERSIONS_BACKUP, &mut backup_buf)?;
    let backup = u32::from_le_bytes(backup_buf);

    if primary == backup {
        return Ok(());
    }
    if primary < backup {
        klog(
            LogLevel::Error,
            "rollback::kernel_backup",
            &alloc::format!(
                "backup counter ({backup}) ahead of primary ({primary}), refusing to proceed"
            ),
        );
        return Err(RollbackError::InternalInconsistency);
    }

    safe_write(tpm, nvram::KERNEL_VERSIONS_BACKUP, &primary_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimTpm;

    #[test]
    fn equal_counters_are_a_no_op() {
        let mut tpm = SimTpm::empty();
        crate::provision::initialize_spaces(&mut tpm).unwrap();
        backup_kernel_space(&mut tpm).unwrap();
        let mut buf = [0u8; nvram::VERSION_SIZE];
        tpm.read(nvram::KERNEL_VERSIONS_BACKUP, &mut buf).unwrap();
        assert_eq!(u32::from_le_bytes(buf), 0);
    }

    #[test]
    fn primary_ahead_copies_forward() {
        let mut tpm = SimTpm::empty();
        crate::provision::initialize_spaces(&mut tpm).unwrap();
        let combined: u32 = (5u32 << 16) | 3u32;
        let mut primary = [0u8; nvram::KERNEL_SPACE_SIZE];
        primary[..nvram::VERSION_SIZE].copy_from_slice(&combined.to_le_bytes());
        primary[nvram::VERSION_SIZE..].copy_from_slice(&nvram::KERNEL_SPACE_UID);
        tpm.raw_poke(nvram::KERNEL_VERSIONS, &primary);

        backup_kernel_space(&mut tpm).unwrap();

        let mut backup = [0u8; nvram::VERSION_SIZE];
        tpm.read(nvram::KERNEL_VERSIONS_BACKUP, &mut backup).unwrap();
        assert_eq!(u32::from_le_bytes(backup), combined);
    }

    #[test]
    fn backup_ahead_of_primary_is_internal_inconsistency() {
        let mut tpm = SimTpm::empty();
        crate::provision::initialize_spaces(&mut tpm).unwrap();
        tpm.raw_poke(nvram::KERNEL_VERSIONS_BACKUP, &5u32.to_le_bytes());
        let mut primary = [0u8; nvram::KERNEL_SPACE_SIZE];
        primary[..nvram::VERSION_SIZE].copy_from_slice(&1u32.to_le_bytes());
        primary[nvram::VERSION_SIZE..].copy_from_slice(&nvram::KERNEL_SPACE_UID);
        tpm.raw_poke(nvram::KERNEL_VERSIONS, &primary);

        assert_eq!(
            backup_kernel_space(&mut tpm).unwrap_err(),
            RollbackError::InternalInconsistency
        );
    }
}
