//! Component D: kernel-space recovery.
//!
//! Validates that `KERNEL_VERSIONS` is still the space this firmware
//! provisioned -- right permissions, right UID tag -- then, if the
//! previous boot left it untrusted, restores it from the backup.
//!
//! `KERNEL_VERSIONS` is deliberately *not* global-lockable (`§3`): a TPM
//! owner can remove and redefine a physical-presence-protected space at
//! any time, just not write to it. The permission and tag check below is
//! how that tamper is caught.

use crate::error::{RollbackError, RollbackResult};
use crate::nvram;
use crate::safe_write::safe_write;
use crate::tlcl::Tlcl;

/// Runs `§4.D`. Returns `CorruptedState` if `KERNEL_VERSIONS` doesn't match
/// the provisioned permissions and UID tag.
pub(crate) fn recover_kernel_space(tpm: &mut impl Tlcl) -> RollbackResult<()> {
    let mut must_use_backup = [0u8; nvram::VERSION_SIZE];
    tpm.read(nvram::KERNEL_MUST_USE_BACKUP, &mut must_use_backup)?;
    let must_use_backup = u32::from_le_bytes(must_use_backup) != 0;

    let mut buf = [0u8; nvram::KERNEL_SPACE_SIZE];
    tpm.read(nvram::KERNEL_VERSIONS, &mut buf)?;
    let permissions = tpm.get_permissions(nvram::KERNEL_VERSIONS)?;

    let tag_matches = buf[nvram::VERSION_SIZE..] == nvram::KERNEL_SPACE_UID;
    if permissions != nvram::KERNEL_VERSIONS_PERMISSIONS || !tag_matches {
        return Err(RollbackError::CorruptedState);
    }

    if must_use_backup {
        let mut backup = [0u8; nvram::VERSION_SIZE];
        tpm.read(nvram::KERNEL_VERSIONS_BACKUP, &mut backup)?;

        // Partial write: only the counter prefix is replaced, the UID tag
        // past it is left untouched.
        safe_write(tpm, nvram::KERNEL_VERSIONS, &backup)?;

        safe_write(tpm, nvram::KERNEL_MUST_USE_BACKUP, &[0u8; nvram::VERSION_SIZE])?;
    }

    Ok(())
}
