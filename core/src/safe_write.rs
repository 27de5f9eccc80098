//! Component B: the safe-write helper.
//!
//! Wraps [`Tlcl::write`] with a single retry after clearing the TPM when
//! the write fails with `MaxNVWrites`. The 64-write anti-wear limit only
//! triggers while the TPM is unowned, which is exactly the state this core
//! runs in, so clearing is both safe and necessary to make progress.

use crate::error::RollbackResult;
use crate::tlcl::{NvIndex, Tlcl, TpmStatus};

/// Clears the TPM, re-enables it, and turns deactivation back off.
pub(crate) fn clear_and_reenable(tpm: &mut impl Tlcl) -> RollbackResult<()> {
    tpm.force_clear()?;
    tpm.set_enable()?;
    tpm.set_deactivated(false)?;
    Ok(())
}

/// Writes `data` to `index`, retrying once after a TPM clear if the first
/// attempt reports `MaxNVWrites`. Any other error, or a failure of the
/// retried write, is surfaced unchanged.
pub(crate) fn safe_write(tpm: &mut impl Tlcl, index: NvIndex, data: &[u8]) -> RollbackResult<()> {
    match tpm.write(index, data) {
        Ok(()) => Ok(()),
        Err(TpmStatus::MaxNVWrites) => {
            clear_and_reenable(tpm)?;
            tpm.write(index, data).map_err(Into::into)
        }
        Err(status) => Err(status.into()),
    }
}
