//! Component F: developer-mode transition detection.
//!
//! Crossing the developer-mode boundary invalidates any secrets an
//! attacker-controlled OS image might otherwise read back, so the TPM is
//! wiped whenever the observed mode differs from what was recorded last
//! boot.

use crate::error::RollbackResult;
use crate::log_service::{klog, LogLevel};
use crate::nvram;
use crate::safe_write::{clear_and_reenable, safe_write};
use crate::tlcl::Tlcl;

/// Runs `§4.F`.
pub(crate) fn check_developer_mode_transition(
    tpm: &mut impl Tlcl,
    current_developer: bool,
) -> RollbackResult<()> {
    let mut past = [0u8; nvram::VERSION_SIZE];
    tpm.read(nvram::DEVELOPER_MODE, &mut past)?;
    let past_developer = u32::from_le_bytes(past) != 0;

    if past_developer != current_developer {
        klog(
            LogLevel::Warn,
            "rollback::devmode",
            &alloc::format!(
                "developer mode transition ({past_developer} -> {current_developer}), clearing TPM"
            ),
        );
        clear_and_reenable(tpm)?;
        let value: u32 = current_developer as u32;
        safe_write(tpm, nvram::DEVELOPER_MODE, &value.to_le_bytes())?;
    }
    Ok(())
}
