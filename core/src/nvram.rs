//! NVRAM space layout: the six protected regions this core provisions and
//! maintains (see `§3 DATA MODEL`).

use crate::tlcl::{NvIndex, NvPermissions};

/// `FIRMWARE_VERSIONS`: high 16 bits key version, low 16 bits firmware
/// version. Global-lockable and physical-presence-write.
pub const FIRMWARE_VERSIONS: NvIndex = 0x1007;

/// `KERNEL_VERSIONS`: the primary kernel counter, physical-presence-write
/// only (deliberately *not* global-lockable -- see module docs on
/// `kernel_recovery`).
pub const KERNEL_VERSIONS: NvIndex = 0x1008;

/// `KERNEL_VERSIONS_BACKUP`: shadow copy of the kernel counter.
pub const KERNEL_VERSIONS_BACKUP: NvIndex = 0x1009;

/// `KERNEL_MUST_USE_BACKUP`: distrust flag set when a boot leaves the
/// primary kernel space unlocked.
pub const KERNEL_MUST_USE_BACKUP: NvIndex = 0x100a;

/// `DEVELOPER_MODE`: last observed developer-mode state.
pub const DEVELOPER_MODE: NvIndex = 0x100b;

/// `TPM_IS_INITIALIZED`: tombstone defined last during provisioning; its
/// mere existence means every other space was defined successfully.
pub const TPM_IS_INITIALIZED: NvIndex = 0x100c;

/// Size in bytes of the combined (key_version << 16 | version) counter.
pub const VERSION_SIZE: usize = 4;

/// Compile-time UID tag appended to `KERNEL_VERSIONS`' counter so a
/// redefinition of the space (TPM owners can redefine PP-protected spaces
/// at any time) can be detected. Fixed across this provisioning image; must
/// never change once devices are in the field.
pub const KERNEL_SPACE_UID: [u8; 8] = *b"AR-KVUID";

/// Total size of `KERNEL_VERSIONS`: counter followed by the UID tag.
pub const KERNEL_SPACE_SIZE: usize = VERSION_SIZE + KERNEL_SPACE_UID.len();

/// `KERNEL_VERSIONS`' initial contents: a zero counter followed by the UID
/// tag, written once during provisioning.
pub const fn kernel_space_init_data() -> [u8; KERNEL_SPACE_SIZE] {
    let mut buf = [0u8; KERNEL_SPACE_SIZE];
    let mut i = 0;
    while i < KERNEL_SPACE_UID.len() {
        buf[VERSION_SIZE + i] = KERNEL_SPACE_UID[i];
        i += 1;
    }
    buf
}

/// Permissions shared by every globally-lockable space: `FIRMWARE_VERSIONS`,
/// `KERNEL_VERSIONS_BACKUP`, `KERNEL_MUST_USE_BACKUP`, `DEVELOPER_MODE`, and
/// `TPM_IS_INITIALIZED`.
pub const GLOBALLOCK_PERMISSIONS: NvPermissions =
    NvPermissions::GLOBALLOCK.union(NvPermissions::PPWRITE);

/// Permissions for `KERNEL_VERSIONS`: physical-presence-write only, no
/// global lock. Checked against on every boot (invariant 1 in `§3`).
pub const KERNEL_VERSIONS_PERMISSIONS: NvPermissions = NvPermissions::PPWRITE;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_space_init_data_carries_uid_after_zeroed_counter() {
        let buf = kernel_space_init_data();
        assert_eq!(&buf[..VERSION_SIZE], &[0, 0, 0, 0]);
        assert_eq!(&buf[VERSION_SIZE..], &KERNEL_SPACE_UID);
    }

    #[test]
    fn kernel_versions_permissions_exclude_globallock() {
        assert!(!KERNEL_VERSIONS_PERMISSIONS.contains(NvPermissions::GLOBALLOCK));
        assert!(KERNEL_VERSIONS_PERMISSIONS.contains(NvPermissions::PPWRITE));
    }
}
