//! Software TPM simulator used by this crate's test suite.
//!
//! Implements just enough of [`Tlcl`] to exercise every invariant in
//! `§3`/`§8` of the design: NVRAM spaces with permissions, physical
//! presence, global lock, and the `MaxNVWrites` condition. It is not a
//! faithful TPM emulator (no sessions, no real self-test, no ownership) --
//! only what the anti-rollback core's control flow depends on.
//!
//! Built into every test binary, and additionally exported under the
//! `test-util` feature so integration tests in `tests/` can drive the
//! public API against it without hand-rolling a second fake TPM.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::tlcl::{NvIndex, NvPermissions, Tlcl, TpmResult, TpmStatus};

struct NvSpace {
    permissions: NvPermissions,
    data: Vec<u8>,
}

#[derive(Default)]
pub struct SimTpm {
    spaces: BTreeMap<NvIndex, NvSpace>,
    nv_locked: bool,
    physical_presence: bool,
    disabled: bool,
    deactivated: bool,
    global_lock: bool,
    started: bool,
    clear_count: u32,
    force_max_nv_writes: Option<NvIndex>,
}

impl SimTpm {
    /// A freshly-manufactured TPM: no spaces defined.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A TPM that has already completed `boot::setup_tpm` once, as if a
    /// prior cold boot had run. Convenient for component-level tests that
    /// don't want to re-derive the whole provisioning sequence.
    pub fn provisioned() -> Self {
        let mut tpm = Self::empty();
        crate::boot::setup_tpm(&mut tpm, false, false).expect("provisioning boot to succeed");
        tpm
    }

    /// Make the next write to `index` fail with `MaxNVWrites`, regardless
    /// of how many writes have actually happened. Consumed after firing
    /// once.
    pub fn force_max_nv_writes_on_next_write(&mut self, index: NvIndex) {
        self.force_max_nv_writes = Some(index);
    }

    pub fn was_cleared(&self) -> bool {
        self.clear_count > 0
    }

    pub fn clear_count(&self) -> u32 {
        self.clear_count
    }

    pub fn set_disabled_and_deactivated(&mut self) {
        self.disabled = true;
        self.deactivated = true;
    }

    /// Directly defines a space, bypassing `provision::initialize_spaces`.
    /// Used to hand-craft partially-provisioned or tampered states.
    pub fn raw_define(&mut self, index: NvIndex, permissions: NvPermissions, data: &[u8]) {
        self.spaces.insert(
            index,
            NvSpace {
                permissions,
                data: data.to_vec(),
            },
        );
    }

    /// Overwrites a space's stored bytes without going through permission
    /// or physical-presence checks. Used to hand-craft impossible states
    /// (e.g. backup ahead of primary) that a well-behaved TPM would never
    /// produce on its own.
    pub fn raw_poke(&mut self, index: NvIndex, data: &[u8]) {
        if let Some(space) = self.spaces.get_mut(&index) {
            space.data.clear();
            space.data.extend_from_slice(data);
        }
    }

    pub fn has_space(&self, index: NvIndex) -> bool {
        self.spaces.contains_key(&index)
    }
}

impl Tlcl for SimTpm {
    fn lib_init(&mut self) -> TpmResult<()> {
        Ok(())
    }

    fn startup(&mut self) -> TpmResult<()> {
        // TPM_Startup resets the "until next power cycle" latches: global
        // lock and physical presence. Persistent attributes (disable,
        // deactivated, the defined spaces themselves) survive it.
        self.started = true;
        self.global_lock = false;
        self.physical_presence = false;
        Ok(())
    }

    fn continue_self_test(&mut self) -> TpmResult<()> {
        Ok(())
    }

    fn assert_physical_presence(&mut self) -> TpmResult<()> {
        self.physical_presence = true;
        Ok(())
    }

    fn get_flags(&mut self) -> TpmResult<(bool, bool)> {
        Ok((self.disabled, self.deactivated))
    }

    fn set_enable(&mut self) -> TpmResult<()> {
        self.disabled = false;
        Ok(())
    }

    fn set_deactivated(&mut self, deactivated: bool) -> TpmResult<()> {
        self.deactivated = deactivated;
        Ok(())
    }

    fn force_clear(&mut self) -> TpmResult<()> {
        self.clear_count += 1;
        Ok(())
    }

    fn set_nv_locked(&mut self) -> TpmResult<()> {
        self.nv_locked = true;
        Ok(())
    }

    fn define_space(
        &mut self,
        index: NvIndex,
        permissions: NvPermissions,
        size: u32,
    ) -> TpmResult<()> {
        self.spaces.insert(
            index,
            NvSpace {
                permissions,
                data: alloc::vec![0u8; size as usize],
            },
        );
        Ok(())
    }

    fn write(&mut self, index: NvIndex, data: &[u8]) -> TpmResult<()> {
        if self.force_max_nv_writes == Some(index) {
            self.force_max_nv_writes = None;
            return Err(TpmStatus::MaxNVWrites);
        }

        let space = self.spaces.get_mut(&index).ok_or(TpmStatus::BadIndex)?;
        if space.permissions.contains(NvPermissions::GLOBALLOCK) && self.global_lock {
            return Err(TpmStatus::Other(0xbad0_0001));
        }
        if space.permissions.contains(NvPermissions::PPWRITE) && !self.physical_presence {
            return Err(TpmStatus::Other(0xbad0_0002));
        }
        if data.len() > space.data.len() {
            return Err(TpmStatus::Other(0xbad0_0003));
        }
        // Real TPM NV writes may cover a prefix of the space, leaving the
        // remainder (e.g. KERNEL_VERSIONS' UID tag) untouched.
        space.data[..data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read(&mut self, index: NvIndex, buf: &mut [u8]) -> TpmResult<()> {
        let space = self.spaces.get(&index).ok_or(TpmStatus::BadIndex)?;
        if buf.len() > space.data.len() {
            return Err(TpmStatus::Other(0xbad0_0003));
        }
        buf.copy_from_slice(&space.data[..buf.len()]);
        Ok(())
    }

    fn get_permissions(&mut self, index: NvIndex) -> TpmResult<NvPermissions> {
        self.spaces
            .get(&index)
            .map(|space| space.permissions)
            .ok_or(TpmStatus::BadIndex)
    }

    fn set_global_lock(&mut self) -> TpmResult<()> {
        self.global_lock = true;
        Ok(())
    }

    fn lock_physical_presence(&mut self) -> TpmResult<()> {
        self.physical_presence = false;
        Ok(())
    }
}
