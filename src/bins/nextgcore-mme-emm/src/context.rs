//! MME UE context registry
//!
//! Contexts live in a pool keyed by a local id. The registry is owned by a
//! single dispatcher, so lookups hand out plain references and no locking
//! is done here.

use std::collections::HashMap;

use ogs_nas::identity::bcd_to_buffer;
use ogs_nas::types::{
    DetachKind, EpsGuti, MsNetworkCapability, PlmnId, UeNetworkCapability,
};
use ogs_nas::NasResult;
use zeroize::{Zeroize, Zeroizing};

use crate::config::MmeConfig;
use crate::emm_sm::{EmmFsm, EmmState};
use crate::security::SecurityContext;

/// EPS bearer identity not yet assigned
pub const EBI_UNASSIGNED: u8 = 0;
/// Procedure transaction identity not in use
pub const PTI_UNASSIGNED: u8 = 0;
/// EPS bearer identities usable for bearers (TS 24.007 11.2.3.1.5)
pub const MIN_EPS_BEARER_ID: u8 = 5;
pub const MAX_EPS_BEARER_ID: u8 = 15;

/// M-TMSI values allocated by this MME carry the top two bits set
const M_TMSI_PREFIX: u32 = 0xc000_0000;
const M_TMSI_MASK: u32 = 0x3fff_ffff;

/// Radio-side binding of a UE (S1AP UE association)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnbBinding {
    pub enb_id: u32,
    pub enb_ue_s1ap_id: u32,
    pub mme_ue_s1ap_id: u32,
}

/// EPS bearer under negotiation or active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MmeBearer {
    /// Index handed to session management, unique within the UE
    pub index: u32,
    /// EPS Bearer ID
    pub ebi: u8,
    /// Procedure transaction ID of the ESM procedure that created it
    pub pti: u8,
}

/// Bearers owned by one UE
#[derive(Debug, Clone, Default)]
pub struct BearerSet {
    bearers: Vec<MmeBearer>,
    next_index: u32,
    last_ebi: u8,
}

impl BearerSet {
    pub fn find_by_ebi(&self, ebi: u8) -> Option<&MmeBearer> {
        self.bearers.iter().find(|b| b.ebi == ebi)
    }

    pub fn find_by_pti(&self, pti: u8) -> Option<&MmeBearer> {
        self.bearers.iter().find(|b| b.pti == pti)
    }

    pub fn find_by_index(&self, index: u32) -> Option<&MmeBearer> {
        self.bearers.iter().find(|b| b.index == index)
    }

    /// Next EBI in 5..=15, skipping identities already in use.
    fn next_ebi(&mut self) -> u8 {
        let span = MAX_EPS_BEARER_ID - MIN_EPS_BEARER_ID + 1;
        for _ in 0..span {
            self.last_ebi = if (MIN_EPS_BEARER_ID..MAX_EPS_BEARER_ID).contains(&self.last_ebi) {
                self.last_ebi + 1
            } else {
                MIN_EPS_BEARER_ID
            };
            if self.find_by_ebi(self.last_ebi).is_none() {
                return self.last_ebi;
            }
        }
        EBI_UNASSIGNED
    }

    /// Create a bearer for a new ESM transaction with a fresh EBI.
    pub fn add(&mut self, pti: u8) -> MmeBearer {
        self.next_index += 1;
        let ebi = self.next_ebi();
        let bearer = MmeBearer { index: self.next_index, ebi, pti };
        self.bearers.push(bearer);
        bearer
    }

    /// Record the EBI session management assigned to bearer `index`.
    pub fn set_ebi(&mut self, index: u32, ebi: u8) -> Option<MmeBearer> {
        let bearer = self.bearers.iter_mut().find(|b| b.index == index)?;
        bearer.ebi = ebi;
        Some(*bearer)
    }

    pub fn remove(&mut self, index: u32) -> Option<MmeBearer> {
        let pos = self.bearers.iter().position(|b| b.index == index)?;
        Some(self.bearers.remove(pos))
    }

    pub fn len(&self) -> usize {
        self.bearers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bearers.is_empty()
    }

    pub fn clear(&mut self) {
        self.bearers.clear();
        self.last_ebi = EBI_UNASSIGNED;
    }
}

/// MME UE context
#[derive(Debug, Default)]
pub struct MmeUe {
    /// Pool ID
    pub id: u64,
    /// S1AP association; `None` once released
    pub enb: Option<EnbBinding>,

    /// IMSI digits packed as BCD
    pub imsi: Zeroizing<Vec<u8>>,
    /// IMSI digit string
    pub imsi_bcd: Zeroizing<String>,
    /// GUTI assigned in Attach Accept
    pub guti: Option<EpsGuti>,

    /// PLMN the UE attached through
    pub visited_plmn_id: PlmnId,
    pub ue_network_capability: UeNetworkCapability,
    pub ms_network_capability: MsNetworkCapability,

    pub security: SecurityContext,
    pub bearers: BearerSet,
    pub fsm: EmmFsm,

    /// Classification of the last Detach Request
    pub detach_kind: Option<DetachKind>,
}

impl MmeUe {
    pub fn state(&self) -> EmmState {
        self.fsm.state()
    }

    pub fn has_imsi(&self) -> bool {
        !self.imsi_bcd.is_empty()
    }

    /// Drop everything learned during attach: keys, bearers, identity.
    fn wipe(&mut self) {
        self.security.clear();
        self.bearers.clear();
        self.imsi.zeroize();
        self.imsi_bcd.zeroize();
        self.guti = None;
    }
}

/// MME context: the UE pool plus identity indexes and allocators
#[derive(Debug)]
pub struct MmeContext {
    mme_ue_pool: HashMap<u64, MmeUe>,
    imsi_ue_hash: HashMap<String, u64>,
    pool_id_counter: u64,
    mme_ue_s1ap_id: u32,
    m_tmsi: u32,
}

impl Default for MmeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MmeContext {
    pub fn new() -> Self {
        Self {
            mme_ue_pool: HashMap::new(),
            imsi_ue_hash: HashMap::new(),
            pool_id_counter: 1,
            mme_ue_s1ap_id: 1,
            m_tmsi: 0,
        }
    }

    /// Generate a new pool ID
    fn next_pool_id(&mut self) -> u64 {
        let id = self.pool_id_counter;
        self.pool_id_counter += 1;
        id
    }

    /// Generate a new MME UE S1AP ID (never 0)
    fn next_mme_ue_s1ap_id(&mut self) -> u32 {
        let id = self.mme_ue_s1ap_id;
        self.mme_ue_s1ap_id = self.mme_ue_s1ap_id.checked_add(1).unwrap_or(1);
        id
    }

    /// Add a new MME UE for an initial UE message from `enb_id`.
    pub fn mme_ue_add(&mut self, enb_id: u32, enb_ue_s1ap_id: u32) -> u64 {
        let id = self.next_pool_id();
        let mme_ue_s1ap_id = self.next_mme_ue_s1ap_id();
        let mme_ue = MmeUe {
            id,
            enb: Some(EnbBinding { enb_id, enb_ue_s1ap_id, mme_ue_s1ap_id }),
            fsm: EmmFsm::new(id),
            ..Default::default()
        };
        self.mme_ue_pool.insert(id, mme_ue);
        log::debug!("[Added] Number of MME-UEs is now {}", self.mme_ue_pool.len());
        id
    }

    /// Remove an MME UE; its secrets are wiped before the memory is freed.
    pub fn mme_ue_remove(&mut self, id: u64) -> bool {
        let Some(mut ue) = self.mme_ue_pool.remove(&id) else {
            return false;
        };
        if ue.has_imsi() {
            self.imsi_ue_hash.remove(ue.imsi_bcd.as_str());
        }
        ue.wipe();
        log::debug!("[Removed] Number of MME-UEs is now {}", self.mme_ue_pool.len());
        true
    }

    pub fn mme_ue_find(&self, id: u64) -> Option<&MmeUe> {
        self.mme_ue_pool.get(&id)
    }

    pub fn mme_ue_find_mut(&mut self, id: u64) -> Option<&mut MmeUe> {
        self.mme_ue_pool.get_mut(&id)
    }

    /// Find MME UE by IMSI
    pub fn mme_ue_find_by_imsi(&self, imsi_bcd: &str) -> Option<u64> {
        self.imsi_ue_hash.get(imsi_bcd).copied()
    }

    pub fn mme_ue_count(&self) -> usize {
        self.mme_ue_pool.len()
    }

    /// Record the IMSI of UE `id` in both digit and packed form.
    ///
    /// At most one context holds a given IMSI: a stale context still
    /// indexed under it is removed.
    pub fn mme_ue_set_imsi(&mut self, id: u64, imsi_bcd: &str) -> NasResult<bool> {
        let packed = Zeroizing::new(bcd_to_buffer(imsi_bcd)?);
        if !self.mme_ue_pool.contains_key(&id) {
            return Ok(false);
        }

        if let Some(old_id) = self.mme_ue_find_by_imsi(imsi_bcd) {
            if old_id != id {
                log::warn!("[{}] OLD UE Context Release", imsi_bcd);
                self.mme_ue_remove(old_id);
            }
        }

        let Some(ue) = self.mme_ue_pool.get_mut(&id) else {
            return Ok(false);
        };
        if ue.has_imsi() && ue.imsi_bcd.as_str() != imsi_bcd {
            self.imsi_ue_hash.remove(ue.imsi_bcd.as_str());
        }
        ue.imsi = packed;
        ue.imsi_bcd = Zeroizing::new(imsi_bcd.to_string());
        self.imsi_ue_hash.insert(imsi_bcd.to_string(), id);
        Ok(true)
    }

    /// Forget everything UE `id` learned during attach, IMSI index included.
    /// The context itself and its S1AP binding stay.
    pub fn mme_ue_clear(&mut self, id: u64) -> bool {
        let Some(ue) = self.mme_ue_pool.get_mut(&id) else {
            return false;
        };
        if ue.has_imsi() {
            self.imsi_ue_hash.remove(ue.imsi_bcd.as_str());
        }
        ue.wipe();
        true
    }

    /// Drop the S1AP association of UE `id`.
    pub fn mme_ue_unbind_enb(&mut self, id: u64) -> Option<EnbBinding> {
        self.mme_ue_pool.get_mut(&id).and_then(|ue| ue.enb.take())
    }

    /// Allocate a GUTI under the configured GUMMEI.
    pub fn allocate_guti(&mut self, config: &MmeConfig) -> EpsGuti {
        self.m_tmsi = (self.m_tmsi + 1) & M_TMSI_MASK;
        EpsGuti {
            plmn_id: config.plmn_id,
            mme_gid: config.mme_gid,
            mme_code: config.mme_code,
            m_tmsi: M_TMSI_PREFIX | self.m_tmsi,
        }
    }
}
