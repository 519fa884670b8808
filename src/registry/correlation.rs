//! The three per-Service correlation tables (§3 "Correlation tables", §9
//! "Cyclic ownership"). Implemented as owned `Vec`s rather than intrusive
//! lists — the registry is small and single-threaded, and a `Vec` gives the
//! same "Service record owns its entries, entries own nothing back"
//! ownership shape with far less unsafe-adjacent bookkeeping.

use std::fmt::Debug;
use std::hash::Hash;

use crate::ids::{EndpointId, MessageId, SubscriptionId};

/// One SubsMap row: a Broker subscription instance paired with its Service
/// counterpart, the Broker-chosen subscription id, and the subscribed path
/// (§3, §4.4 Subscribe row).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsEntry {
    pub broker_instance: u32,
    pub service_instance: u32,
    pub subscription_id: SubscriptionId,
    pub path: String,
}

#[derive(Debug, Default)]
pub struct SubsMap {
    entries: Vec<SubsEntry>,
}

impl SubsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: SubsEntry) {
        self.entries.push(entry);
    }

    pub fn find_by_subscription_id(&self, id: &str) -> Option<&SubsEntry> {
        self.entries.iter().find(|e| e.subscription_id.as_str() == id)
    }

    pub fn find_by_broker_instance(&self, broker_instance: u32) -> Option<&SubsEntry> {
        self.entries
            .iter()
            .find(|e| e.broker_instance == broker_instance)
    }

    pub fn remove_by_subscription_id(&mut self, id: &str) -> Option<SubsEntry> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.subscription_id.as_str() == id)?;
        Some(self.entries.remove(idx))
    }

    pub fn entries(&self) -> &[SubsEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) -> Vec<SubsEntry> {
        std::mem::take(&mut self.entries)
    }

    /// Removes and returns every entry whose subscribed path is a
    /// descendant of `prefix` (§4.2 "Deregister tears down every
    /// subscription... whose path is a descendant of the prefix").
    pub fn remove_by_path_prefix(&mut self, prefix: &str) -> Vec<SubsEntry> {
        let (removed, kept) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| e.path.starts_with(prefix));
        self.entries = kept;
        removed
    }
}

/// One ReqMap row: a Broker Request-table instance paired with the
/// in-flight asynchronous command it tracks (§3, §4.4 async Operate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReqEntry {
    pub broker_request_instance: u32,
    pub command_path: String,
    pub command_key: String,
}

#[derive(Debug, Default)]
pub struct ReqMap {
    entries: Vec<ReqEntry>,
}

impl ReqMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` (and inserts nothing) if `(command_path, command_key)`
    /// is already present — §8 "ReqMap uniqueness".
    pub fn try_insert(&mut self, entry: ReqEntry) -> bool {
        if self.contains(&entry.command_path, &entry.command_key) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn contains(&self, command_path: &str, command_key: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.command_path == command_path && e.command_key == command_key)
    }

    pub fn find_by_path_and_key(&self, command_path: &str, command_key: &str) -> Option<&ReqEntry> {
        self.entries
            .iter()
            .find(|e| e.command_path == command_path && e.command_key == command_key)
    }

    pub fn remove_by_path_and_key(
        &mut self,
        command_path: &str,
        command_key: &str,
    ) -> Option<ReqEntry> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.command_path == command_path && e.command_key == command_key)?;
        Some(self.entries.remove(idx))
    }

    pub fn entries(&self) -> &[ReqEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) -> Vec<ReqEntry> {
        std::mem::take(&mut self.entries)
    }

    /// Removes and returns every in-flight command whose path is a
    /// descendant of `prefix` (§4.2 Deregister teardown).
    pub fn remove_by_path_prefix(&mut self, prefix: &str) -> Vec<ReqEntry> {
        let (removed, kept) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| e.command_path.starts_with(prefix));
        self.entries = kept;
        removed
    }
}

/// One MsgMap row: the Broker-remapped outbound message id paired with
/// everything needed to deliver the eventual response back to its true
/// originator (§3, §4.7 "Wire transformation"). Generic over the MTP's
/// handle type since the recorded MTP is an opaque per-transport value.
#[derive(Debug, Clone)]
pub struct MsgEntry<H> {
    pub broker_msg_id: MessageId,
    pub original_msg_id: MessageId,
    pub originator_endpoint: EndpointId,
    pub originator_handle: H,
}

#[derive(Debug)]
pub struct MsgMap<H> {
    entries: Vec<MsgEntry<H>>,
}

impl<H> Default for MsgMap<H> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<H: Clone + Eq + Hash + Debug> MsgMap<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: MsgEntry<H>) {
        self.entries.push(entry);
    }

    /// Looks up by the Broker-assigned id, matching §8's MsgMap idempotence
    /// property.
    pub fn find_by_broker_msg_id(&self, id: &str) -> Option<&MsgEntry<H>> {
        self.entries
            .iter()
            .find(|e| e.broker_msg_id.as_str() == id)
    }

    pub fn remove_by_broker_msg_id(&mut self, id: &str) -> Option<MsgEntry<H>> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.broker_msg_id.as_str() == id)?;
        Some(self.entries.remove(idx))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) -> Vec<MsgEntry<H>> {
        std::mem::take(&mut self.entries)
    }
}
