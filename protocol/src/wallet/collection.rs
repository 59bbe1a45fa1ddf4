//! One holder's vouchers, partitioned by lifecycle status.

use tracing::{debug, info};

use super::lifecycle::{classify, VoucherStatus};
use crate::voucher::{Amount, Voucher};

/// What a trash request did.
#[derive(Debug)]
pub enum TrashOutcome {
    /// Moved into the trashed partition.
    Trashed,
    /// Was already trashed: removed from the collection for good. The
    /// caller deletes its file.
    Deleted(Voucher),
}

/// The holder's voucher collection.
///
/// Every voucher sits in exactly one partition, and outside of the holder's
/// archive/trash decisions that partition is whatever [`classify`] says.
/// Vouchers are addressed by their local id, which the collection assigns
/// on insert.
#[derive(Debug, Clone, Default)]
pub struct VoucherCollection {
    holder_id: String,
    unfinished: Vec<Voucher>,
    own: Vec<Voucher>,
    other: Vec<Voucher>,
    used: Vec<Voucher>,
    archived: Vec<Voucher>,
    trashed: Vec<Voucher>,
}

impl VoucherCollection {
    pub fn new(holder_id: impl Into<String>) -> Self {
        Self {
            holder_id: holder_id.into(),
            ..Self::default()
        }
    }

    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    pub fn partition(&self, status: VoucherStatus) -> &[Voucher] {
        match status {
            VoucherStatus::Unfinished => &self.unfinished,
            VoucherStatus::Own => &self.own,
            VoucherStatus::Other => &self.other,
            VoucherStatus::Used => &self.used,
            VoucherStatus::Archived => &self.archived,
            VoucherStatus::Trashed => &self.trashed,
        }
    }

    fn partition_mut(&mut self, status: VoucherStatus) -> &mut Vec<Voucher> {
        match status {
            VoucherStatus::Unfinished => &mut self.unfinished,
            VoucherStatus::Own => &mut self.own,
            VoucherStatus::Other => &mut self.other,
            VoucherStatus::Used => &mut self.used,
            VoucherStatus::Archived => &mut self.archived,
            VoucherStatus::Trashed => &mut self.trashed,
        }
    }

    /// All vouchers with their status, partition by partition.
    pub fn iter(&self) -> impl Iterator<Item = (VoucherStatus, &Voucher)> {
        VoucherStatus::ALL
            .into_iter()
            .flat_map(move |status| self.partition(status).iter().map(move |v| (status, v)))
    }

    /// Mutable access for the storage layer, which records file paths.
    /// Content changes must go through `take` and `insert` so local ids
    /// and partitions stay right.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (VoucherStatus, &mut Voucher)> {
        [
            (VoucherStatus::Unfinished, &mut self.unfinished),
            (VoucherStatus::Own, &mut self.own),
            (VoucherStatus::Other, &mut self.other),
            (VoucherStatus::Used, &mut self.used),
            (VoucherStatus::Archived, &mut self.archived),
            (VoucherStatus::Trashed, &mut self.trashed),
        ]
        .into_iter()
        .flat_map(|(status, partition)| partition.iter_mut().map(move |v| (status, v)))
    }

    pub fn len(&self) -> usize {
        VoucherStatus::ALL
            .iter()
            .map(|status| self.partition(*status).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an identical copy (same voucher at the same point in its
    /// history) is already held.
    pub fn contains_version(&self, voucher: &Voucher) -> bool {
        self.iter().any(|(_, held)| held.same_version(voucher))
    }

    /// File `voucher` into the partition [`classify`] picks and assign its
    /// local id. Returns `None` without inserting if the same version is
    /// already held.
    pub fn insert(&mut self, mut voucher: Voucher) -> Option<VoucherStatus> {
        if self.contains_version(&voucher) {
            debug!(voucher_id = %voucher.voucher_id(), "duplicate voucher ignored");
            return None;
        }
        voucher.local.local_id = Some(voucher.compute_local_id(&self.holder_id));
        let status = classify(&voucher, &self.holder_id);
        self.partition_mut(status).push(voucher);
        Some(status)
    }

    pub fn find(&self, local_id: &str) -> Option<(VoucherStatus, &Voucher)> {
        self.iter()
            .find(|(_, v)| v.local.local_id.as_deref() == Some(local_id))
    }

    /// Local id of the voucher in `status` with lineage id `voucher_id`.
    pub fn find_by_voucher_id(&self, status: VoucherStatus, voucher_id: &str) -> Option<String> {
        self.partition(status)
            .iter()
            .find(|v| v.voucher_id() == voucher_id)
            .and_then(|v| v.local.local_id.clone())
    }

    /// Remove a voucher and hand it to the caller.
    pub fn take(&mut self, local_id: &str) -> Option<(VoucherStatus, Voucher)> {
        for status in VoucherStatus::ALL {
            let partition = self.partition_mut(status);
            if let Some(pos) = partition
                .iter()
                .position(|v| v.local.local_id.as_deref() == Some(local_id))
            {
                return Some((status, partition.remove(pos)));
            }
        }
        None
    }

    /// Mark a voucher archived. Returns `None` if it is not held.
    pub fn archive(&mut self, local_id: &str) -> Option<VoucherStatus> {
        let (_, mut voucher) = self.take(local_id)?;
        voucher.local.archived = true;
        voucher.local.trashed = false;
        self.partition_mut(VoucherStatus::Archived).push(voucher);
        Some(VoucherStatus::Archived)
    }

    /// Trash a voucher; trashing an already trashed voucher removes it.
    pub fn trash(&mut self, local_id: &str) -> Option<TrashOutcome> {
        let (status, mut voucher) = self.take(local_id)?;
        if status == VoucherStatus::Trashed {
            info!(local_id, "trashed voucher removed");
            return Some(TrashOutcome::Deleted(voucher));
        }
        voucher.local.trashed = true;
        self.partition_mut(VoucherStatus::Trashed).push(voucher);
        Some(TrashOutcome::Trashed)
    }

    /// Lift archive and trash marks and refile by content.
    pub fn restore(&mut self, local_id: &str) -> Option<VoucherStatus> {
        let (_, mut voucher) = self.take(local_id)?;
        voucher.local.archived = false;
        voucher.local.trashed = false;
        let status = classify(&voucher, &self.holder_id);
        self.partition_mut(status).push(voucher);
        Some(status)
    }

    /// Sum of what the holder can spend from one partition.
    pub fn total_available(&self, status: VoucherStatus) -> Amount {
        self.partition(status)
            .iter()
            .map(|v| v.amount_available_to(&self.holder_id))
            .fold(Amount::ZERO, |acc, a| {
                acc.checked_add(a).unwrap_or(Amount::from_units(u64::MAX))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Identity, PersonInfo};
    use crate::transaction::apply_transfer;
    use crate::voucher::{sign_as_creator, sign_as_guarantor, VoucherDraft};

    fn whole(n: u64) -> Amount {
        Amount::from_whole(n).unwrap()
    }

    fn finalized(creator: &Identity, face: u64) -> Voucher {
        let (guarantor, _) = Identity::generate().unwrap();
        let mut v = Voucher::create(
            creator,
            VoucherDraft::new(PersonInfo::default(), whole(face), "Berlin"),
        )
        .unwrap();
        sign_as_guarantor(&mut v, &guarantor, &PersonInfo::default()).unwrap();
        sign_as_creator(&mut v, creator).unwrap();
        v
    }

    #[test]
    fn insert_files_by_status_and_skips_duplicates() {
        let (alice, _) = Identity::generate().unwrap();
        let mut collection = VoucherCollection::new(alice.id());
        let v = finalized(&alice, 10);

        assert_eq!(collection.insert(v.clone()), Some(VoucherStatus::Own));
        assert_eq!(collection.insert(v), None);
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.total_available(VoucherStatus::Own), whole(10));

        let (_, held) = collection.iter().next().unwrap();
        let local_id = held.local.local_id.clone().unwrap();
        assert!(collection.find(&local_id).is_some());
    }

    #[test]
    fn spent_copy_is_refiled_as_used() {
        let (alice, _) = Identity::generate().unwrap();
        let (bob, _) = Identity::generate().unwrap();
        let mut collection = VoucherCollection::new(alice.id());
        collection.insert(finalized(&alice, 10));
        let local_id = collection.own[0].local.local_id.clone().unwrap();

        let (_, mut spent) = collection.take(&local_id).unwrap();
        apply_transfer(&mut spent, &alice, bob.id(), whole(10)).unwrap();
        assert_eq!(collection.insert(spent), Some(VoucherStatus::Used));
        assert_ne!(collection.used[0].local.local_id.as_deref(), Some(local_id.as_str()));
        assert_eq!(collection.total_available(VoucherStatus::Own), Amount::ZERO);
    }

    #[test]
    fn trash_twice_deletes() {
        let (alice, _) = Identity::generate().unwrap();
        let mut collection = VoucherCollection::new(alice.id());
        collection.insert(finalized(&alice, 10));
        let local_id = collection.own[0].local.local_id.clone().unwrap();

        assert!(matches!(collection.trash(&local_id), Some(TrashOutcome::Trashed)));
        assert_eq!(collection.partition(VoucherStatus::Trashed).len(), 1);
        assert_eq!(collection.total_available(VoucherStatus::Own), Amount::ZERO);

        assert!(matches!(collection.trash(&local_id), Some(TrashOutcome::Deleted(_))));
        assert!(collection.is_empty());
        assert!(collection.trash(&local_id).is_none());
    }

    #[test]
    fn archive_and_restore() {
        let (alice, _) = Identity::generate().unwrap();
        let mut collection = VoucherCollection::new(alice.id());
        collection.insert(finalized(&alice, 10));
        let local_id = collection.own[0].local.local_id.clone().unwrap();

        assert_eq!(collection.archive(&local_id), Some(VoucherStatus::Archived));
        assert_eq!(collection.total_available(VoucherStatus::Own), Amount::ZERO);
        assert_eq!(
            classify(&collection.archived[0], alice.id()),
            VoucherStatus::Archived
        );
        assert_eq!(collection.restore(&local_id), Some(VoucherStatus::Own));
    }
}
