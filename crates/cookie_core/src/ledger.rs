//! The pair of ordered task sequences and the rules for moving items
//! between and within them.
//!
//! Every mutation runs to completion before returning: the balance (when
//! involved) is committed first, then the lists, and only then are
//! [`Topic::LedgerChanged`] and [`Topic::PointsChanged`] published. A failed
//! write leaves both the lists and the balance as they were.

use crate::account::{PointsAccount, negated};
use crate::error::AppError;
use crate::model::{Location, Section, TaskItem};
use crate::notifier::{ChangeNotifier, Topic};
use crate::storage::{self, ACTIVE_TASKS_KEY, COMPLETED_TASKS_KEY, StoreHandle};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

/// What happens to the balance when a completed item is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Deduct the item's points so the balance keeps matching the completed list.
    #[default]
    Refund,
    /// Leave the balance untouched.
    #[serde(alias = "no_refund", alias = "no-refund")]
    Keep,
}

impl DeletePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "refund" => Some(Self::Refund),
            "keep" | "no_refund" | "no-refund" => Some(Self::Keep),
            _ => None,
        }
    }
}

struct Snapshot {
    active: Vec<TaskItem>,
    completed: Vec<TaskItem>,
}

#[derive(Debug)]
pub struct TaskLedger {
    store: StoreHandle,
    notifier: ChangeNotifier,
    delete_policy: DeletePolicy,
    active: Vec<TaskItem>,
    completed: Vec<TaskItem>,
}

impl TaskLedger {
    pub fn open(
        store: StoreHandle,
        notifier: ChangeNotifier,
        delete_policy: DeletePolicy,
    ) -> Result<Self, AppError> {
        let active: Vec<TaskItem> = storage::load_or_default(&store, ACTIVE_TASKS_KEY)?;
        let completed: Vec<TaskItem> = storage::load_or_default(&store, COMPLETED_TASKS_KEY)?;

        if let Some(item) = active.iter().find(|item| item.completed) {
            return Err(AppError::invalid_data(format!(
                "active task {} is flagged completed",
                item.id
            )));
        }
        if let Some(item) = completed.iter().find(|item| !item.completed) {
            return Err(AppError::invalid_data(format!(
                "completed task {} is not flagged completed",
                item.id
            )));
        }

        debug!(
            active = active.len(),
            completed = completed.len(),
            "loaded task ledger"
        );
        Ok(Self {
            store,
            notifier,
            delete_policy,
            active,
            completed,
        })
    }

    pub fn active_items(&self) -> Vec<TaskItem> {
        self.active.clone()
    }

    pub fn completed_items(&self) -> Vec<TaskItem> {
        self.completed.clone()
    }

    pub fn items(&self, section: Section) -> &[TaskItem] {
        match section {
            Section::Active => &self.active,
            Section::Completed => &self.completed,
        }
    }

    pub fn get(&self, location: Location) -> Result<&TaskItem, AppError> {
        let items = self.items(location.section);
        items.get(location.row).ok_or_else(|| out_of_range(location, items.len()))
    }

    /// Sum of points over the completed sequence.
    pub fn completed_points(&self) -> i64 {
        self.completed.iter().map(|item| item.points).sum()
    }

    pub fn create(&mut self, title: &str, points: i64) -> Result<TaskItem, AppError> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(AppError::invalid_argument("title is required"));
        }
        if points < 0 {
            return Err(AppError::invalid_argument("points must not be negative"));
        }

        let now = OffsetDateTime::now_utc();
        let created_at = now
            .format(&Rfc3339)
            .map_err(|err| AppError::invalid_data(err.to_string()))?;
        let item = TaskItem {
            id: self.unique_id(now.unix_timestamp_nanos()),
            title: trimmed.to_string(),
            points,
            completed: false,
            created_at,
        };

        let snapshot = self.snapshot();
        self.active.push(item.clone());
        self.persist_or_restore(snapshot)?;

        debug!(id = %item.id, points, "task created");
        self.notifier.publish(Topic::LedgerChanged);
        Ok(item)
    }

    /// Removes the addressed item. Under [`DeletePolicy::Refund`] deleting a
    /// completed item deducts its points first.
    pub fn delete(
        &mut self,
        account: &mut PointsAccount,
        location: Location,
    ) -> Result<TaskItem, AppError> {
        let refund = match (location.section, self.delete_policy) {
            (Section::Completed, DeletePolicy::Refund) => self.get(location)?.points,
            _ => {
                self.get(location)?;
                0
            }
        };

        let balance_before = account.current_balance();
        if refund != 0 {
            account.adjust_silently(negated(refund)?)?;
        }

        let snapshot = self.snapshot();
        let removed = self.sequence_mut(location.section).remove(location.row);
        if let Err(err) = self.persist_or_restore(snapshot) {
            if refund != 0 {
                revert_balance(account, balance_before);
            }
            return Err(err);
        }

        debug!(id = %removed.id, section = %location.section, refund, "task deleted");
        self.notifier.publish(Topic::LedgerChanged);
        if refund != 0 {
            self.notifier.publish(Topic::PointsChanged);
        }
        Ok(removed)
    }

    /// Moves the addressed item to the end of the other sequence, crediting
    /// or debiting its points before the move is committed.
    pub fn toggle(
        &mut self,
        account: &mut PointsAccount,
        location: Location,
    ) -> Result<TaskItem, AppError> {
        let points = self.get(location)?.points;
        let delta = match location.section {
            Section::Active => points,
            Section::Completed => negated(points)?,
        };

        let balance_before = account.current_balance();
        account.adjust_silently(delta)?;

        let snapshot = self.snapshot();
        let mut moved = self.sequence_mut(location.section).remove(location.row);
        moved.completed = !moved.completed;
        self.sequence_mut(location.section.other()).push(moved.clone());
        if let Err(err) = self.persist_or_restore(snapshot) {
            revert_balance(account, balance_before);
            return Err(err);
        }

        debug!(
            id = %moved.id,
            completed = moved.completed,
            delta,
            balance = account.current_balance(),
            "task toggled"
        );
        self.notifier.publish(Topic::LedgerChanged);
        self.notifier.publish(Topic::PointsChanged);
        Ok(moved)
    }

    /// Moves one item from `from` to `to` inside `section`; all other items
    /// keep their relative order.
    pub fn reorder(&mut self, section: Section, from: usize, to: usize) -> Result<(), AppError> {
        let len = self.items(section).len();
        for row in [from, to] {
            if row >= len {
                return Err(out_of_range(Location::new(section, row), len));
            }
        }
        if from == to {
            return Ok(());
        }

        let snapshot = self.snapshot();
        let sequence = self.sequence_mut(section);
        let item = sequence.remove(from);
        sequence.insert(to, item);
        self.persist_or_restore(snapshot)?;

        debug!(section = %section, from, to, "task reordered");
        self.notifier.publish(Topic::LedgerChanged);
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), AppError> {
        let snapshot = self.snapshot();
        self.active.clear();
        self.completed.clear();
        self.persist_or_restore(snapshot)?;

        debug!("task ledger reset");
        self.notifier.publish(Topic::LedgerChanged);
        Ok(())
    }

    fn sequence_mut(&mut self, section: Section) -> &mut Vec<TaskItem> {
        match section {
            Section::Active => &mut self.active,
            Section::Completed => &mut self.completed,
        }
    }

    fn unique_id(&self, nanos: i128) -> String {
        let base = format!("task-{nanos}");
        let mut candidate = base.clone();
        let mut suffix = 1;
        while self.contains_id(&candidate) {
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }
        candidate
    }

    fn contains_id(&self, id: &str) -> bool {
        self.active
            .iter()
            .chain(self.completed.iter())
            .any(|item| item.id == id)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            active: self.active.clone(),
            completed: self.completed.clone(),
        }
    }

    fn persist(&self) -> Result<(), AppError> {
        storage::save(&self.store, ACTIVE_TASKS_KEY, &self.active)?;
        storage::save(&self.store, COMPLETED_TASKS_KEY, &self.completed)
    }

    fn persist_or_restore(&mut self, snapshot: Snapshot) -> Result<(), AppError> {
        let Err(err) = self.persist() else {
            return Ok(());
        };

        self.active = snapshot.active;
        self.completed = snapshot.completed;
        // The first key may already hold the new value.
        if let Err(rewrite) = self.persist() {
            warn!(error = %rewrite, "could not restore task lists after failed write");
        }
        Err(err)
    }
}

fn revert_balance(account: &mut PointsAccount, balance: i64) {
    if let Err(err) = account.restore_silently(balance) {
        warn!(error = %err, balance, "could not revert balance after failed ledger write");
    }
}

fn out_of_range(location: Location, len: usize) -> AppError {
    AppError::out_of_range(format!(
        "row {} is out of range for {} tasks (length {len})",
        location.row, location.section
    ))
}

#[cfg(test)]
mod tests {
    use super::{DeletePolicy, TaskLedger};
    use crate::account::PointsAccount;
    use crate::model::{Location, Section, TaskItem};
    use crate::notifier::{ChangeNotifier, Topic};
    use crate::storage::{
        self, ACTIVE_TASKS_KEY, COMPLETED_TASKS_KEY, MemoryStore, POINTS_KEY, StoreHandle,
    };
    use rstest::rstest;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Fixture {
        memory: Rc<RefCell<MemoryStore>>,
        store: StoreHandle,
        notifier: ChangeNotifier,
        ledger: TaskLedger,
        account: PointsAccount,
    }

    fn fixture_with(policy: DeletePolicy) -> Fixture {
        let memory = Rc::new(RefCell::new(MemoryStore::new()));
        let store: StoreHandle = memory.clone();
        let notifier = ChangeNotifier::new();
        let ledger = TaskLedger::open(Rc::clone(&store), notifier.clone(), policy).unwrap();
        let account = PointsAccount::open(Rc::clone(&store), notifier.clone()).unwrap();
        Fixture {
            memory,
            store,
            notifier,
            ledger,
            account,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(DeletePolicy::Refund)
    }

    fn titles(items: &[TaskItem]) -> Vec<&str> {
        items.iter().map(|item| item.title.as_str()).collect()
    }

    fn assert_sum_invariant(f: &Fixture) {
        assert_eq!(f.account.current_balance(), f.ledger.completed_points());
    }

    #[test]
    fn create_appends_to_active() {
        let mut f = fixture();
        let item = f.ledger.create("Wash dishes", 10).unwrap();

        assert!(!item.completed);
        assert_eq!(item.points, 10);
        assert!(item.id.starts_with("task-"));
        assert_eq!(f.ledger.active_items(), vec![item]);
        assert!(f.ledger.completed_items().is_empty());
        assert_eq!(f.account.current_balance(), 0);
    }

    #[rstest]
    #[case("", 5)]
    #[case("   ", 5)]
    #[case("Walk dog", -1)]
    fn create_rejects_bad_input(#[case] title: &str, #[case] points: i64) {
        let mut f = fixture();
        let err = f.ledger.create(title, points).unwrap_err();

        assert_eq!(err.code(), "invalid_argument");
        assert!(f.ledger.active_items().is_empty());
    }

    #[test]
    fn create_trims_title_and_accepts_zero_points() {
        let mut f = fixture();
        let item = f.ledger.create("  Stretch  ", 0).unwrap();
        assert_eq!(item.title, "Stretch");
    }

    #[test]
    fn ids_stay_unique() {
        let mut f = fixture();
        let ids: Vec<String> = (0..20)
            .map(|n| f.ledger.create(&format!("task {n}"), 1).unwrap().id)
            .collect();

        let mut deduped = ids.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), ids.len());
    }

    #[test]
    fn toggle_round_trip_scenario() {
        let mut f = fixture();
        f.ledger.create("Wash dishes", 10).unwrap();

        let done = f.ledger.toggle(&mut f.account, Location::active(0)).unwrap();
        assert!(done.completed);
        assert!(f.ledger.active_items().is_empty());
        assert_eq!(titles(&f.ledger.completed_items()), vec!["Wash dishes"]);
        assert!(f.ledger.completed_items()[0].completed);
        assert_eq!(f.account.current_balance(), 10);

        let undone = f.ledger.toggle(&mut f.account, Location::completed(0)).unwrap();
        assert!(!undone.completed);
        assert_eq!(titles(&f.ledger.active_items()), vec!["Wash dishes"]);
        assert!(f.ledger.completed_items().is_empty());
        assert_eq!(f.account.current_balance(), 0);
    }

    #[test]
    fn toggle_back_appends_to_end() {
        let mut f = fixture();
        for title in ["A", "B", "C"] {
            f.ledger.create(title, 1).unwrap();
        }

        f.ledger.toggle(&mut f.account, Location::active(0)).unwrap();
        f.ledger.toggle(&mut f.account, Location::completed(0)).unwrap();

        assert_eq!(titles(&f.ledger.active_items()), vec!["B", "C", "A"]);
        assert!(f.ledger.active_items().iter().all(|item| !item.completed));
        assert_eq!(f.account.current_balance(), 0);
    }

    #[test]
    fn reorder_scenario_leaves_balance() {
        let mut f = fixture();
        f.ledger.create("A", 5).unwrap();
        f.ledger.create("B", 3).unwrap();

        f.ledger.reorder(Section::Active, 0, 1).unwrap();

        assert_eq!(titles(&f.ledger.active_items()), vec!["B", "A"]);
        assert_eq!(f.account.current_balance(), 0);
    }

    #[rstest]
    #[case(0, 3, vec!["B", "C", "D", "A", "E"])]
    #[case(4, 0, vec!["E", "A", "B", "C", "D"])]
    #[case(1, 2, vec!["A", "C", "B", "D", "E"])]
    #[case(2, 2, vec!["A", "B", "C", "D", "E"])]
    fn reorder_moves_exactly_one_element(
        #[case] from: usize,
        #[case] to: usize,
        #[case] expected: Vec<&str>,
    ) {
        let mut f = fixture();
        for title in ["A", "B", "C", "D", "E"] {
            f.ledger.create(title, 2).unwrap();
        }

        f.ledger.reorder(Section::Active, from, to).unwrap();
        assert_eq!(titles(&f.ledger.active_items()), expected);
    }

    #[test]
    fn reorder_within_completed_keeps_flags() {
        let mut f = fixture();
        f.ledger.create("A", 1).unwrap();
        f.ledger.create("B", 2).unwrap();
        f.ledger.toggle(&mut f.account, Location::active(0)).unwrap();
        f.ledger.toggle(&mut f.account, Location::active(0)).unwrap();

        f.ledger.reorder(Section::Completed, 1, 0).unwrap();

        assert_eq!(titles(&f.ledger.completed_items()), vec!["B", "A"]);
        assert!(f.ledger.completed_items().iter().all(|item| item.completed));
        assert_eq!(f.account.current_balance(), 3);
    }

    #[rstest]
    #[case(Section::Active, 0)]
    #[case(Section::Completed, 0)]
    #[case(Section::Active, 7)]
    fn addressing_empty_or_past_end_is_out_of_range(#[case] section: Section, #[case] row: usize) {
        let mut f = fixture();
        let location = Location::new(section, row);

        assert_eq!(
            f.ledger.delete(&mut f.account, location).unwrap_err().code(),
            "out_of_range"
        );
        assert_eq!(
            f.ledger.toggle(&mut f.account, location).unwrap_err().code(),
            "out_of_range"
        );
        assert_eq!(
            f.ledger.reorder(section, row, 0).unwrap_err().code(),
            "out_of_range"
        );
    }

    #[test]
    fn reorder_rejects_destination_past_end() {
        let mut f = fixture();
        f.ledger.create("A", 1).unwrap();

        let err = f.ledger.reorder(Section::Active, 0, 1).unwrap_err();
        assert_eq!(err.code(), "out_of_range");
        assert_eq!(titles(&f.ledger.active_items()), vec!["A"]);
    }

    #[test]
    fn out_of_range_toggle_leaves_balance() {
        let mut f = fixture();
        f.ledger.create("A", 4).unwrap();

        f.ledger
            .toggle(&mut f.account, Location::completed(0))
            .unwrap_err();
        assert_eq!(f.account.current_balance(), 0);
        assert_eq!(f.ledger.active_items().len(), 1);
    }

    #[test]
    fn delete_completed_refunds_by_default() {
        let mut f = fixture();
        f.ledger.create("A", 6).unwrap();
        f.ledger.toggle(&mut f.account, Location::active(0)).unwrap();

        let removed = f.ledger.delete(&mut f.account, Location::completed(0)).unwrap();

        assert_eq!(removed.title, "A");
        assert!(f.ledger.completed_items().is_empty());
        assert_eq!(f.account.current_balance(), 0);
    }

    #[test]
    fn delete_completed_keeps_points_under_keep_policy() {
        let mut f = fixture_with(DeletePolicy::Keep);
        f.ledger.create("A", 6).unwrap();
        f.ledger.toggle(&mut f.account, Location::active(0)).unwrap();

        f.ledger.delete(&mut f.account, Location::completed(0)).unwrap();

        assert!(f.ledger.completed_items().is_empty());
        assert_eq!(f.account.current_balance(), 6);
    }

    #[test]
    fn delete_active_never_touches_balance() {
        let mut f = fixture();
        f.ledger.create("A", 6).unwrap();
        f.ledger.create("B", 2).unwrap();

        let removed = f.ledger.delete(&mut f.account, Location::active(1)).unwrap();

        assert_eq!(removed.title, "B");
        assert_eq!(titles(&f.ledger.active_items()), vec!["A"]);
        assert_eq!(f.account.current_balance(), 0);
    }

    #[test]
    fn sum_invariant_holds_over_mixed_operations() {
        let mut f = fixture();
        for (title, points) in [("A", 5), ("B", 3), ("C", 8), ("D", 0), ("E", 13)] {
            f.ledger.create(title, points).unwrap();
            assert_sum_invariant(&f);
        }

        f.ledger.toggle(&mut f.account, Location::active(0)).unwrap();
        assert_sum_invariant(&f);
        f.ledger.toggle(&mut f.account, Location::active(1)).unwrap();
        assert_sum_invariant(&f);
        f.ledger.reorder(Section::Completed, 0, 1).unwrap();
        assert_sum_invariant(&f);
        f.ledger.toggle(&mut f.account, Location::active(2)).unwrap();
        assert_sum_invariant(&f);
        f.ledger.delete(&mut f.account, Location::completed(1)).unwrap();
        assert_sum_invariant(&f);
        f.ledger.toggle(&mut f.account, Location::completed(0)).unwrap();
        assert_sum_invariant(&f);
        f.ledger.reorder(Section::Active, 0, 2).unwrap();
        assert_sum_invariant(&f);
        f.ledger.delete(&mut f.account, Location::active(0)).unwrap();
        assert_sum_invariant(&f);
        f.ledger.toggle(&mut f.account, Location::active(0)).unwrap();
        assert_sum_invariant(&f);

        let mut seed: u64 = 0x5eed;
        for step in 0..200 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let choice = (seed >> 33) % 4;
            let active_len = f.ledger.items(Section::Active).len();
            let completed_len = f.ledger.items(Section::Completed).len();
            let pick = |len: usize| ((seed >> 13) as usize) % len.max(1);
            match choice {
                0 => {
                    f.ledger.create(&format!("task {step}"), (seed % 20) as i64).unwrap();
                }
                1 if active_len > 0 => {
                    f.ledger
                        .toggle(&mut f.account, Location::active(pick(active_len)))
                        .unwrap();
                }
                2 if completed_len > 0 => {
                    f.ledger
                        .toggle(&mut f.account, Location::completed(pick(completed_len)))
                        .unwrap();
                }
                3 if completed_len > 0 => {
                    f.ledger
                        .delete(&mut f.account, Location::completed(pick(completed_len)))
                        .unwrap();
                }
                _ if active_len > 1 => {
                    f.ledger
                        .reorder(Section::Active, pick(active_len), 0)
                        .unwrap();
                }
                _ => {}
            }
            assert_sum_invariant(&f);
        }
    }

    #[test]
    fn toggle_publishes_after_both_commits() {
        let mut f = fixture();
        f.ledger.create("A", 7).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let _subscriptions: Vec<_> = [Topic::LedgerChanged, Topic::PointsChanged]
            .into_iter()
            .map(|topic| {
                let seen = Rc::clone(&seen);
                let store = Rc::clone(&f.store);
                f.notifier.subscribe_scoped(topic, move || {
                    let balance: i64 = storage::load_or_default(&store, POINTS_KEY).unwrap();
                    let completed: Vec<TaskItem> =
                        storage::load_or_default(&store, COMPLETED_TASKS_KEY).unwrap();
                    seen.borrow_mut().push((topic, balance, completed.len()));
                })
            })
            .collect();

        f.ledger.toggle(&mut f.account, Location::active(0)).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![(Topic::LedgerChanged, 7, 1), (Topic::PointsChanged, 7, 1)]
        );
    }

    #[test]
    fn reorder_and_create_publish_ledger_only() {
        let mut f = fixture();
        let points_hits = Rc::new(RefCell::new(0));
        let ledger_hits = Rc::new(RefCell::new(0));
        let points_counter = Rc::clone(&points_hits);
        let ledger_counter = Rc::clone(&ledger_hits);
        let _points = f
            .notifier
            .subscribe_scoped(Topic::PointsChanged, move || *points_counter.borrow_mut() += 1);
        let _ledger = f
            .notifier
            .subscribe_scoped(Topic::LedgerChanged, move || *ledger_counter.borrow_mut() += 1);

        f.ledger.create("A", 1).unwrap();
        f.ledger.create("B", 1).unwrap();
        f.ledger.reorder(Section::Active, 1, 0).unwrap();

        assert_eq!(*ledger_hits.borrow(), 3);
        assert_eq!(*points_hits.borrow(), 0);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut f = fixture();
        f.ledger.create("A", 1).unwrap();
        f.ledger.create("B", 1).unwrap();
        f.ledger.toggle(&mut f.account, Location::active(0)).unwrap();

        for _ in 0..2 {
            f.ledger.reset().unwrap();
            assert!(f.ledger.active_items().is_empty());
            assert!(f.ledger.completed_items().is_empty());
        }
        // Resetting tasks does not touch the balance.
        assert_eq!(f.account.current_balance(), 1);
    }

    #[test]
    fn reopen_restores_both_sequences() {
        let mut f = fixture();
        f.ledger.create("A", 1).unwrap();
        f.ledger.create("B", 2).unwrap();
        f.ledger.toggle(&mut f.account, Location::active(1)).unwrap();

        let reopened =
            TaskLedger::open(Rc::clone(&f.store), f.notifier.clone(), DeletePolicy::Refund)
                .unwrap();

        assert_eq!(reopened.active_items(), f.ledger.active_items());
        assert_eq!(reopened.completed_items(), f.ledger.completed_items());
    }

    #[test]
    fn open_rejects_mismatched_completion_flag() {
        let f = fixture();
        let stray = TaskItem {
            id: "task-1".to_string(),
            title: "stray".to_string(),
            points: 1,
            completed: true,
            created_at: String::new(),
        };
        storage::save(&f.store, ACTIVE_TASKS_KEY, &vec![stray]).unwrap();

        let err = TaskLedger::open(Rc::clone(&f.store), f.notifier.clone(), DeletePolicy::Refund)
            .unwrap_err();
        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn reopening_min_value_record_is_rejected_without_change() {
        let f = fixture();
        let legacy = TaskItem {
            id: "task-1".to_string(),
            title: "legacy".to_string(),
            points: i64::MIN,
            completed: true,
            created_at: String::new(),
        };
        storage::save(&f.store, COMPLETED_TASKS_KEY, &vec![legacy]).unwrap();
        let mut ledger =
            TaskLedger::open(Rc::clone(&f.store), f.notifier.clone(), DeletePolicy::Refund)
                .unwrap();
        let mut account = PointsAccount::open(Rc::clone(&f.store), f.notifier.clone()).unwrap();

        let toggled = ledger
            .toggle(&mut account, Location::completed(0))
            .unwrap_err();
        let deleted = ledger
            .delete(&mut account, Location::completed(0))
            .unwrap_err();

        assert_eq!(toggled.code(), "invalid_argument");
        assert_eq!(deleted.code(), "invalid_argument");
        assert_eq!(titles(&ledger.completed_items()), vec!["legacy"]);
        assert!(ledger.active_items().is_empty());
        assert_eq!(account.current_balance(), 0);
    }

    #[test]
    fn failed_toggle_rolls_back_lists_and_balance() {
        let mut f = fixture();
        f.ledger.create("A", 9).unwrap();

        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        let _guard = f
            .notifier
            .subscribe_scoped(Topic::LedgerChanged, move || *counter.borrow_mut() += 1);

        f.memory.borrow_mut().set_fail_writes(true);
        let err = f
            .ledger
            .toggle(&mut f.account, Location::active(0))
            .unwrap_err();
        f.memory.borrow_mut().set_fail_writes(false);

        assert_eq!(err.code(), "persistence_unavailable");
        assert_eq!(titles(&f.ledger.active_items()), vec!["A"]);
        assert!(f.ledger.completed_items().is_empty());
        assert_eq!(f.account.current_balance(), 0);
        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn failed_list_write_reverts_committed_balance() {
        let mut f = fixture();
        f.ledger.create("A", 9).unwrap();
        f.memory
            .borrow_mut()
            .set_failing_key(Some(COMPLETED_TASKS_KEY));

        let err = f
            .ledger
            .toggle(&mut f.account, Location::active(0))
            .unwrap_err();
        f.memory.borrow_mut().set_failing_key(None);

        let stored_balance: i64 = storage::load_or_default(&f.store, POINTS_KEY).unwrap();
        let stored_active: Vec<TaskItem> =
            storage::load_or_default(&f.store, ACTIVE_TASKS_KEY).unwrap();

        assert_eq!(err.code(), "persistence_unavailable");
        assert_eq!(f.account.current_balance(), 0);
        assert_eq!(stored_balance, 0);
        assert_eq!(titles(&stored_active), vec!["A"]);
        assert_eq!(titles(&f.ledger.active_items()), vec!["A"]);
    }

    #[test]
    fn failed_create_leaves_ledger_unchanged() {
        let mut f = fixture();
        f.memory.borrow_mut().set_fail_writes(true);

        let err = f.ledger.create("A", 1).unwrap_err();

        assert_eq!(err.code(), "persistence_unavailable");
        assert!(f.ledger.active_items().is_empty());
    }
}
