use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    Inline { mime: String, data: String },
    Remote { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PanelState {
    #[default]
    Idle,
    Loading,
    Success(ImageRef),
    Error(String),
}

impl PanelState {
    pub fn is_success(&self) -> bool {
        matches!(self, PanelState::Success(_))
    }
}

// One entry per live panel id. All writes replace an entry wholesale;
// callers never read-modify-write through this table.
#[derive(Default)]
pub struct PanelStateTable {
    entries: Mutex<HashMap<u32, PanelState>>,
}

impl PanelStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u32) -> PanelState {
        self.entries
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set(&self, id: u32, state: PanelState) {
        self.entries.lock().unwrap().insert(id, state);
    }

    // Drops entries whose id is gone, inserts Idle for new ids and keeps
    // existing entries for retained ids untouched.
    pub fn reconcile(&self, ids: &[u32]) {
        let mut entries = self.entries.lock().unwrap();
        let mut next = HashMap::with_capacity(ids.len());
        for id in ids {
            let state = entries.remove(id).unwrap_or_default();
            next.insert(*id, state);
        }
        *entries = next;
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn snapshot(&self) -> HashMap<u32, PanelState> {
        self.entries.lock().unwrap().clone()
    }

    pub fn success_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.is_success())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline(data: &str) -> ImageRef {
        ImageRef::Inline {
            mime: "image/png".to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_get_defaults_to_idle() {
        let table = PanelStateTable::new();
        assert_eq!(table.get(42), PanelState::Idle);
    }

    #[test]
    fn test_set_replaces_wholesale() {
        let table = PanelStateTable::new();
        table.set(1, PanelState::Loading);
        table.set(1, PanelState::Success(inline("abc")));
        assert_eq!(table.get(1), PanelState::Success(inline("abc")));

        table.set(1, PanelState::Error("boom".to_string()));
        assert_eq!(table.get(1), PanelState::Error("boom".to_string()));
    }

    #[test]
    fn test_reconcile_key_set_matches_script() {
        let table = PanelStateTable::new();
        table.set(1, PanelState::Loading);
        table.set(2, PanelState::Success(inline("x")));
        table.set(3, PanelState::Error("old".to_string()));

        table.reconcile(&[2, 3, 4]);

        let snapshot = table.snapshot();
        let mut keys: Vec<u32> = snapshot.keys().copied().collect();
        keys.sort_unstable();
        assert_eq!(keys, vec![2, 3, 4]);
    }

    #[test]
    fn test_reconcile_preserves_retained_and_inserts_idle() {
        let table = PanelStateTable::new();
        table.set(1, PanelState::Success(inline("keep")));

        table.reconcile(&[1, 2]);

        assert_eq!(table.get(1), PanelState::Success(inline("keep")));
        assert_eq!(table.get(2), PanelState::Idle);
    }

    #[test]
    fn test_reconcile_prunes_stale_entries() {
        let table = PanelStateTable::new();
        table.set(9, PanelState::Error("stale".to_string()));

        table.reconcile(&[1]);

        let snapshot = table.snapshot();
        assert!(!snapshot.contains_key(&9));
        assert_eq!(table.get(9), PanelState::Idle);
    }

    #[test]
    fn test_clear_then_reconcile_resets_everything() {
        let table = PanelStateTable::new();
        table.set(1, PanelState::Success(inline("x")));
        table.set(2, PanelState::Error("e".to_string()));

        table.clear();
        table.reconcile(&[1, 2]);

        assert_eq!(table.get(1), PanelState::Idle);
        assert_eq!(table.get(2), PanelState::Idle);
    }

    #[test]
    fn test_success_count() {
        let table = PanelStateTable::new();
        table.set(1, PanelState::Success(inline("a")));
        table.set(2, PanelState::Loading);
        table.set(3, PanelState::Success(inline("b")));
        assert_eq!(table.success_count(), 2);
    }
}
