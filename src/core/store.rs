//! Local entity snapshots kept in sync by pushed updates.

/// Entities pushed over a feed carry an opaque id.
pub trait Identified {
    fn id(&self) -> &str;
}

/// Ordered collection of entity snapshots.
///
/// An update for a known id replaces that entry in place; an unknown id is prepended.
/// Nothing beyond id equality is de-duplicated and the server gives no ordering guarantee.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityStore<T> {
    items: Vec<T>,
}

impl<T> Default for EntityStore<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

/// Where an upserted entity ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Replaced { index: usize },
    Inserted,
}

impl<T: Identified> EntityStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from an initial REST listing, preserving its order.
    pub fn from_items(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn upsert(&mut self, entity: T) -> Upsert {
        match self.items.iter().position(|e| e.id() == entity.id()) {
            Some(index) => {
                self.items[index] = entity;
                Upsert::Replaced { index }
            }
            None => {
                self.items.insert(0, entity);
                Upsert::Inserted
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|e| e.id() == id)
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        let index = self.items.iter().position(|e| e.id() == id)?;
        Some(self.items.remove(index))
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: &'static str,
        status: Option<&'static str>,
    }

    impl Identified for Row {
        fn id(&self) -> &str {
            self.id
        }
    }

    fn row(id: &'static str) -> Row {
        Row { id, status: None }
    }

    #[test]
    fn new_ids_are_prepended_and_known_ids_replaced_in_place() {
        let mut store = EntityStore::from_items(vec![row("a")]);

        assert_eq!(store.upsert(row("b")), Upsert::Inserted);
        assert_eq!(store.items(), &[row("b"), row("a")]);

        let done = Row {
            id: "a",
            status: Some("done"),
        };
        assert_eq!(store.upsert(done.clone()), Upsert::Replaced { index: 1 });
        assert_eq!(store.items(), &[row("b"), done]);
    }

    #[test]
    fn get_and_remove_by_id() {
        let mut store = EntityStore::from_items(vec![row("a"), row("b")]);
        assert!(store.get("b").is_some());
        assert_eq!(store.remove("a"), Some(row("a")));
        assert_eq!(store.remove("a"), None);
        assert_eq!(store.len(), 1);
    }
}
