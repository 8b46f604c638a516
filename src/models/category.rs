/// Canonical display form for a category name: whitespace collapsed, each
/// word Title Cased. "back  country" and "BACK COUNTRY" both normalize to
/// "Back Country".
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Ordered, deduplicated set of category names attached to a draft. Entries
/// are held in their normalized form and membership checks normalize their
/// argument the same way, so whitespace and casing variants of one name can
/// never coexist. Insertion order is what the user sees and what gets
/// submitted.
#[derive(Debug, Clone, Default)]
pub struct CategorySelection {
    names: Vec<String>,
}

impl CategorySelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        let lowered = normalize_name(name).to_lowercase();
        self.names.iter().any(|n| n.to_lowercase() == lowered)
    }

    /// Adds the normalized form of `name` unless an equivalent entry is
    /// present. Returns whether the selection changed.
    pub fn add(&mut self, name: impl Into<String>) -> bool {
        let name = normalize_name(&name.into());
        if name.is_empty() || self.contains(&name) {
            return false;
        }
        self.names.push(name);
        true
    }

    /// Removes the entry equivalent to `name`, if any.
    pub fn remove(&mut self, name: &str) -> bool {
        let lowered = normalize_name(name).to_lowercase();
        let before = self.names.len();
        self.names.retain(|n| n.to_lowercase() != lowered);
        before != self.names.len()
    }

    pub fn toggle(&mut self, name: &str) {
        if !self.remove(name) {
            self.add(name);
        }
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_name("back  country"), "Back Country");
        assert_eq!(normalize_name("FREERIDE"), "Freeride");
        assert_eq!(normalize_name("  park &  pipe "), "Park & Pipe");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn add_is_case_insensitive() {
        let mut sel = CategorySelection::new();
        assert!(sel.add("Freeride"));
        assert!(!sel.add("freeride"));
        assert!(!sel.add("FREERIDE"));
        assert_eq!(sel.names(), ["Freeride"]);
    }

    #[test]
    fn add_stores_the_normalized_form() {
        let mut sel = CategorySelection::new();
        assert!(sel.add("ski  trip"));
        assert!(!sel.add("Ski Trip"));
        assert!(!sel.add("SKI   TRIP "));
        assert_eq!(sel.names(), ["Ski Trip"]);

        assert!(!sel.add("   "));
        assert_eq!(sel.len(), 1);

        sel.toggle("ski trip");
        assert!(sel.is_empty());
        sel.toggle("park &  PIPE");
        assert_eq!(sel.names(), ["Park & Pipe"]);
    }

    #[test]
    fn toggle_flips_membership_preserving_order() {
        let mut sel = CategorySelection::new();
        sel.add("Powder");
        sel.add("Park");
        sel.toggle("powder");
        assert_eq!(sel.names(), ["Park"]);
        sel.toggle("Powder");
        assert_eq!(sel.names(), ["Park", "Powder"]);
    }

    #[test]
    fn remove_missing_is_noop() {
        let mut sel = CategorySelection::new();
        sel.add("Touring");
        assert!(!sel.remove("racing"));
        assert_eq!(sel.len(), 1);
    }
}
