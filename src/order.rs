//! Canonical filter ordering.
//!
//! Every built-in filter occupies a named slot with a fixed integer rank; user-supplied
//! filters are placed relative to those slots. `before`/`after` directives interpolate a
//! rank adjacent to the anchor and never conflict with anything; they only constrain
//! relative order. `position`, `FIRST` and `LAST` are exclusive claims: the filter *is*
//! the occupant of that rank, and a second claimant is a configuration error, not a tie
//! to be broken silently.
//!
//! Slot ranks are spaced so interpolated ranks can never collide with an exact claim.

use crate::error::{CompileError, PlacementError};

/// A named position in the canonical filter order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterSlot {
    Channel,
    ConcurrentSession,
    SecurityContext,
    Logout,
    X509,
    Authentication,
    LoginPageGenerating,
    BasicAuth,
    SecurityContextHolderAware,
    RememberMe,
    Anonymous,
    ExceptionTranslation,
    SessionManagement,
    Authorization,
}

impl FilterSlot {
    pub const fn rank(self) -> u32 {
        match self {
            FilterSlot::Channel => 100,
            FilterSlot::ConcurrentSession => 200,
            FilterSlot::SecurityContext => 300,
            FilterSlot::Logout => 400,
            FilterSlot::X509 => 500,
            FilterSlot::Authentication => 600,
            FilterSlot::LoginPageGenerating => 700,
            FilterSlot::BasicAuth => 800,
            FilterSlot::SecurityContextHolderAware => 900,
            FilterSlot::RememberMe => 1000,
            FilterSlot::Anonymous => 1100,
            FilterSlot::ExceptionTranslation => 1200,
            FilterSlot::SessionManagement => 1300,
            FilterSlot::Authorization => 1400,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            FilterSlot::Channel => "CHANNEL",
            FilterSlot::ConcurrentSession => "CONCURRENT_SESSION",
            FilterSlot::SecurityContext => "SECURITY_CONTEXT",
            FilterSlot::Logout => "LOGOUT",
            FilterSlot::X509 => "X509",
            FilterSlot::Authentication => "AUTHENTICATION",
            FilterSlot::LoginPageGenerating => "LOGIN_PAGE_GENERATING",
            FilterSlot::BasicAuth => "BASIC_AUTH",
            FilterSlot::SecurityContextHolderAware => "SECURITY_CONTEXT_HOLDER_AWARE",
            FilterSlot::RememberMe => "REMEMBER_ME",
            FilterSlot::Anonymous => "ANONYMOUS",
            FilterSlot::ExceptionTranslation => "EXCEPTION_TRANSLATION",
            FilterSlot::SessionManagement => "SESSION_MANAGEMENT",
            FilterSlot::Authorization => "AUTHORIZATION",
        }
    }

    pub fn from_name(name: &str) -> Option<FilterSlot> {
        Self::all().into_iter().find(|s| s.name() == name)
    }

    /// All slots in canonical rank order.
    pub const fn all() -> [FilterSlot; 14] {
        [
            FilterSlot::Channel,
            FilterSlot::ConcurrentSession,
            FilterSlot::SecurityContext,
            FilterSlot::Logout,
            FilterSlot::X509,
            FilterSlot::Authentication,
            FilterSlot::LoginPageGenerating,
            FilterSlot::BasicAuth,
            FilterSlot::SecurityContextHolderAware,
            FilterSlot::RememberMe,
            FilterSlot::Anonymous,
            FilterSlot::ExceptionTranslation,
            FilterSlot::SessionManagement,
            FilterSlot::Authorization,
        ]
    }
}

/// Placement directive for a filter submitted to the order registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// A built-in filter at its canonical slot. Exclusive.
    Slot(FilterSlot),
    /// Immediately after the anchor slot. Non-exclusive; ties keep declaration order.
    After(FilterSlot),
    /// Immediately before the anchor slot. Non-exclusive.
    Before(FilterSlot),
    /// An exact claim on a slot's rank. Exclusive.
    Position(FilterSlot),
    /// The very front of the chain. Exclusive.
    First,
    /// The very end of the chain. Exclusive.
    Last,
}

impl Placement {
    fn rank(self) -> u32 {
        match self {
            Placement::Slot(s) | Placement::Position(s) => s.rank(),
            Placement::After(s) => s.rank() + 1,
            Placement::Before(s) => s.rank() - 1,
            Placement::First => 0,
            Placement::Last => u32::MAX,
        }
    }

    fn is_exclusive(self) -> bool {
        matches!(
            self,
            Placement::Slot(_) | Placement::Position(_) | Placement::First | Placement::Last
        )
    }

    fn describe(self) -> String {
        match self {
            Placement::Slot(s) | Placement::Position(s) => s.name().to_string(),
            Placement::After(s) => format!("after {}", s.name()),
            Placement::Before(s) => format!("before {}", s.name()),
            Placement::First => "FIRST".to_string(),
            Placement::Last => "LAST".to_string(),
        }
    }
}

struct Entry<T> {
    name: String,
    placement: Placement,
    seq: usize,
    payload: T,
}

/// Merges built-in and user-supplied filters into a single total order.
///
/// Registration order is preserved for equal ranks, which gives multiple `after: X`
/// entries a stable sub-order immediately following X.
pub struct FilterOrderRegistry<T> {
    entries: Vec<Entry<T>>,
}

impl<T> FilterOrderRegistry<T> {
    pub fn new() -> Self {
        FilterOrderRegistry { entries: Vec::new() }
    }

    pub fn register(&mut self, name: impl Into<String>, placement: Placement, payload: T) {
        let seq = self.entries.len();
        self.entries.push(Entry {
            name: name.into(),
            placement,
            seq,
            payload,
        });
    }

    /// Resolve the total order, or fail naming both claimants of a contested rank.
    pub fn finalize(self) -> Result<Vec<T>, CompileError> {
        let mut entries = self.entries;
        entries.sort_by_key(|e| (e.placement.rank(), e.seq));

        // Exclusive-claim detection is a post-pass over the sorted sequence: equal-rank
        // entries are adjacent after the sort.
        for pair in entries.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a.placement.rank() == b.placement.rank()
                && a.placement.is_exclusive()
                && b.placement.is_exclusive()
            {
                return Err(PlacementError::DuplicateRank {
                    first: a.name.clone(),
                    second: b.name.clone(),
                    slot: a.placement.describe(),
                }
                .into());
            }
        }

        Ok(entries.into_iter().map(|e| e.payload).collect())
    }
}

impl<T> Default for FilterOrderRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_slots_are_strictly_ordered() {
        let ranks: Vec<u32> = FilterSlot::all().iter().map(|s| s.rank()).collect();
        let mut sorted = ranks.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ranks, sorted);
    }

    #[test]
    fn slot_names_round_trip() {
        for slot in FilterSlot::all() {
            assert_eq!(FilterSlot::from_name(slot.name()), Some(slot));
        }
        assert_eq!(FilterSlot::from_name("NOT_A_SLOT"), None);
    }

    #[test]
    fn after_entries_keep_declaration_order() {
        let mut registry = FilterOrderRegistry::new();
        registry.register("logout", Placement::Slot(FilterSlot::Logout), "logout");
        registry.register("first-after", Placement::After(FilterSlot::Logout), "a");
        registry.register("second-after", Placement::After(FilterSlot::Logout), "b");
        let order = registry.finalize().unwrap();
        assert_eq!(order, vec!["logout", "a", "b"]);
    }

    #[test]
    fn before_lands_ahead_of_anchor() {
        let mut registry = FilterOrderRegistry::new();
        registry.register("logout", Placement::Slot(FilterSlot::Logout), "logout");
        registry.register("pre", Placement::Before(FilterSlot::Logout), "pre");
        let order = registry.finalize().unwrap();
        assert_eq!(order, vec!["pre", "logout"]);
    }

    #[test]
    fn first_bucket_precedes_all_slots() {
        let mut registry = FilterOrderRegistry::new();
        registry.register("channel", Placement::Slot(FilterSlot::Channel), "channel");
        registry.register("mine", Placement::First, "mine");
        let order = registry.finalize().unwrap();
        assert_eq!(order, vec!["mine", "channel"]);
    }

    #[test]
    fn exact_claim_on_occupied_slot_is_rejected_naming_both() {
        let mut registry = FilterOrderRegistry::new();
        registry.register("logout", Placement::Slot(FilterSlot::Logout), ());
        registry.register("mine", Placement::Position(FilterSlot::Logout), ());
        let err = registry.finalize().unwrap_err();
        match err {
            CompileError::Placement(PlacementError::DuplicateRank { first, second, slot }) => {
                assert_eq!(first, "logout");
                assert_eq!(second, "mine");
                assert_eq!(slot, "LOGOUT");
            }
            other => panic!("expected DuplicateRank, got {other:?}"),
        }
    }

    #[test]
    fn two_first_claims_are_rejected() {
        let mut registry = FilterOrderRegistry::new();
        registry.register("one", Placement::First, ());
        registry.register("two", Placement::First, ());
        assert!(matches!(
            registry.finalize(),
            Err(CompileError::Placement(PlacementError::DuplicateRank { .. }))
        ));
    }

    #[test]
    fn interpolated_placements_never_conflict() {
        let mut registry = FilterOrderRegistry::new();
        registry.register("logout", Placement::Slot(FilterSlot::Logout), "logout");
        registry.register("a", Placement::After(FilterSlot::Logout), "a");
        registry.register("b", Placement::After(FilterSlot::Logout), "b");
        registry.register("c", Placement::Before(FilterSlot::Logout), "c");
        assert!(registry.finalize().is_ok());
    }
}
