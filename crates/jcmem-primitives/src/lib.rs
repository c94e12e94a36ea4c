//! Shared vocabulary for the card memory runtime: element kinds, persistence
//! classes, and the stable event / memory-type codes applets branch on.

#[macro_use]
mod macros;

///
/// CONSTANTS
///

/// `isTransient` result for persistent objects.
pub const NOT_A_TRANSIENT_OBJECT: u8 = 0;

/// Transient contents are cleared on card reset.
pub const CLEAR_ON_RESET: u8 = 1;

/// Transient contents are cleared on applet deselection (and on reset).
pub const CLEAR_ON_DESELECT: u8 = 2;

pub const MEMORY_TYPE_PERSISTENT: u8 = 0;
pub const MEMORY_TYPE_TRANSIENT_RESET: u8 = 1;
pub const MEMORY_TYPE_TRANSIENT_DESELECT: u8 = 2;

/// Largest array length addressable with a card `short`.
pub const MAX_ARRAY_LENGTH: usize = i16::MAX as usize;

///
/// ElementKind
///
/// Element type of a card array. Discriminant codes follow the
/// `ARRAY_TYPE_*` numbering.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ElementKind {
    Boolean,
    Byte,
    Short,
    Int,
    Object,
}

impl ElementKind {
    /// Return the full metadata descriptor for one element kind.
    #[must_use]
    pub const fn metadata(self) -> ElementMetadata {
        element_kind_registry!(metadata_from_registry, self)
    }

    /// Resolve an `ARRAY_TYPE_*` code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        element_kind_registry!(kind_from_code_registry, code)
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        self.metadata().code
    }

    /// Storage width of one element, in bytes.
    #[must_use]
    pub const fn width(self) -> usize {
        self.metadata().width
    }

    #[must_use]
    pub const fn is_primitive(self) -> bool {
        self.metadata().is_primitive
    }

    /// Return whether the generic copy/fill/compare/find engine accepts this kind.
    #[must_use]
    pub const fn supports_generic_ops(self) -> bool {
        self.metadata().supports_generic_ops
    }

    #[must_use]
    pub const fn supports_transient(self) -> bool {
        self.metadata().supports_transient
    }

    /// Number of `narrow` elements packed into one `self` element.
    ///
    /// Returns `None` when `narrow` is wider than `self`.
    #[must_use]
    pub const fn width_ratio(self, narrow: Self) -> Option<usize> {
        let wide = self.width();
        let small = narrow.width();
        if small == 0 || wide < small {
            None
        } else {
            Some(wide / small)
        }
    }
}

///
/// ElementMetadata
///
/// Capability metadata for one element kind.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ElementMetadata {
    pub code: u8,
    pub width: usize,
    pub is_primitive: bool,
    pub supports_generic_ops: bool,
    pub supports_transient: bool,
}

/// Ordered list of all element kinds in registry order.
pub const ALL_ELEMENT_KINDS: [ElementKind; 5] = element_kind_registry!(all_kinds_from_registry);

///
/// PersistenceClass
///
/// Lifetime of an array's contents. Fixed at creation.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PersistenceClass {
    Persistent,
    TransientReset,
    TransientDeselect,
}

impl PersistenceClass {
    /// Resolve a `CLEAR_ON_*` event code. Only transient classes have one.
    #[must_use]
    pub const fn from_event(event: u8) -> Option<Self> {
        match event {
            CLEAR_ON_RESET => Some(Self::TransientReset),
            CLEAR_ON_DESELECT => Some(Self::TransientDeselect),
            _ => None,
        }
    }

    /// Resolve a `MEMORY_TYPE_*` code.
    #[must_use]
    pub const fn from_memory_type(memory_type: u8) -> Option<Self> {
        match memory_type {
            MEMORY_TYPE_PERSISTENT => Some(Self::Persistent),
            MEMORY_TYPE_TRANSIENT_RESET => Some(Self::TransientReset),
            MEMORY_TYPE_TRANSIENT_DESELECT => Some(Self::TransientDeselect),
            _ => None,
        }
    }

    /// Value reported by `isTransient`.
    #[must_use]
    pub const fn event_code(self) -> u8 {
        match self {
            Self::Persistent => NOT_A_TRANSIENT_OBJECT,
            Self::TransientReset => CLEAR_ON_RESET,
            Self::TransientDeselect => CLEAR_ON_DESELECT,
        }
    }

    #[must_use]
    pub const fn memory_type(self) -> u8 {
        match self {
            Self::Persistent => MEMORY_TYPE_PERSISTENT,
            Self::TransientReset => MEMORY_TYPE_TRANSIENT_RESET,
            Self::TransientDeselect => MEMORY_TYPE_TRANSIENT_DESELECT,
        }
    }

    #[must_use]
    pub const fn is_persistent(self) -> bool {
        matches!(self, Self::Persistent)
    }

    #[must_use]
    pub const fn is_transient(self) -> bool {
        !self.is_persistent()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_codes_round_trip_through_registry() {
        for kind in ALL_ELEMENT_KINDS {
            assert_eq!(ElementKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ElementKind::from_code(0), None);
        assert_eq!(ElementKind::from_code(6), None);
    }

    #[test]
    fn generic_ops_are_limited_to_numeric_primitives() {
        let generic = ALL_ELEMENT_KINDS
            .into_iter()
            .filter(|kind| kind.supports_generic_ops())
            .collect::<Vec<_>>();

        assert_eq!(
            generic,
            vec![ElementKind::Byte, ElementKind::Short, ElementKind::Int]
        );
    }

    #[test]
    fn width_ratio_only_defined_from_wide_to_narrow() {
        assert_eq!(ElementKind::Int.width_ratio(ElementKind::Byte), Some(4));
        assert_eq!(ElementKind::Int.width_ratio(ElementKind::Short), Some(2));
        assert_eq!(ElementKind::Short.width_ratio(ElementKind::Short), Some(1));
        assert_eq!(ElementKind::Byte.width_ratio(ElementKind::Int), None);
    }

    #[test]
    fn persistence_event_codes_are_stable() {
        assert_eq!(PersistenceClass::from_event(1), Some(PersistenceClass::TransientReset));
        assert_eq!(PersistenceClass::from_event(2), Some(PersistenceClass::TransientDeselect));
        assert_eq!(PersistenceClass::from_event(0), None);
        assert_eq!(PersistenceClass::Persistent.event_code(), NOT_A_TRANSIENT_OBJECT);
        assert_eq!(
            PersistenceClass::from_memory_type(MEMORY_TYPE_PERSISTENT),
            Some(PersistenceClass::Persistent)
        );
        assert_eq!(PersistenceClass::from_memory_type(3), None);
    }
}
