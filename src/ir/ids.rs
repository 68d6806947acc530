//! Newtype IDs for the three id spaces a conversion juggles.
//!
//! YOLO class ids are 0-based positions in a [`ClassTable`](super::ClassTable);
//! COCO and VOC-derived category ids are 1-based. The off-by-one shift
//! between them lives in [`ClassId::to_category_id`] and
//! [`CategoryId::to_class_id`] and nowhere else.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            #[inline]
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            #[inline]
            pub fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Identifier of an image record in a COCO dataset.
    ImageId
);

record_id!(
    /// Identifier of an annotation record in a COCO dataset.
    AnnotationId
);

record_id!(
    /// 1-based category identifier used by COCO records.
    CategoryId
);

impl CategoryId {
    /// Inverse of [`ClassId::to_category_id`].
    ///
    /// Returns `None` for category id 0, which has no YOLO counterpart.
    #[inline]
    pub fn to_class_id(self) -> Option<ClassId> {
        self.0
            .checked_sub(1)
            .and_then(|id| usize::try_from(id).ok())
            .map(ClassId)
    }
}

/// 0-based YOLO class index (the position of a name in the class table).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub usize);

impl ClassId {
    #[inline]
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    #[inline]
    pub fn as_usize(&self) -> usize {
        self.0
    }

    /// The 1-based COCO category id for this class.
    ///
    /// Class ids come from a [`ClassTable`](super::ClassTable) position and
    /// never approach `u64::MAX`; the addition saturates there.
    #[inline]
    pub fn to_category_id(self) -> CategoryId {
        CategoryId((self.0 as u64).saturating_add(1))
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_and_category_ids_shift_by_one() {
        for raw in [0usize, 1, 7, 79] {
            let class_id = ClassId::new(raw);
            let category_id = class_id.to_category_id();
            assert_eq!(category_id.as_u64(), raw as u64 + 1);
            assert_eq!(category_id.to_class_id(), Some(class_id));
        }
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn largest_class_id_saturates_instead_of_overflowing() {
        let category_id = ClassId::new(usize::MAX).to_category_id();
        assert_eq!(category_id, CategoryId::new(u64::MAX));
    }

    #[test]
    fn category_zero_has_no_class() {
        assert_eq!(CategoryId::new(0).to_class_id(), None);
    }

    #[test]
    fn ids_format_like_their_values() {
        assert_eq!(ImageId::new(3).to_string(), "3");
        assert_eq!(format!("{:?}", AnnotationId::new(9)), "AnnotationId(9)");
        assert_eq!(format!("{:?}", ClassId::new(2)), "ClassId(2)");
    }

    #[test]
    fn id_ordering() {
        assert!(ImageId(1) < ImageId(2));
        assert!(CategoryId(10) > CategoryId(5));
    }
}
