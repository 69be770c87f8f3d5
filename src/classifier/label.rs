use serde::{Serialize, Deserialize};
use std::fmt;

/// The four diagnostic categories, in classifier output order.
///
/// The discriminants are the output indices of both backends; reordering
/// the variants would mislabel every prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TumorClass {
    Glioma = 0,
    Meningioma = 1,
    NoTumor = 2,
    Pituitary = 3,
}

impl TumorClass {
    pub const COUNT: usize = 4;

    pub const ALL: [TumorClass; TumorClass::COUNT] = [
        TumorClass::Glioma,
        TumorClass::Meningioma,
        TumorClass::NoTumor,
        TumorClass::Pituitary,
    ];

    pub fn from_index(index: usize) -> Option<TumorClass> {
        TumorClass::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            TumorClass::Glioma => "Glioma",
            TumorClass::Meningioma => "Meningioma",
            TumorClass::NoTumor => "No tumor",
            TumorClass::Pituitary => "Pituitary",
        }
    }
}

impl fmt::Display for TumorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
