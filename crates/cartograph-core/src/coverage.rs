//! Fraction of known items a manifest documents

use serde::Serialize;

use crate::content::{KeyIndex, key_count};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub documented: usize,
    pub total: usize,
    /// Rounded, always within `0..=100`.
    pub percent: u8,
}

impl Coverage {
    pub fn new(documented: usize, total: usize) -> Self {
        let documented = documented.min(total);
        let percent = if total == 0 {
            0
        } else {
            // round half up without floating point
            ((documented * 200 + total) / (2 * total)) as u8
        };
        Coverage {
            documented,
            total,
            percent,
        }
    }

    /// How many of the freshly scanned keys appear in the manifest's index.
    pub fn between(known: &KeyIndex, documented: &KeyIndex) -> Self {
        let hits: usize = known
            .iter()
            .map(|(file, keys)| match documented.get(file) {
                Some(present) => keys.intersection(present).count(),
                None => 0,
            })
            .sum();
        Coverage::new(hits, key_count(known))
    }

    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.documented as f64 / self.total as f64
        }
    }

    /// Fixed-width text bar, e.g. `[#####-----]`.
    pub fn bar(&self, width: usize) -> String {
        let filled = (usize::from(self.percent) * width + 50) / 100;
        let filled = filled.min(width);
        format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
    }
}
