//! Threshold bands: explicit interval checks used by the field-local classifiers.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Inclusive(f64),
    Exclusive(f64),
    Unbounded,
}

impl Bound {
    fn admits_above(&self, value: f64) -> bool {
        match *self {
            Bound::Inclusive(b) => value >= b,
            Bound::Exclusive(b) => value > b,
            Bound::Unbounded => true,
        }
    }

    fn admits_below(&self, value: f64) -> bool {
        match *self {
            Bound::Inclusive(b) => value <= b,
            Bound::Exclusive(b) => value < b,
            Bound::Unbounded => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Band<L> {
    pub label: L,
    pub lower: Bound,
    pub upper: Bound,
}

impl<L> Band<L> {
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && self.lower.admits_above(value) && self.upper.admits_below(value)
    }
}

/// Ordered set of bands covering the real line without gaps or overlaps.
#[derive(Debug, Clone)]
pub struct BandSet<L> {
    bands: Vec<Band<L>>,
}

impl<L: Copy> BandSet<L> {
    /// `(-inf, low)`, `[low, high]`, `(high, +inf)`.
    ///
    /// The middle band is closed on both ends, so values exactly at either
    /// threshold land in it.
    pub fn three_tier(low_threshold: f64, high_threshold: f64, labels: [L; 3]) -> Self {
        let [low, middle, high] = labels;
        Self {
            bands: vec![
                Band {
                    label: low,
                    lower: Bound::Unbounded,
                    upper: Bound::Exclusive(low_threshold),
                },
                Band {
                    label: middle,
                    lower: Bound::Inclusive(low_threshold),
                    upper: Bound::Inclusive(high_threshold),
                },
                Band {
                    label: high,
                    lower: Bound::Exclusive(high_threshold),
                    upper: Bound::Unbounded,
                },
            ],
        }
    }

    /// Label of the band containing `value`; `None` only for non-finite input.
    pub fn classify(&self, value: f64) -> Option<L> {
        self.bands
            .iter()
            .find(|band| band.contains(value))
            .map(|band| band.label)
    }

    /// Number of bands admitting `value`. Exactly 1 for every finite value.
    pub fn coverage(&self, value: f64) -> usize {
        self.bands.iter().filter(|band| band.contains(value)).count()
    }
}
