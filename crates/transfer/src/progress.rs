/// Folds per-unit percentages into one batch percentage.
///
/// The aggregate is `floor(mean(unit percentages))`. Each unit's last-known
/// percentage only ever rises, so the aggregate never decreases.
#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    units: Vec<u8>,
    published: Option<u8>,
}

impl ProgressAggregator {
    /// Creates an aggregator for `unit_count` units, all at 0%.
    pub fn new(unit_count: usize) -> Self {
        Self {
            units: vec![0; unit_count],
            published: None,
        }
    }

    /// Records `percent` for the unit at `index`.
    ///
    /// Returns the aggregate when it should be published: the first call,
    /// and every call after which the aggregate rose. Out-of-range indices
    /// are ignored.
    pub fn update(&mut self, index: usize, percent: u8) -> Option<u8> {
        let slot = self.units.get_mut(index)?;
        *slot = (*slot).max(percent.min(100));

        let aggregate = self.aggregate();
        match self.published {
            Some(last) if aggregate <= last => None,
            _ => {
                self.published = Some(aggregate);
                Some(aggregate)
            }
        }
    }

    /// Current aggregate percentage.
    pub fn aggregate(&self) -> u8 {
        if self.units.is_empty() {
            return 0;
        }
        let sum: u32 = self.units.iter().map(|&p| u32::from(p)).sum();
        (sum / self.units.len() as u32) as u8
    }

    /// Last published aggregate, if any.
    pub fn published(&self) -> Option<u8> {
        self.published
    }

    /// Last-known percentage of every unit, in submission order.
    pub fn unit_percents(&self) -> &[u8] {
        &self.units
    }
}
