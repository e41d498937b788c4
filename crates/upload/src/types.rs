//! Data types for the batch upload flow.

use std::sync::Arc;

use packdesk_protocol::MAX_IMAGES_PER_PACKAGE;
use packdesk_transfer::{FileDescriptor, ProgressAggregator, timestamped_key};

use crate::error::UploadError;

/// Default per-file ceiling: `10000 * 1024 * 1024` bytes.
///
/// The admin form labels this "10MB" but the value is ~9.77 GiB. Kept as
/// is until the intended limit is confirmed; override it via
/// [`UploadPolicy::max_file_bytes`].
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10000 * 1024 * 1024;

/// Admission limits applied before a batch starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Largest accepted file, in bytes.
    pub max_file_bytes: u64,
    /// Images a package may hold, counting ones already attached.
    pub max_images: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_images: MAX_IMAGES_PER_PACKAGE,
        }
    }
}

impl UploadPolicy {
    /// Checks a whole batch. Nothing may be uploaded unless this passes.
    ///
    /// The image count is checked first, then every file's size.
    pub fn admit(
        &self,
        files: &[FileDescriptor],
        current_image_count: usize,
    ) -> Result<(), UploadError> {
        if files.is_empty() || files.len() + current_image_count > self.max_images {
            return Err(UploadError::TooManyImages {
                selected: files.len(),
                existing: current_image_count,
                max: self.max_images,
            });
        }

        if let Some(file) = files.iter().find(|f| f.byte_size() > self.max_file_bytes) {
            return Err(UploadError::FileTooLarge {
                name: file.name().to_string(),
                size: file.byte_size(),
                max: self.max_file_bytes,
            });
        }

        Ok(())
    }
}

/// Derives the destination key for a file.
pub type DestinationKeyFn = Arc<dyn Fn(&FileDescriptor) -> String + Send + Sync>;

/// Timestamp + random suffix + file name, see [`timestamped_key`].
pub fn default_key_fn() -> DestinationKeyFn {
    Arc::new(|file: &FileDescriptor| timestamped_key(file.name()))
}

/// Percentage reported by one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitProgress {
    pub index: usize,
    pub percent: u8,
}

/// Latest aggregate percentage of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchProgress {
    pub batch_id: String,
    pub percent: u8,
}

/// Event emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    /// The batch passed admission and its units were launched.
    Started { batch_id: String, files: usize },
    /// The aggregate percentage rose.
    Progress { batch_id: String, percent: u8 },
    /// One unit stored its file.
    UnitCompleted {
        batch_id: String,
        index: usize,
        url: String,
    },
    /// One unit failed or was cancelled.
    UnitFailed {
        batch_id: String,
        index: usize,
        error: String,
    },
    /// Every unit succeeded.
    Resolved { batch_id: String, urls: Vec<String> },
    /// The batch was refused or at least one unit failed.
    Rejected { batch_id: String, reason: String },
}

/// Terminal state of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BatchOutcome {
    #[default]
    Pending,
    Resolved(Vec<String>),
    Rejected(String),
}

/// State of one batch, owned by a single `submit` call.
#[derive(Debug)]
pub struct BatchState {
    batch_id: String,
    aggregator: ProgressAggregator,
    outcome: BatchOutcome,
}

impl BatchState {
    pub fn new(batch_id: String, unit_count: usize) -> Self {
        Self {
            batch_id,
            aggregator: ProgressAggregator::new(unit_count),
            outcome: BatchOutcome::Pending,
        }
    }

    /// Records a unit's percentage. Returns the aggregate when it should be
    /// published. Ignored once the batch is settled.
    pub fn record(&mut self, progress: UnitProgress) -> Option<u8> {
        if self.is_settled() {
            return None;
        }
        self.aggregator.update(progress.index, progress.percent)
    }

    /// Moves the batch to a terminal outcome.
    ///
    /// Returns `false` (and changes nothing) if the batch is already settled
    /// or `outcome` is `Pending`.
    pub fn settle(&mut self, outcome: BatchOutcome) -> bool {
        if self.is_settled() || outcome == BatchOutcome::Pending {
            return false;
        }
        self.outcome = outcome;
        true
    }

    pub fn is_settled(&self) -> bool {
        self.outcome != BatchOutcome::Pending
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn aggregate_percent(&self) -> u8 {
        self.aggregator.aggregate()
    }

    pub fn outcome(&self) -> &BatchOutcome {
        &self.outcome
    }
}

/// Outcome of one unit, tagged with the order in which units settled.
#[derive(Debug)]
pub struct UnitReport {
    pub index: usize,
    /// 0 for the first unit to finish, 1 for the second, and so on.
    pub settled_order: usize,
    pub outcome: Result<String, UploadError>,
}

/// Every unit's outcome, in submission order.
#[derive(Debug)]
pub struct BatchReport {
    pub batch_id: String,
    pub units: Vec<UnitReport>,
}

impl BatchReport {
    /// Builds a report, ordering units by submission index.
    pub fn new(batch_id: String, mut units: Vec<UnitReport>) -> Self {
        units.sort_by_key(|u| u.index);
        Self { batch_id, units }
    }

    /// Position in `units` of the failure that settled first.
    fn first_failure(&self) -> Option<usize> {
        self.units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.outcome.is_err())
            .min_by_key(|(_, u)| u.settled_order)
            .map(|(pos, _)| pos)
    }

    /// All-or-nothing view of the batch.
    pub fn outcome(&self) -> BatchOutcome {
        if let Some(pos) = self.first_failure() {
            let reason = match &self.units[pos].outcome {
                Err(e) => e.to_string(),
                Ok(_) => String::new(),
            };
            return BatchOutcome::Rejected(reason);
        }
        BatchOutcome::Resolved(self.succeeded().map(|(_, url)| url.to_string()).collect())
    }

    /// Units that stored their file, as `(index, url)`.
    pub fn succeeded(&self) -> impl Iterator<Item = (usize, &str)> {
        self.units
            .iter()
            .filter_map(|u| u.outcome.as_ref().ok().map(|url| (u.index, url.as_str())))
    }

    /// URLs in submission order, or the first failure observed.
    pub fn into_result(mut self) -> Result<Vec<String>, UploadError> {
        if let Some(pos) = self.first_failure() {
            return match self.units.swap_remove(pos).outcome {
                Err(e) => Err(e),
                Ok(_) => Err(UploadError::Transport("inconsistent batch report".into())),
            };
        }
        Ok(self
            .units
            .into_iter()
            .filter_map(|u| u.outcome.ok())
            .collect())
    }
}
