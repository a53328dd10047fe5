//! The simulation snapshot collaborator.

/// Mutable snapshot of simulated entities and the current simulated time.
///
/// Two copies exist during a forward seek: the live state that is rendered
/// and a shadow copy that is fast-played and only committed on success.
/// `replay` must behave identically on either copy.
pub trait Snapshot: Clone + Default {
    /// One opaque, ordered chunk of recorded events.
    type Batch;

    /// Apply one batch. Time never decreases.
    fn replay(&mut self, batch: Self::Batch);

    /// Advance sub-tick interpolation. Returns whether anything visible changed.
    fn animate(&mut self) -> bool;

    /// Current simulated time.
    fn time(&self) -> u64;

    /// Whether the initial entity set has been created.
    fn has_entities(&self) -> bool;
}
