//! The cache manager's state machine as a pure transition function.
//!
//! Five states, four inputs, one action per transition. The manager's run
//! loop owns the side effects (dispatching, cancelling, stashing, purging);
//! this table only decides them, which keeps every cell unit-testable.

/// Where the manager is between inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// No work in flight.
    Idle,
    /// A user-triggered refresh for one search is running.
    Refreshing,
    /// A timer-triggered full refresh is running.
    PeriodicUpdating,
    /// A refresh arrived while something else was running; deferred.
    PendingRefresh,
    /// A sign-out arrived while an update was running; deferred.
    PendingClearCache,
}

/// The inputs the table ranges over. Parameters ride alongside in the run
/// loop; the table only needs the shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineInput {
    Refresh,
    PeriodicTick,
    ClearCache,
    Terminal,
}

/// What the run loop must do for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineAction {
    None,
    /// Dispatch the incoming refresh.
    StartRefresh,
    /// Dispatch a full `All` update.
    StartPeriodic,
    /// Cancel the in-flight dispatch and stash the incoming refresh.
    CancelAndStash,
    /// Replace the stashed refresh with the incoming one.
    ReplaceStash,
    /// Cancel the in-flight dispatch (clear-cache is now pending).
    CancelInFlight,
    /// Purge immediately (nothing was in flight).
    Purge,
    /// Dispatch the stashed refresh (previous work just terminated).
    StartStashedRefresh,
    /// Purge now that the in-flight work has terminated.
    PurgeDeferred,
    /// A terminal event with nothing in flight; log and drop.
    Invalid,
}

/// The transition table of the five-state machine.
pub(crate) fn transition(state: ManagerState, input: MachineInput) -> (ManagerState, MachineAction) {
    use MachineAction as A;
    use MachineInput as I;
    use ManagerState as S;

    match (state, input) {
        // refresh(p)
        (S::Idle, I::Refresh) => (S::Refreshing, A::StartRefresh),
        (S::Refreshing, I::Refresh) => (S::PendingRefresh, A::CancelAndStash),
        (S::PeriodicUpdating, I::Refresh) => (S::PendingRefresh, A::CancelAndStash),
        (S::PendingRefresh, I::Refresh) => (S::PendingRefresh, A::ReplaceStash),
        (S::PendingClearCache, I::Refresh) => (S::PendingClearCache, A::None),

        // periodic tick: never pre-empts anything
        (S::Idle, I::PeriodicTick) => (S::PeriodicUpdating, A::StartPeriodic),
        (s, I::PeriodicTick) => (s, A::None),

        // clear cache: wins over any pending refresh
        (S::Idle, I::ClearCache) => (S::Idle, A::Purge),
        (S::PendingClearCache, I::ClearCache) => (S::PendingClearCache, A::None),
        (_, I::ClearCache) => (S::PendingClearCache, A::CancelInFlight),

        // terminal event from the in-flight dispatch
        (S::Refreshing, I::Terminal) => (S::Idle, A::None),
        (S::PeriodicUpdating, I::Terminal) => (S::Idle, A::None),
        (S::PendingRefresh, I::Terminal) => (S::Refreshing, A::StartStashedRefresh),
        (S::PendingClearCache, I::Terminal) => (S::Idle, A::PurgeDeferred),
        (S::Idle, I::Terminal) => (S::Idle, A::Invalid),
    }
}

#[cfg(test)]
mod tests {
    use super::MachineAction as A;
    use super::MachineInput as I;
    use super::ManagerState as S;
    use super::*;

    #[test]
    fn refresh_column() {
        assert_eq!(transition(S::Idle, I::Refresh), (S::Refreshing, A::StartRefresh));
        assert_eq!(
            transition(S::Refreshing, I::Refresh),
            (S::PendingRefresh, A::CancelAndStash)
        );
        assert_eq!(
            transition(S::PeriodicUpdating, I::Refresh),
            (S::PendingRefresh, A::CancelAndStash)
        );
        assert_eq!(
            transition(S::PendingRefresh, I::Refresh),
            (S::PendingRefresh, A::ReplaceStash)
        );
        assert_eq!(
            transition(S::PendingClearCache, I::Refresh),
            (S::PendingClearCache, A::None)
        );
    }

    #[test]
    fn periodic_column_only_fires_from_idle() {
        assert_eq!(
            transition(S::Idle, I::PeriodicTick),
            (S::PeriodicUpdating, A::StartPeriodic)
        );
        for s in [
            S::Refreshing,
            S::PeriodicUpdating,
            S::PendingRefresh,
            S::PendingClearCache,
        ] {
            assert_eq!(transition(s, I::PeriodicTick), (s, A::None));
        }
    }

    #[test]
    fn clear_cache_column() {
        assert_eq!(transition(S::Idle, I::ClearCache), (S::Idle, A::Purge));
        for s in [S::Refreshing, S::PeriodicUpdating, S::PendingRefresh] {
            assert_eq!(
                transition(s, I::ClearCache),
                (S::PendingClearCache, A::CancelInFlight)
            );
        }
        assert_eq!(
            transition(S::PendingClearCache, I::ClearCache),
            (S::PendingClearCache, A::None)
        );
    }

    #[test]
    fn terminal_column_drains_pending_work() {
        assert_eq!(transition(S::Refreshing, I::Terminal), (S::Idle, A::None));
        assert_eq!(transition(S::PeriodicUpdating, I::Terminal), (S::Idle, A::None));
        assert_eq!(
            transition(S::PendingRefresh, I::Terminal),
            (S::Refreshing, A::StartStashedRefresh)
        );
        assert_eq!(
            transition(S::PendingClearCache, I::Terminal),
            (S::Idle, A::PurgeDeferred)
        );
        assert_eq!(transition(S::Idle, I::Terminal), (S::Idle, A::Invalid));
    }

    #[test]
    fn clear_cache_outranks_pending_refresh() {
        // A refresh is pending, then sign-out arrives: the stash is dropped
        // in favor of the purge, and the terminal event drains to idle.
        let (s, a) = transition(S::PendingRefresh, I::ClearCache);
        assert_eq!((s, a), (S::PendingClearCache, A::CancelInFlight));
        let (s, a) = transition(s, I::Terminal);
        assert_eq!((s, a), (S::Idle, A::PurgeDeferred));
    }
}
