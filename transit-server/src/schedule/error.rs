//! Schedule error types.

/// Errors from schedule lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// No calendar row for the given service
    #[error("service id not found: {0}")]
    ServiceNotFound(String),
}

/// Errors that prevent a schedule from loading.
///
/// Any of these is fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The GTFS archive could not be read or parsed
    #[error("failed to read GTFS feed: {0}")]
    Gtfs(#[from] gtfs_structures::Error),

    /// The blocking loader task panicked or was cancelled
    #[error("GTFS loader task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The feed declares no agency, so there is no timezone to anchor to
    #[error("feed has no agencies")]
    NoAgency,

    /// Agencies disagree on timezone
    #[error("inconsistent agency timezones: {first} and {second}")]
    InconsistentTimezones { first: String, second: String },

    /// Timezone name is not a known IANA zone
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    /// A record refers to an entity that does not exist
    #[error("{entity} {id} references unknown {target} {target_id}")]
    DanglingReference {
        entity: &'static str,
        id: String,
        target: &'static str,
        target_id: String,
    },

    /// Stop sequence values within a trip repeat
    #[error("trip {trip_id}: stop_sequence {sequence} does not increase")]
    StopSequence { trip_id: String, sequence: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ScheduleError::ServiceNotFound("WK".into());
        assert_eq!(err.to_string(), "service id not found: WK");

        let err = LoadError::InconsistentTimezones {
            first: "America/Halifax".into(),
            second: "America/Toronto".into(),
        };
        assert_eq!(
            err.to_string(),
            "inconsistent agency timezones: America/Halifax and America/Toronto"
        );

        let err = LoadError::DanglingReference {
            entity: "trip",
            id: "T1".into(),
            target: "route",
            target_id: "R9".into(),
        };
        assert_eq!(err.to_string(), "trip T1 references unknown route R9");
    }
}
