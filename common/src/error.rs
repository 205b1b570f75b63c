use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("workers must be registered before the first scheduling pass")]
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("address range {address}..{end} is outside the {capacity} byte store")]
    OutOfRange {
        address: usize,
        end: usize,
        capacity: usize,
    },
    #[error("storage device error: {0}")]
    Device(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorFault {
    #[error("no reading taken yet")]
    NotReady,
    #[error("sensor timed out")]
    Timeout,
    #[error("sensor checksum mismatch")]
    Checksum,
}
