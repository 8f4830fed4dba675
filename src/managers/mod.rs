pub mod backup;
pub mod logging;
