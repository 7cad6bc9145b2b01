pub mod aws;
pub mod eventbridge;
pub mod icons;
pub mod metrics;
pub mod notices;
pub mod scheduler;
