pub mod location;
pub mod location_log;
pub mod media;
pub mod metadata;
pub mod notification;
pub mod storage;
pub mod workflow;
