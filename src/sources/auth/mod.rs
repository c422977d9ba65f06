// Request signing for object storage services
pub mod aws;
