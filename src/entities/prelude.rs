pub use super::upload_records::Entity as UploadRecords;
