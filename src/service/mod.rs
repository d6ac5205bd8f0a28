pub mod audit_service;
pub mod background_jobs;
pub mod error;
pub mod job_service_client;
pub mod jss_service;
pub mod reply_service;
pub mod reputation_service;
pub mod review_service;
pub mod review_validator;
