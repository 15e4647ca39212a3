pub mod cloudinary;
pub mod hosting;
pub mod media_policy;
pub mod upload_service;
