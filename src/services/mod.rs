//! Store access and the WebDAV translation machinery built on it.

pub mod dav_service;
pub mod dav_xml;
pub mod fanout;
pub mod listing;
pub mod memory_store;
pub mod s3_client;
pub mod sigv4;
pub mod store;
