pub mod http_client;
pub mod line_files;
