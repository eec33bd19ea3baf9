pub mod ports;
pub mod merge_files_use_case;
