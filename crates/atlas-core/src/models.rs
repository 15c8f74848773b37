pub mod access_list;
pub mod restore_job;
