pub mod access_list;
pub mod restore_job;

pub use access_list::AccessListResource;
pub use restore_job::RestoreJobResource;
