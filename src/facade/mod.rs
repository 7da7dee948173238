// 存储门面模块

mod index;
mod service;

pub use index::StorageIndex;
pub use service::{FacadeState, StorageFacade, UPLOAD_FIELD_NAME};
