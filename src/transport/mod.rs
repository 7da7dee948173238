// 外部传输能力模块
//
// - 客户端保存：给定内容和文件名，触发一次下载
// - 上传：给定内容和文件名，以 multipart 方式 POST 到服务器

mod saver;
mod uploader;

pub use saver::{FileSaver, LocalFileSaver};
pub use uploader::{FileUploader, HttpUploader, UploadError, UploadResponse};
