use std::time::Duration;

use crate::core::config::StorageConfig;
use crate::core::AppError;
use crate::gateway::Gateway;

const PUBLIC_OBJECT_MARKERS: [&str; 2] = ["/storage/v1/object/public/", "/object/public/"];

/// Turn whatever `file_url` holds (public URL, bucket path, bare filename)
/// into an object path inside the configured bucket: `<folder>/<filename>`.
pub fn object_path(file_url: &str, storage: &StorageConfig) -> String {
    let folder_prefix = format!("{}/", storage.folder);

    let mut path = PUBLIC_OBJECT_MARKERS
        .iter()
        .find_map(|marker| file_url.split_once(marker).map(|(_, rest)| rest))
        .unwrap_or(file_url);
    path = path.split(|c: char| c == '?' || c == '#').next().unwrap_or(path);

    if path.contains('/') && !path.starts_with(&folder_prefix) {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        return format!("{}{}", folder_prefix, file_name);
    }
    if path.starts_with(&folder_prefix) {
        path.to_string()
    } else {
        format!("{}{}", folder_prefix, path)
    }
}

pub async fn signed_document_url(
    gateway: &dyn Gateway,
    storage: &StorageConfig,
    file_url: &str,
) -> Result<String, AppError> {
    let path = object_path(file_url, storage);
    let url = gateway
        .create_signed_url(
            &storage.bucket,
            &path,
            Duration::from_secs(storage.signed_url_ttl_seconds),
        )
        .await?;
    Ok(url)
}
