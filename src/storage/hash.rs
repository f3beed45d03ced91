use sha2::{Digest, Sha256};

/// Content-addressed key for an uploaded source image.
pub fn upload_key(data: &[u8], extension: &str) -> String {
    let digest = Sha256::digest(data);
    format!("uploads/{}.{extension}", hex::encode(digest))
}
