//! Deterministic content identifier for an image.
//!
//! The fingerprint hashes every blob and then every manifest, in key
//! order, into one SHA-256; the `sha256:` hex form of that digest is
//! then wrapped into a CIDv1 (raw codec, sha2-256 multihash,
//! base32lower string form).

use cid::Cid;
use multihash::Multihash;
use sha2::{Digest, Sha256};

use crate::error::StoreError;
use crate::image::Image;

/// "raw" multicodec.
const RAW_CODEC: u64 = 0x55;

/// sha2-256 multihash code.
const SHA2_256_CODE: u64 = 0x12;

/// The canonical `sha256:` digest of an image's bytes. Independent of
/// the image name and of map insertion order.
pub fn image_digest(image: &Image) -> String {
    let mut hasher = Sha256::new();
    for data in image.blobs.values() {
        hasher.update(data);
    }
    for data in image.manifests.values() {
        hasher.update(data);
    }
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Encode a digest string as a CIDv1.
fn to_cid_v1(hash: &str) -> Result<String, StoreError> {
    let multihash =
        Multihash::<64>::wrap(SHA2_256_CODE, Sha256::digest(hash.as_bytes()).as_slice())?;
    Ok(Cid::new_v1(RAW_CODEC, multihash).to_string())
}

/// Compute the content identifier of an image.
pub fn compute_cid(image: &Image) -> Result<String, StoreError> {
    to_cid_v1(&image_digest(image))
}
