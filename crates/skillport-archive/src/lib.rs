pub mod checksum;
pub mod codec;
pub mod crypto;

pub use checksum::{compute_checksums, verify_checksums};
pub use codec::{create, extract, CreatedArchive, ExtractedArchive};
pub use crypto::{generate_keypair, key_id_from_public_pem, sha256_hex, sign, verify, Keypair};
