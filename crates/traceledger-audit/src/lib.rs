pub mod chain;
pub mod error;
pub mod merkle;
pub mod pack;
pub mod service;
pub mod window;

pub use chain::{AuditChain, AuditEntry, AuditEntryType};
pub use error::AuditError;
pub use merkle::{verify_proof, Direction, InclusionProof, MerkleTree, ProofStep};
pub use pack::{AuditPack, MerkleRootRecord, PackVerification, TimeRange};
pub use service::AuditService;
pub use window::{FinalizedWindow, WindowManager};
