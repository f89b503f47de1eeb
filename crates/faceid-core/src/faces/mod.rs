pub mod embedding;
pub mod extractor;
pub mod matcher;
pub mod store;

pub use embedding::Embedding;

pub use extractor::{
    ensure_valid_embedding, select_primary_face, BoundingBox, EmbeddingExtractor,
    ExtractorProfile, FaceDetection, ModelManifest, PrecomputedExtractor, SidecarSummary,
    MODEL_MANIFEST_FILE,
};

pub use matcher::{euclidean_distance, MatchDecision, MatchOutcome, MatchPolicy};

pub use store::{
    read_record_file, validate_record, write_record_atomic, EnrollmentRecord, EnrollmentStore,
    EnvStoreDirResolver, FilesystemEnrollmentStore, MemoryEnrollmentStore, StoreDirResolver,
    ENROLLMENT_STORE_ENV,
};
