pub mod detector;
pub mod ident;
pub mod inference;
pub mod ingest;
pub mod jobs;
pub mod normalize;
pub mod serializer;
pub mod status;
pub mod workspace;
