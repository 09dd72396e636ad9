pub mod profile_cache;

pub use profile_cache::{PendingFetches, ProfileCache, ProfileClaim};
