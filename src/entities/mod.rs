// Entity Models
// "Identity persists, values change"
//
// Each entity has:
// - Stable identity (UUID) that NEVER changes
// - Values that are replaced wholesale on refresh
// - A normalized match key for lookups

pub mod country;

pub use country::{name_key, CountryRecord};
