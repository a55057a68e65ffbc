//! Page-level scrapers built on the extraction primitives.
//!
//! Harvesting is two-phase:
//!
//! 1. **Indexing** ([`listing`]): read article stubs off the listing page
//! 2. **Fetching** ([`detail`]): visit each stub and read the article itself
//!
//! Both phases go through the retrying render client. Indexing failures end
//! the run; fetching failures only degrade the affected record.

pub mod detail;
pub mod listing;

pub use detail::DetailFetcher;
pub use listing::ListingExtractor;
