//! Query layer: keys derived from UI state, the keyed result cache, and
//! pagination bookkeeping.

pub mod cache;
pub mod key;
pub mod pagination;

pub use cache::{FetchTicket, QueryClient, QueryStatus};
pub use key::{Invalidation, QueryKey};
pub use pagination::{next_page_param, page_range, Pages, PAGE_SIZE};
