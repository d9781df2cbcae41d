pub mod client;
pub mod cookies;
pub mod error;
pub mod normalize;
pub mod pagination;
pub mod price;
mod rate_limit;
pub mod session;
pub mod transport;
pub mod types;

pub use client::{RetailerClient, RetailerSettings};
pub use error::{ScraperError, SessionError};
pub use normalize::normalize_item;
pub use pagination::paginate;
pub use price::{resolve_price, PriceResolution};
pub use session::Session;
pub use transport::{HttpTransport, Transport, TransportRequest, TransportResponse};
pub use types::{ListingTarget, PriceSignals, RawItem};
