//! Redemption: turning a scanned payload into one backend check-in call.

pub mod gateway;
pub mod outcome;
pub mod transport;

pub use gateway::{RedemptionGateway, Reservation};
pub use outcome::{FailureKind, RedemptionOutcome, DEFAULT_SUCCESS_MESSAGE, NO_TICKET_MESSAGE};
pub use transport::{HttpTransport, RedeemTransport, TransportResponse};
