//! Stream combinators for observer subscriptions

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
