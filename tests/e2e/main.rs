mod cancellation;
mod corruption;
mod mismatch;
mod round_trip;

mod support;
