//! Integration tests for batchlink-http
//!
//! Uses wiremock to simulate the backend and the asset server and verifies
//! request shapes, response decoding and status classification of every
//! adapter.

mod common;

mod test_assets_and_records;
mod test_query_and_tokens;
mod test_sessions;
