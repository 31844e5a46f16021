mod dtn_tests;
mod low_latency_tests;
mod onion_tests;
