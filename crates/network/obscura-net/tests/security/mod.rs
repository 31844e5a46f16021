mod admission_tests;
mod tamper_property_tests;
