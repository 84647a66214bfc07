mod utils;
mod zone_tests;
