/// Integration tests
/// Run specific tests with `cargo test <module>::<submodule>`
/// For example: `cargo test integration::workflow_test`
// Utility modules
pub mod utils;

// Modifier behaviour across modules
pub mod algorithm {
    pub mod cohort_test;
    pub mod exposure_test;
    pub mod population_test;
}

// End-to-end runs from input tables to output files
pub mod integration {
    pub mod workflow_test;
}
