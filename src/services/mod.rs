//! Application services.
//!
//! The study service is the single entry point collaborators (the CLI, a
//! future UI) use to read and mutate the notebook.

pub mod study;

pub use study::StudyService;
