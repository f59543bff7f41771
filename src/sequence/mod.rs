pub(crate) mod engine;
pub(crate) mod scheduler;
pub(crate) mod view;
