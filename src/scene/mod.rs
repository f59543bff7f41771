pub(crate) mod entity;
pub(crate) mod model;
pub(crate) mod shader;
