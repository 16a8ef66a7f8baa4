pub(crate) mod digest;
pub(crate) mod meta;
pub(crate) mod migrate;
pub(crate) mod repos;
pub(crate) mod shared;
