pub(crate) mod assembly;
pub(crate) mod keys;
pub(crate) mod pe;
