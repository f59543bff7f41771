pub(crate) mod analyser;
