pub(crate) mod frames;
pub(crate) mod naming;
pub(crate) mod records;
pub(crate) mod request;
pub(crate) mod storage;
pub(crate) mod tokenizer;
