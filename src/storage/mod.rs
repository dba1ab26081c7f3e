pub(crate) mod journal_mmap;
