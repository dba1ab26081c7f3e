use bytemuck::Pod;
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

pub(crate) const HEADER_SIZE: usize = 64;
const MAGIC: u64 = u64::from_le_bytes(*b"STALLJ01");

/// Lives in the first bytes of the mapping so offsets survive restarts and are
/// shared between a publishing and a consuming process.
#[repr(C)]
struct Header {
    magic: AtomicU64,
    record_size: AtomicU64,
    write_offset: AtomicU64,
    ack_offset: AtomicU64,
}

const _: () = assert!(size_of::<Header>() <= HEADER_SIZE);

/// A memory-mapped, append-only journal of fixed-size records.
///
/// One writer appends; any number of readers observe appends wait-free. The
/// header persists the write offset and the consumer's acknowledged offset.
pub(crate) struct JournalMmap {
    _mmap: Arc<MmapMut>,
    base: *mut u8,
    len: usize,
    read_only: bool,
}

impl JournalMmap {
    /// CREATE: Creates a fresh journal, truncating any existing file.
    pub(crate) fn new(path: Option<&Path>, data_size: usize, record_size: usize) -> io::Result<Self> {
        let total_size = HEADER_SIZE + data_size;
        let mut mmap = if let Some(p) = path {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(p)?;

            file.set_len(total_size as u64)?;
            unsafe { MmapOptions::new().map_mut(&file)? }
        } else {
            MmapOptions::new().len(total_size).map_anon()?
        };

        let base = mmap.as_mut_ptr();
        let journal = Self {
            _mmap: Arc::new(mmap),
            base,
            len: data_size,
            read_only: false,
        };
        let header = journal.header();
        header.record_size.store(record_size as u64, Relaxed);
        header.write_offset.store(0, Relaxed);
        header.ack_offset.store(0, Relaxed);
        header.magic.store(MAGIC, Release);
        Ok(journal)
    }

    /// OPEN: Maps an existing journal, keeping its contents and offsets.
    pub(crate) fn load(path: &Path, record_size: usize) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        if mmap.len() < HEADER_SIZE {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "journal file is truncated"));
        }

        let base = mmap.as_mut_ptr();
        let len = mmap.len() - HEADER_SIZE;
        let journal = Self {
            _mmap: Arc::new(mmap),
            base,
            len,
            read_only: false,
        };
        let header = journal.header();
        if header.magic.load(Acquire) != MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "not a journal file"));
        }
        if header.record_size.load(Relaxed) != record_size as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "journal was written with a different record size",
            ));
        }
        let (write, ack) = (journal.write_offset(), journal.ack_offset());
        if write > len || !write.is_multiple_of(record_size) {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "journal write offset is corrupt"));
        }
        if ack > write || !ack.is_multiple_of(record_size) {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "journal ack offset is corrupt"));
        }
        Ok(journal)
    }

    /// Loads `path` if it exists, creates it otherwise.
    pub(crate) fn open_or_create(path: &Path, data_size: usize, record_size: usize) -> io::Result<Self> {
        if path.exists() {
            Self::load(path, record_size)
        } else {
            Self::new(Some(path), data_size, record_size)
        }
    }

    #[inline(always)]
    fn header(&self) -> &Header {
        // The mapping is page aligned and at least HEADER_SIZE long.
        unsafe { &*(self.base as *const Header) }
    }

    #[inline(always)]
    fn data_ptr(&self) -> *mut u8 {
        unsafe { self.base.add(HEADER_SIZE) }
    }

    /// Casts the record at `offset` (relative to the data region) to `&T`.
    #[inline(always)]
    pub(crate) fn read<T: Pod>(&self, offset: usize) -> &T {
        let size = size_of::<T>();
        let end = offset + size;
        assert!(end <= self.len, "Read crosses buffer boundary - alignment issue?");
        let slice = unsafe { std::slice::from_raw_parts(self.data_ptr().add(offset), size) };
        bytemuck::from_bytes(slice)
    }

    /// Appends a record.
    ///
    /// # Panics
    /// Panics if the journal is full or this handle is a reader.
    #[inline(always)]
    pub(crate) fn append<T: Pod>(&mut self, state: &T) {
        assert!(!self.read_only, "Cannot mutate read-only buffer");
        let current_pos = self.write_offset();
        let size = size_of::<T>();
        let end = current_pos + size;

        assert!(end <= self.len, "Journal is full. Cannot append more data.");

        unsafe {
            let dest_ptr = self.data_ptr().add(current_pos);
            let src_ptr = bytemuck::bytes_of(state).as_ptr();
            std::ptr::copy_nonoverlapping(src_ptr, dest_ptr, size);
        }

        self.header().write_offset.store(end as u64, Release);
    }

    #[inline(always)]
    pub(crate) fn write_offset(&self) -> usize {
        self.header().write_offset.load(Acquire) as usize
    }

    #[inline(always)]
    pub(crate) fn ack_offset(&self) -> usize {
        self.header().ack_offset.load(Acquire) as usize
    }

    pub(crate) fn store_ack_offset(&self, offset: usize) {
        self.header().ack_offset.store(offset as u64, Release);
    }

    #[inline(always)]
    pub(crate) fn remaining(&self) -> usize {
        self.len - self.write_offset()
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn flush(&self) -> io::Result<()> {
        self._mmap.flush()
    }

    #[inline(always)]
    pub(crate) fn reader(&self) -> JournalMmap {
        JournalMmap {
            _mmap: self._mmap.clone(),
            base: self.base,
            len: self.len,
            read_only: true,
        }
    }
}

unsafe impl Send for JournalMmap {}
