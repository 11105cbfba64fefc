// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! Coherent buffer tracker
//!
//! Detects, at page granularity, which bytes of a persistently-mapped
//! coherent buffer the application touched between two checkpoints. The
//! application may write at any time with no map/unmap boundary to hook, so
//! the tracker write-protects the mapped pages and marks pages dirty from
//! the write-fault callback.
//!
//! Platforms that deny direct protection of driver-mapped pages (probed via
//! `GLCAP_FORCE_SHADOW` or a device denylist) get the shadow-memory
//! strategy instead: the application is handed a page-aligned anonymous
//! mapping and the tracker copies shadow-to-real at synchronization points.
//!
//! # Concurrency
//!
//! The fault callback runs on whichever thread issued the faulting write,
//! potentially concurrently with another thread adding/removing/snapshotting
//! buffers. All mutable state serializes through the single `inner` mutex;
//! nothing under that lock calls back into fault delivery, so the
//! handler-install/enable path cannot deadlock against it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use gles::BufferId;
use memmap2::MmapMut;

use crate::binary_data::BinaryDataStore;
use crate::call::{CallRecord, Param, ParamValue};
use crate::{CaptureError, Result};
use gles::{gl, ContextId, EntryPoint, EnumGroup, ResourceType};

/// Devices whose drivers are known to reject `mprotect` on GPU-visible
/// mappings; these always use the shadow strategy.
const SHADOW_DEVICE_DENYLIST: &[&str] = &["Mali-G77", "Adreno (TM) 540"];

/// Environment variable forcing the shadow strategy on for a run.
pub const FORCE_SHADOW_ENV: &str = "GLCAP_FORCE_SHADOW";

/// OS memory-protection primitive, abstracted so unit tests can inject a
/// fake page-fault source instead of taking real SIGSEGVs.
pub trait PageProtection: Send + Sync {
    /// Make `[addr, addr + len)` read-only. `addr` and `len` are
    /// page-aligned.
    fn protect(&self, addr: usize, len: usize) -> Result<()>;

    /// Restore write access to `[addr, addr + len)`.
    fn unprotect(&self, addr: usize, len: usize) -> Result<()>;
}

/// `mprotect`-backed protection.
#[cfg(unix)]
pub struct MprotectBacked;

#[cfg(unix)]
impl PageProtection for MprotectBacked {
    fn protect(&self, addr: usize, len: usize) -> Result<()> {
        // SAFETY: the caller guarantees [addr, addr + len) is a page-aligned
        // range inside a live mapping owned by the tracked buffer.
        let rc = unsafe { libc::mprotect(addr as *mut libc::c_void, len, libc::PROT_READ) };
        if rc != 0 {
            return Err(CaptureError::Protection(format!(
                "mprotect(PROT_READ) failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    fn unprotect(&self, addr: usize, len: usize) -> Result<()> {
        // SAFETY: same contract as `protect`.
        let rc = unsafe {
            libc::mprotect(
                addr as *mut libc::c_void,
                len,
                libc::PROT_READ | libc::PROT_WRITE,
            )
        };
        if rc != 0 {
            return Err(CaptureError::Protection(format!(
                "mprotect(PROT_READ|PROT_WRITE) failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }
}

/// The system page size.
#[cfg(unix)]
pub fn system_page_size() -> usize {
    // SAFETY: sysconf(_SC_PAGESIZE) has no preconditions.
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz > 0 {
        sz as usize
    } else {
        4096
    }
}

#[cfg(not(unix))]
pub fn system_page_size() -> usize {
    4096
}

/// Decide whether the shadow strategy must be used for `device_name`.
pub fn should_use_shadow_memory(device_name: &str) -> bool {
    if std::env::var_os(FORCE_SHADOW_ENV).is_some() {
        return true;
    }
    SHADOW_DEVICE_DENYLIST
        .iter()
        .any(|d| device_name.contains(d))
}

/// A half-open run of page indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

/// One persistently-mapped coherent buffer under surveillance.
#[derive(Debug)]
pub struct CoherentBuffer {
    id: BufferId,
    /// True byte range of the mapping.
    real_start: usize,
    real_size: usize,
    /// Page-aligned superset of the real range.
    protect_start: usize,
    protect_size: usize,
    page_size: usize,
    /// A page is dirty iff it has been writable (unprotected) since the
    /// last quiescence point.
    dirty: Vec<bool>,
    /// Backing allocation for the shadow strategy; the application writes
    /// here and the tracker copies to the real mapping at sync points.
    shadow: Option<MmapMut>,
}

impl CoherentBuffer {
    fn new(id: BufferId, real_start: usize, real_size: usize, page_size: usize) -> Self {
        let protect_start = real_start & !(page_size - 1);
        let end = align_up(real_start + real_size, page_size);
        let protect_size = end - protect_start;
        let page_count = protect_size / page_size;
        Self {
            id,
            real_start,
            real_size,
            protect_start,
            protect_size,
            page_size,
            dirty: vec![false; page_count],
            shadow: None,
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn page_count(&self) -> usize {
        self.dirty.len()
    }

    pub fn protect_range(&self) -> (usize, usize) {
        (self.protect_start, self.protect_size)
    }

    /// Address the application writes through: the shadow base when
    /// shadowed, the real mapping otherwise.
    pub fn app_address(&self) -> usize {
        match &self.shadow {
            Some(map) => map.as_ptr() as usize + (self.real_start - self.protect_start),
            None => self.real_start,
        }
    }

    fn contains_page_of(&self, addr: usize) -> bool {
        addr >= self.protect_start && addr < self.protect_start + self.protect_size
    }

    fn page_index_of(&self, addr: usize) -> usize {
        (addr - self.protect_start) / self.page_size
    }

    fn page_address(&self, index: usize) -> usize {
        self.protect_start + index * self.page_size
    }

    pub fn mark_page_dirty(&mut self, index: usize) {
        self.dirty[index] = true;
    }

    pub fn mark_all_dirty(&mut self) {
        self.dirty.fill(true);
    }

    /// Contiguous runs of dirty pages.
    pub fn get_dirty_page_ranges(&self) -> Vec<PageRange> {
        let mut ranges = Vec::new();
        let mut run_start = None;
        for (i, &dirty) in self.dirty.iter().enumerate() {
            match (dirty, run_start) {
                (true, None) => run_start = Some(i),
                (false, Some(start)) => {
                    ranges.push(PageRange { start, end: i });
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start {
            ranges.push(PageRange {
                start,
                end: self.dirty.len(),
            });
        }
        ranges
    }

    /// Dirty ranges as `(offset, len)` within the buffer's true byte range.
    /// The first and last page of a run clip to the buffer's real start and
    /// end rather than the page boundaries.
    pub fn dirty_byte_ranges(&self) -> Vec<(usize, usize)> {
        let real_end = self.real_start + self.real_size;
        self.get_dirty_page_ranges()
            .into_iter()
            .filter_map(|range| {
                let lo = self.page_address(range.start).max(self.real_start);
                let hi = self.page_address(range.end).min(real_end);
                if lo < hi {
                    Some((lo - self.real_start, hi - lo))
                } else {
                    None
                }
            })
            .collect()
    }

    fn clear_dirty_range(&mut self, range: PageRange) {
        for i in range.start..range.end {
            self.dirty[i] = false;
        }
    }
}

struct TrackerInner {
    buffers: HashMap<BufferId, CoherentBuffer>,
}

/// Thread-safe coherent-buffer surveillance, shared across contexts.
pub struct CoherentBufferTracker {
    inner: Mutex<TrackerInner>,
    protection: Arc<dyn PageProtection>,
    page_size: usize,
    shadow_mode: bool,
}

impl CoherentBufferTracker {
    pub fn new(protection: Arc<dyn PageProtection>, page_size: usize, shadow_mode: bool) -> Self {
        assert!(page_size.is_power_of_two(), "page size must be a power of two");
        if shadow_mode {
            log::warn!("coherent buffer tracking using shadow memory fallback");
        }
        Self {
            inner: Mutex::new(TrackerInner {
                buffers: HashMap::new(),
            }),
            protection,
            page_size,
            shadow_mode,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn is_shadow_mode(&self) -> bool {
        self.shadow_mode
    }

    pub fn is_tracking(&self, id: BufferId) -> bool {
        self.inner.lock().unwrap().buffers.contains_key(&id)
    }

    /// Begin surveillance of a coherent mapping. Returns the address the
    /// application should be handed for its writes (the shadow base in
    /// shadow mode, `addr` otherwise).
    pub fn add_buffer(&self, id: BufferId, addr: usize, size: usize) -> Result<usize> {
        let mut buffer = CoherentBuffer::new(id, addr, size, self.page_size);

        if self.shadow_mode {
            let map = MmapMut::map_anon(buffer.protect_size)
                .map_err(|e| CaptureError::ShadowAllocation(e.to_string()))?;
            buffer.shadow = Some(map);
            // No fault signal exists in this mode, so shadow pages are
            // permanently dirty and every snapshot re-reads them.
            buffer.mark_all_dirty();
        } else {
            let (start, len) = buffer.protect_range();
            self.protection.protect(start, len)?;
        }

        let app_addr = buffer.app_address();
        let mut inner = self.inner.lock().unwrap();
        let previous = inner.buffers.insert(id, buffer);
        debug_assert!(previous.is_none(), "buffer {} already tracked", id.value());
        Ok(app_addr)
    }

    /// The process-wide write-fault callback. Marks the owning page dirty in
    /// every tracked buffer containing it (adjacent small buffers can share
    /// a page) and restores write access so the faulting write proceeds.
    ///
    /// Returns whether `addr` fell inside any tracked range; the installed
    /// OS handler must forward out-of-range faults, not swallow them.
    pub fn handle_fault(&self, addr: usize) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let mut hit = false;
        let mut page_addr = None;
        for buffer in inner.buffers.values_mut() {
            if buffer.contains_page_of(addr) {
                let index = buffer.page_index_of(addr);
                buffer.mark_page_dirty(index);
                page_addr = Some(buffer.page_address(index));
                hit = true;
            }
        }
        if let Some(page) = page_addr {
            if let Err(e) = self.protection.unprotect(page, self.page_size) {
                log::warn!("failed to unprotect faulting page {page:#x}: {e}");
            }
        }
        hit
    }

    /// Snapshot every dirty byte range of `id` into patch records, then
    /// re-protect exactly the pages that were dirty. Clean pages are not
    /// touched and not re-protected redundantly.
    pub fn capture_dirty_snapshot(
        &self,
        context: ContextId,
        id: BufferId,
        binary: &mut BinaryDataStore,
    ) -> Result<Vec<CallRecord>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(buffer) = inner.buffers.get_mut(&id) else {
            return Ok(Vec::new());
        };

        let byte_ranges = buffer.dirty_byte_ranges();
        if byte_ranges.is_empty() {
            return Ok(Vec::new());
        }

        let mut calls = vec![bind_buffer_record(context, id)];
        let src_base = buffer.app_address();
        for &(offset, len) in &byte_ranges {
            // SAFETY: the range lies inside the live mapping registered by
            // add_buffer; the mutex excludes concurrent removal.
            let bytes =
                unsafe { std::slice::from_raw_parts((src_base + offset) as *const u8, len) };
            let data_offset = binary.append(bytes);
            calls.push(buffer_sub_data_record(context, offset, len, data_offset));
        }

        if self.shadow_mode {
            // Nothing re-marks shadow pages between snapshots, so clearing
            // them here would lose every later write. They stay dirty.
            buffer.mark_all_dirty();
        } else {
            let dirty_pages = buffer.get_dirty_page_ranges();
            for range in &dirty_pages {
                let start = buffer.page_address(range.start);
                let len = (range.end - range.start) * self.page_size;
                self.protection.protect(start, len)?;
            }
            for range in dirty_pages {
                buffer.clear_dirty_range(range);
            }
        }

        Ok(calls)
    }

    /// Shadow strategy: copy the application's shadow writes into the real
    /// mapping. Called at synchronization points (buffer sub-data, compute
    /// dispatch, `glFinish`).
    pub fn sync_shadow_to_real(&self, id: BufferId) {
        let inner = self.inner.lock().unwrap();
        let Some(buffer) = inner.buffers.get(&id) else {
            return;
        };
        let Some(shadow) = &buffer.shadow else {
            return;
        };
        let offset = buffer.real_start - buffer.protect_start;
        // SAFETY: shadow and real ranges are both `real_size` bytes of live
        // memory; the ranges cannot overlap (the shadow is a distinct
        // anonymous mapping).
        unsafe {
            std::ptr::copy_nonoverlapping(
                shadow.as_ptr().add(offset),
                buffer.real_start as *mut u8,
                buffer.real_size,
            );
        }
    }

    /// End surveillance of `id`, releasing protection on its pages except
    /// those provably shared with a still-tracked neighbor.
    ///
    /// Only the first and last page are checked for sharing with at least
    /// one neighbor. That is adequate while coherent buffers are small
    /// relative to the page size and not densely packed; a general N-way
    /// overlap would be needed under heavy small-buffer workloads.
    pub fn remove_buffer(&self, id: BufferId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let Some(buffer) = inner.buffers.remove(&id) else {
            return Ok(());
        };
        if self.shadow_mode {
            return Ok(());
        }

        let first_page = buffer.protect_start;
        let last_page = buffer.protect_start + buffer.protect_size - self.page_size;
        let shared = |page: usize| {
            inner
                .buffers
                .values()
                .any(|other| other.contains_page_of(page))
        };

        let mut release_start = buffer.protect_start;
        let mut release_size = buffer.protect_size;
        if shared(first_page) {
            release_start += self.page_size;
            release_size = release_size.saturating_sub(self.page_size);
        }
        if release_size > 0 && last_page != first_page && shared(last_page) {
            release_size = release_size.saturating_sub(self.page_size);
        }
        if release_size > 0 {
            self.protection.unprotect(release_start, release_size)?;
        }
        Ok(())
    }

    /// End-of-frame teardown: capture is not assumed continuous across frame
    /// boundaries, so all protection is released and every page becomes
    /// dirty (writes are invisible until the next [`begin_frame`]).
    ///
    /// [`begin_frame`]: Self::begin_frame
    pub fn end_frame(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for buffer in inner.buffers.values_mut() {
            if !self.shadow_mode {
                let (start, len) = buffer.protect_range();
                self.protection.unprotect(start, len)?;
            }
            buffer.mark_all_dirty();
        }
        Ok(())
    }

    /// Re-arm protection for a new frame.
    pub fn begin_frame(&self) -> Result<()> {
        if self.shadow_mode {
            return Ok(());
        }
        let inner = self.inner.lock().unwrap();
        for buffer in inner.buffers.values() {
            let (start, len) = buffer.protect_range();
            self.protection.protect(start, len)?;
        }
        Ok(())
    }

    /// Address the application writes through for `id` (the shadow base in
    /// shadow mode), when tracked.
    pub fn app_address(&self, id: BufferId) -> Option<usize> {
        let inner = self.inner.lock().unwrap();
        inner.buffers.get(&id).map(|b| b.app_address())
    }

    /// IDs of all tracked buffers.
    pub fn tracked_ids(&self) -> Vec<BufferId> {
        let inner = self.inner.lock().unwrap();
        let mut ids: Vec<_> = inner.buffers.keys().copied().collect();
        ids.sort();
        ids
    }
}

fn bind_buffer_record(context: ContextId, id: BufferId) -> CallRecord {
    CallRecord::new(
        EntryPoint::BindBuffer,
        context,
        vec![
            Param::new(
                "target",
                ParamValue::Enum {
                    group: EnumGroup::BufferTarget,
                    value: gl::GL_ARRAY_BUFFER,
                },
            ),
            Param::new(
                "buffer",
                ParamValue::Handle {
                    ty: ResourceType::Buffer,
                    id: id.value(),
                },
            ),
        ],
    )
}

fn buffer_sub_data_record(
    context: ContextId,
    offset: usize,
    len: usize,
    data_offset: u64,
) -> CallRecord {
    CallRecord::new(
        EntryPoint::BufferSubData,
        context,
        vec![
            Param::new(
                "target",
                ParamValue::Enum {
                    group: EnumGroup::BufferTarget,
                    value: gl::GL_ARRAY_BUFFER,
                },
            ),
            Param::new("offset", ParamValue::Int64(offset as i64)),
            Param::new("size", ParamValue::Int64(len as i64)),
            Param::new(
                "data",
                ParamValue::BinaryData {
                    offset: data_offset,
                    len: len as u64,
                },
            ),
        ],
    )
}

fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PAGE: usize = 4096;

    /// Fake protection backend counting protect/unprotect calls; stands in
    /// for the OS fault-delivery mechanism.
    #[derive(Default)]
    struct FakeProtection {
        protects: AtomicUsize,
        unprotects: AtomicUsize,
    }

    impl PageProtection for FakeProtection {
        fn protect(&self, _addr: usize, _len: usize) -> Result<()> {
            self.protects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn unprotect(&self, _addr: usize, _len: usize) -> Result<()> {
            self.unprotects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn tracker() -> (Arc<FakeProtection>, CoherentBufferTracker) {
        let protection = Arc::new(FakeProtection::default());
        let tracker = CoherentBufferTracker::new(protection.clone(), PAGE, false);
        (protection, tracker)
    }

    /// Page-aligned test backing memory.
    fn aligned_backing(pages: usize) -> Vec<u8> {
        // Over-allocate so we can find an aligned window inside.
        vec![0u8; (pages + 1) * PAGE]
    }

    fn aligned_start(backing: &[u8]) -> usize {
        align_up(backing.as_ptr() as usize, PAGE)
    }

    #[test]
    fn test_dirty_page_range_merging() {
        let mut buffer = CoherentBuffer::new(BufferId(1), PAGE * 10, PAGE * 5, PAGE);
        assert_eq!(buffer.page_count(), 5);

        // Bitmap [clean, dirty, dirty, clean, dirty] -> [1,3) and [4,5).
        buffer.mark_page_dirty(1);
        buffer.mark_page_dirty(2);
        buffer.mark_page_dirty(4);
        assert_eq!(
            buffer.get_dirty_page_ranges(),
            vec![PageRange { start: 1, end: 3 }, PageRange { start: 4, end: 5 }]
        );
    }

    #[test]
    fn test_dirty_byte_ranges_clip_to_true_bounds() {
        // True range starts mid-page and ends mid-page.
        let start = PAGE * 100 + 100;
        let size = PAGE * 2; // ends at PAGE * 102 + 100
        let mut buffer = CoherentBuffer::new(BufferId(1), start, size, PAGE);
        assert_eq!(buffer.page_count(), 3);

        buffer.mark_all_dirty();
        let ranges = buffer.dirty_byte_ranges();
        assert_eq!(ranges, vec![(0, size)]);

        // First page alone clips its start to the true start.
        let mut buffer = CoherentBuffer::new(BufferId(1), start, size, PAGE);
        buffer.mark_page_dirty(0);
        assert_eq!(buffer.dirty_byte_ranges(), vec![(0, PAGE - 100)]);

        // Last page alone clips its end to the true end.
        let mut buffer = CoherentBuffer::new(BufferId(1), start, size, PAGE);
        buffer.mark_page_dirty(2);
        assert_eq!(
            buffer.dirty_byte_ranges(),
            vec![(2 * PAGE - 100, 100)]
        );
    }

    #[test]
    fn test_fault_marks_dirty_and_unprotects() {
        let (protection, tracker) = tracker();
        let backing = aligned_backing(2);
        let start = aligned_start(&backing);
        tracker.add_buffer(BufferId(3), start, PAGE).unwrap();
        assert_eq!(protection.protects.load(Ordering::SeqCst), 1);

        assert!(tracker.handle_fault(start + 10));
        assert_eq!(protection.unprotects.load(Ordering::SeqCst), 1);

        // Out-of-range faults are reported as such, never swallowed.
        assert!(!tracker.handle_fault(start + 16 * PAGE));
    }

    #[test]
    fn test_snapshot_emits_patches_and_reprotects() {
        let (protection, tracker) = tracker();
        let mut backing = aligned_backing(3);
        let start = aligned_start(&backing);
        let idx = start - backing.as_ptr() as usize;
        backing[idx..idx + 4].copy_from_slice(&[9, 8, 7, 6]);

        tracker.add_buffer(BufferId(5), start, PAGE * 2).unwrap();
        tracker.handle_fault(start);

        let mut binary = BinaryDataStore::new();
        let calls = tracker
            .capture_dirty_snapshot(ContextId(1), BufferId(5), &mut binary)
            .unwrap();
        // One bind plus one patch for the single dirty page.
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].entry, EntryPoint::BindBuffer);
        assert_eq!(calls[1].entry, EntryPoint::BufferSubData);

        let Some(&ParamValue::BinaryData { offset, len }) = calls[1].param("data") else {
            panic!("patch record missing binary data");
        };
        assert_eq!(&binary.get(offset, len)[..4], &[9, 8, 7, 6]);

        // Exactly the dirty page was re-protected (initial protect + 1).
        assert_eq!(protection.protects.load(Ordering::SeqCst), 2);

        // A second snapshot with nothing dirty emits nothing.
        let calls = tracker
            .capture_dirty_snapshot(ContextId(1), BufferId(5), &mut binary)
            .unwrap();
        assert!(calls.is_empty());
    }

    #[test]
    fn test_remove_keeps_shared_neighbor_pages_protected() {
        let (protection, tracker) = tracker();
        let backing = aligned_backing(4);
        let start = aligned_start(&backing);

        // Two small buffers aliasing the same physical page.
        tracker.add_buffer(BufferId(1), start, 256).unwrap();
        tracker.add_buffer(BufferId(2), start + 512, 256).unwrap();

        tracker.remove_buffer(BufferId(1)).unwrap();
        // The shared page stays protected for buffer 2.
        assert_eq!(protection.unprotects.load(Ordering::SeqCst), 0);

        tracker.remove_buffer(BufferId(2)).unwrap();
        assert_eq!(protection.unprotects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_end_frame_releases_everything() {
        let (protection, tracker) = tracker();
        let backing = aligned_backing(3);
        let start = aligned_start(&backing);
        tracker.add_buffer(BufferId(1), start, PAGE * 2).unwrap();

        tracker.end_frame().unwrap();
        assert_eq!(protection.unprotects.load(Ordering::SeqCst), 1);

        tracker.begin_frame().unwrap();
        assert_eq!(protection.protects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_shadow_snapshot_sees_writes_after_first_snapshot() {
        let protection = Arc::new(FakeProtection::default());
        let tracker = CoherentBufferTracker::new(protection, PAGE, true);

        let backing = aligned_backing(2);
        let start = aligned_start(&backing);
        tracker.add_buffer(BufferId(4), start, 64).unwrap();
        let app = tracker.app_address(BufferId(4)).unwrap();

        // SAFETY: app points into the tracker-owned shadow mapping.
        unsafe { *(app as *mut u8) = 0xAA };
        let mut binary = BinaryDataStore::new();
        let calls = tracker
            .capture_dirty_snapshot(ContextId(1), BufferId(4), &mut binary)
            .unwrap();
        assert!(!calls.is_empty());

        // A later write must show up in the next snapshot; shadow pages
        // carry no fault signal to re-mark them.
        unsafe { *(app as *mut u8) = 0xBB };
        let calls = tracker
            .capture_dirty_snapshot(ContextId(1), BufferId(4), &mut binary)
            .unwrap();
        assert_eq!(calls.len(), 2);
        let Some(&ParamValue::BinaryData { offset, len }) = calls[1].param("data") else {
            panic!("patch record missing binary data");
        };
        assert_eq!(binary.get(offset, len)[0], 0xBB);
    }

    #[test]
    fn test_shadow_mode_returns_shadow_address() {
        let protection = Arc::new(FakeProtection::default());
        let tracker = CoherentBufferTracker::new(protection.clone(), PAGE, true);

        let backing = aligned_backing(2);
        let start = aligned_start(&backing);
        let app_addr = tracker.add_buffer(BufferId(9), start, 128).unwrap();
        assert_ne!(app_addr, start);
        // No protection calls in shadow mode.
        assert_eq!(protection.protects.load(Ordering::SeqCst), 0);

        // Writes to the shadow surface at the real range after a sync.
        // SAFETY: app_addr points into the tracker-owned shadow mapping.
        unsafe { *(app_addr as *mut u8) = 42 };
        tracker.sync_shadow_to_real(BufferId(9));
        let idx = start - backing.as_ptr() as usize;
        assert_eq!(backing[idx], 42);
    }
}
